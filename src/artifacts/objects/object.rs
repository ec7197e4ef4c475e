use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use anyhow::Result;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub trait Packable {
    /// Serialize the object body, without the `<type> <size>\0` header
    fn serialize_body(&self) -> Result<Bytes>;
}

pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn serialize(&self) -> Result<Bytes> {
        let body = self.serialize_body()?;

        let mut object_bytes = Vec::new();
        let header = format!("{} {}\0", self.object_type().as_str(), body.len());
        object_bytes.write_all(header.as_bytes())?;
        object_bytes.write_all(&body)?;

        Ok(Bytes::from(object_bytes))
    }

    fn object_id(&self) -> Result<ObjectId> {
        let content = self.serialize()?;
        let mut hasher = Sha1::new();
        hasher.update(&content);

        let oid = hasher.finalize();
        ObjectId::try_parse(format!("{oid:x}"))
    }

    fn object_path(&self) -> Result<PathBuf> {
        Ok(self.object_id()?.to_path())
    }
}

/// A parsed object from the database
///
/// Only the objects the commit graph needs are parsed; blobs and trees are
/// reported by type alone.
#[derive(Debug)]
pub enum ObjectBox {
    Commit(Box<Commit>),
    Tag(Box<Tag>),
    Other(ObjectType),
}

impl ObjectBox {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Commit(_) => ObjectType::Commit,
            ObjectBox::Tag(_) => ObjectType::Tag,
            ObjectBox::Other(object_type) => *object_type,
        }
    }
}
