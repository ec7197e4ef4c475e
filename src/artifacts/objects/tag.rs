//! Git annotated tag object
//!
//! ```text
//! tag <size>\0
//! object <target-sha>
//! type <target-type>
//! tag <name>
//! tagger <name> <email> <timestamp> <timezone>
//!
//! <message>
//! ```
//!
//! Lightweight tags are plain refs and never reach this type.

use crate::artifacts::objects::commit::Author;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Tag {
    target: ObjectId,
    target_type: ObjectType,
    name: String,
    tagger: Option<Author>,
    message: String,
}

impl Tag {
    /// The object this tag points at, which may itself be another tag
    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn target_type(&self) -> ObjectType {
        self.target_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> Option<&Author> {
        self.tagger.as_ref()
    }
}

impl Packable for Tag {
    fn serialize_body(&self) -> anyhow::Result<Bytes> {
        let mut lines = vec![
            format!("object {}", self.target),
            format!("type {}", self.target_type),
            format!("tag {}", self.name),
        ];
        if let Some(tagger) = &self.tagger {
            lines.push(format!("tagger {}", tagger.display()));
        }
        lines.push(String::new());
        lines.push(self.message.clone());

        Ok(Bytes::from(lines.join("\n")))
    }
}

impl Unpackable for Tag {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;
        let content = String::from_utf8_lossy(&content);
        let mut lines = content.split('\n');

        let mut target = None;
        let mut target_type = None;
        let mut name = None;
        let mut tagger = None;

        for line in lines.by_ref() {
            if line.is_empty() {
                break;
            }
            if line.starts_with(' ') {
                continue;
            }
            let Some((key, value)) = line.split_once(' ') else {
                continue;
            };
            match key {
                "object" => target = Some(ObjectId::try_parse(value.to_string())?),
                "type" => target_type = Some(ObjectType::try_from(value)?),
                "tag" => name = Some(value.to_string()),
                "tagger" => tagger = Some(Author::try_from(value)?),
                _ => {}
            }
        }

        Ok(Tag {
            target: target.context("Invalid tag object: missing object line")?,
            target_type: target_type.context("Invalid tag object: missing type line")?,
            name: name.context("Invalid tag object: missing tag line")?,
            tagger,
            message: lines.collect::<Vec<&str>>().join("\n"),
        })
    }
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_tag_pointing_at_commit() {
        let body = "object 1111111111111111111111111111111111111111\n\
                    type commit\n\
                    tag v1.0\n\
                    tagger Ada <ada@example.com> 1700000000 +0000\n\
                    \n\
                    release";
        let tag = Tag::deserialize(Cursor::new(body.as_bytes().to_vec())).unwrap();

        assert_eq!(tag.name(), "v1.0");
        assert_eq!(tag.target_type(), ObjectType::Commit);
        assert_eq!(tag.target().to_short_oid(), "1111111");
        assert!(tag.tagger().is_some());
    }

    #[test]
    fn missing_target_is_an_error() {
        let body = "type commit\ntag v1\n\nmsg";
        assert!(Tag::deserialize(Cursor::new(body.as_bytes().to_vec())).is_err());
    }
}
