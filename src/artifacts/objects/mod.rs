//! Git object types and operations
//!
//! Git stores all content as objects identified by SHA-1 hashes. The commit
//! graph only looks inside two of them:
//!
//! - **Commit**: parents plus author/committer timestamps
//! - **Tag**: annotated reference to another object, peeled to a commit
//!
//! All objects share the on-disk format `<type> <size>\0<content>`.

pub mod commit;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tag;

/// Length of a SHA-1 hash in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 40;
