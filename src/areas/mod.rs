//! Version-control access layer
//!
//! - `database`: loose-object store for commits and annotated tags
//! - `refs`: branch, tag and remote-tracking reference enumeration
//! - `repository`: opens a repository and exposes it as a commit source

pub mod database;
pub mod refs;
pub mod repository;
