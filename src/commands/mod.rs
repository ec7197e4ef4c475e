//! Command implementations
//!
//! Each command is an `impl Repository` block writing to the repository's
//! writer:
//!
//! - `analyze`: label the whole history and print the annotated table
//! - `show`: print the labels of one commit

pub mod analyze;
pub mod show;
