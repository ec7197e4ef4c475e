//! Shared helpers for the graph unit tests

use crate::artifacts::graph::source::{InMemorySource, RawCommit};
use crate::artifacts::objects::object_id::ObjectId;
use chrono::{DateTime, FixedOffset};

/// Deterministic 40-character id whose leading bytes spell `name`
pub fn oid(name: &str) -> ObjectId {
    let mut hex_string = String::new();
    for byte in name.as_bytes() {
        hex_string.push_str(&format!("{:02x}", byte));
    }
    while hex_string.len() < 40 {
        hex_string.push('0');
    }
    hex_string.truncate(40);

    ObjectId::try_parse(hex_string).expect("Invalid test ObjectId")
}

/// Decode a test id back to the name it was built from
pub fn name_of(oid: &ObjectId) -> String {
    let hex = oid.as_ref();
    let mut name = String::new();
    for i in (0..hex.len()).step_by(2) {
        match u8::from_str_radix(&hex[i..i + 2], 16) {
            Ok(0) | Err(_) => break,
            Ok(byte) => name.push(byte as char),
        }
    }
    name
}

pub fn ts(seconds: i64) -> DateTime<FixedOffset> {
    DateTime::from_timestamp(seconds, 0)
        .expect("valid timestamp")
        .fixed_offset()
}

pub fn raw(name: &str, parents: &[&str], committed: i64) -> RawCommit {
    RawCommit::new(
        oid(name),
        parents.iter().map(|parent| oid(parent)).collect(),
        ts(committed),
        ts(committed),
    )
}

/// Build a source from `(name, parents, committer seconds)` triples
pub fn source(commits: &[(&str, &[&str], i64)], branches: &[(&str, &str)]) -> InMemorySource {
    let mut source = InMemorySource::new();
    for (name, parents, committed) in commits {
        source.insert_commit(raw(name, parents, *committed));
    }
    for (branch, tip) in branches {
        source.insert_branch(branch, oid(tip));
    }
    source
}

pub fn names<'a>(oids: impl IntoIterator<Item = &'a ObjectId>) -> Vec<String> {
    oids.into_iter().map(name_of).collect()
}
