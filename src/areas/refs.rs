//! Git references (branches, tags, remote-tracking branches)
//!
//! References are human-readable names pointing to commits, stored either as
//! loose files under `.git/refs` or as lines of `.git/packed-refs`. A loose
//! file wins over a packed entry of the same name.
//!
//! ## File Format
//!
//! Loose ref files contain either:
//! - A 40-character SHA-1 hash (direct reference)
//! - `ref: <path>` for symbolic references
//!
//! `packed-refs` holds `<sha> <full name>` lines; `#` lines are comments and
//! `^<sha>` lines carry peeled tag targets, which are re-derived from the tag
//! objects instead.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::ref_name::{HEADS_PREFIX, REMOTES_PREFIX, RefName, TAGS_PREFIX};
use anyhow::Context;
use derive_new::new;
use file_guard::Lock;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::ops::DerefMut;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Git references reader/writer rooted at the git directory
#[derive(Debug, Clone, new)]
pub struct Refs {
    /// Path to the git directory (typically `.git`)
    path: Box<Path>,
}

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Longest chain of symbolic refs followed before giving up
const MAX_SYMREF_DEPTH: usize = 8;

pub const HEAD_REF_NAME: &str = "HEAD";
pub const PACKED_REFS_FILE: &str = "packed-refs";

/// A listed reference and what it resolved to
///
/// Resolution failures stay attached to their name so one broken ref does
/// not hide the rest.
#[derive(Debug, new)]
pub struct ListedRef {
    pub name: String,
    pub target: anyhow::Result<ObjectId>,
}

#[derive(Debug, Clone)]
enum SymRefOrOid {
    /// Symbolic reference pointing to another ref
    SymRef { target: String },
    /// Direct object ID
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn parse(content: &str) -> anyhow::Result<SymRefOrOid> {
        let content = content.trim();
        if content.is_empty() {
            anyhow::bail!("ref file is empty");
        }

        let symref_match = regex::Regex::new(SYMREF_REGEX)?.captures(content);
        if let Some(symref_match) = symref_match {
            Ok(SymRefOrOid::SymRef {
                target: symref_match[1].trim().to_string(),
            })
        } else {
            Ok(SymRefOrOid::Oid(ObjectId::try_parse(content.to_string())?))
        }
    }
}

impl Refs {
    /// Local branches, plus `<remote>/<branch>` entries when asked
    pub fn list_branches(&self, include_remotes: bool) -> anyhow::Result<Vec<ListedRef>> {
        let mut branches = self.list_namespace(HEADS_PREFIX)?;

        if include_remotes {
            branches.extend(
                self.list_namespace(REMOTES_PREFIX)?
                    .into_iter()
                    .filter(|listed| !listed.name.ends_with("/HEAD")),
            );
        }

        Ok(branches)
    }

    pub fn list_tags(&self) -> anyhow::Result<Vec<ListedRef>> {
        self.list_namespace(TAGS_PREFIX)
    }

    fn list_namespace(&self, prefix: &str) -> anyhow::Result<Vec<ListedRef>> {
        let packed = self.read_packed_refs()?;
        let mut names = packed
            .keys()
            .filter_map(|full_name| full_name.strip_prefix(prefix))
            .map(str::to_string)
            .collect::<BTreeSet<_>>();

        for entry in WalkDir::new(self.path.join(prefix))
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
        {
            let Ok(relative_path) = entry.path().strip_prefix(self.path.join(prefix)) else {
                continue;
            };
            let name = relative_path
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            // lock files and other leftovers are not refs
            if RefName::try_parse(name.clone()).is_err() {
                debug!(name, "skipping file that is not a valid ref name");
                continue;
            }
            names.insert(name);
        }

        Ok(names
            .into_iter()
            .map(|name| {
                let target = self.resolve_with(&format!("{prefix}{name}"), &packed);
                ListedRef::new(name, target)
            })
            .collect())
    }

    /// Resolve a full ref name (`refs/heads/main`, `HEAD`) to a hash
    pub fn resolve(&self, full_name: &str) -> anyhow::Result<ObjectId> {
        let packed = self.read_packed_refs()?;
        self.resolve_with(full_name, &packed)
    }

    fn resolve_with(
        &self,
        full_name: &str,
        packed: &BTreeMap<String, String>,
    ) -> anyhow::Result<ObjectId> {
        let mut current = full_name.to_string();

        for _ in 0..MAX_SYMREF_DEPTH {
            let loose_path = self.path.join(&current);
            let value = if loose_path.is_file() {
                let content = std::fs::read_to_string(&loose_path)
                    .with_context(|| format!("failed to read ref file at {:?}", loose_path))?;
                SymRefOrOid::parse(&content)
                    .with_context(|| format!("malformed ref file at {:?}", loose_path))?
            } else if let Some(raw_oid) = packed.get(&current) {
                SymRefOrOid::Oid(
                    ObjectId::try_parse(raw_oid.clone())
                        .with_context(|| format!("malformed packed ref {current}"))?,
                )
            } else if current == full_name {
                anyhow::bail!("reference {current} does not exist");
            } else {
                anyhow::bail!("symbolic reference {full_name} points to missing {current}");
            };

            match value {
                SymRefOrOid::Oid(oid) => return Ok(oid),
                SymRefOrOid::SymRef { target } => current = target,
            }
        }

        anyhow::bail!("symbolic reference {full_name} nests deeper than {MAX_SYMREF_DEPTH} levels")
    }

    fn read_packed_refs(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let path = self.packed_refs_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read packed refs at {:?}", path))?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('^'))
            .filter_map(|line| line.split_once(' '))
            .map(|(oid, name)| (name.trim().to_string(), oid.to_string()))
            .collect())
    }

    pub fn create_branch(&self, name: &RefName, oid: &ObjectId) -> anyhow::Result<()> {
        self.update_ref(&format!("{HEADS_PREFIX}{name}"), oid)
    }

    pub fn create_tag(&self, name: &RefName, oid: &ObjectId) -> anyhow::Result<()> {
        self.update_ref(&format!("{TAGS_PREFIX}{name}"), oid)
    }

    pub fn update_ref(&self, full_name: &str, oid: &ObjectId) -> anyhow::Result<()> {
        self.update_ref_file(&self.path.join(full_name), oid.as_ref().to_string())
    }

    pub fn set_symbolic_ref(&self, full_name: &str, target: &str) -> anyhow::Result<()> {
        self.update_ref_file(&self.path.join(full_name), format!("ref: {target}"))
    }

    pub fn set_head(&self, branch: &RefName) -> anyhow::Result<()> {
        self.set_symbolic_ref(HEAD_REF_NAME, &format!("{HEADS_PREFIX}{branch}"))
    }

    /// Replace `packed-refs` with the given `(full name, hash)` entries
    pub fn write_packed_refs(&self, entries: &[(String, ObjectId)]) -> anyhow::Result<()> {
        let mut content = String::from("# pack-refs with: peeled fully-peeled sorted \n");
        for (name, oid) in entries {
            content.push_str(&format!("{oid} {name}\n"));
        }

        self.update_ref_file(&self.packed_refs_path(), content)
    }

    pub fn update_ref_file(&self, path: &Path, raw_ref: String) -> anyhow::Result<()> {
        std::fs::create_dir_all(path.parent().with_context(|| {
            format!(
                "failed to create parent directories for ref file at {:?}",
                path
            )
        })?)?;

        // writers lock the first byte of the file
        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to open ref file at {:?}", path))?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        lock.deref_mut().write_all(raw_ref.as_bytes())?;

        Ok(())
    }

    pub fn refs_path(&self) -> Box<Path> {
        self.path.join("refs").into_boxed_path()
    }

    pub fn packed_refs_path(&self) -> Box<Path> {
        self.path.join(PACKED_REFS_FILE).into_boxed_path()
    }
}
