use crate::areas::database::Database;
use crate::areas::refs::{HEAD_REF_NAME, ListedRef, Refs};
use crate::artifacts::graph::source::{CommitSource, NamedRef, RawCommit};
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::ref_name::HEADS_PREFIX;
use crate::errors::GraphError;
use anyhow::Context;
use std::cell::{RefCell, RefMut};
use std::path::Path;
use tracing::debug;

pub const GIT_DIR_NAME: &str = ".git";
pub const DEFAULT_BRANCH: &str = "main";

/// Annotated tags pointing at annotated tags are followed at most this far
const MAX_TAG_CHAIN: usize = 16;

pub struct Repository {
    path: Box<Path>,
    git_dir: Box<Path>,
    writer: RefCell<Box<dyn std::io::Write>>,
    database: Database,
    refs: Refs,
}

impl Repository {
    /// Open a work tree (`<path>/.git`) or a bare repository at `path`
    pub fn open(path: &Path, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        let path = path
            .canonicalize()
            .with_context(|| format!("Unable to open repository at {}", path.display()))?;

        let git_dir = if path.join(GIT_DIR_NAME).is_dir() {
            path.join(GIT_DIR_NAME)
        } else if path.join("objects").is_dir() && path.join("refs").is_dir() {
            path.clone()
        } else {
            anyhow::bail!("{} is not a git repository", path.display());
        };

        Ok(Self::from_parts(path, git_dir, writer))
    }

    /// Create an empty repository with `HEAD` on the default branch
    pub fn init(path: &Path, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Unable to create directory {}", path.display()))?;
        let path = path.canonicalize()?;
        let git_dir = path.join(GIT_DIR_NAME);

        for dir in ["objects", "refs/heads", "refs/tags"] {
            std::fs::create_dir_all(git_dir.join(dir))
                .with_context(|| format!("Unable to create {dir} in {}", git_dir.display()))?;
        }

        let repository = Self::from_parts(path, git_dir, writer);
        repository
            .refs
            .set_symbolic_ref(HEAD_REF_NAME, &format!("{HEADS_PREFIX}{DEFAULT_BRANCH}"))?;

        Ok(repository)
    }

    fn from_parts(
        path: std::path::PathBuf,
        git_dir: std::path::PathBuf,
        writer: Box<dyn std::io::Write>,
    ) -> Self {
        let database = Database::new(git_dir.join("objects").into_boxed_path());
        let refs = Refs::new(git_dir.clone().into_boxed_path());

        Repository {
            path: path.into_boxed_path(),
            git_dir: git_dir.into_boxed_path(),
            writer: RefCell::new(writer),
            database,
            refs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    /// A thread-safe view of the repository for the graph core
    pub fn commit_source(&self, include_remotes: bool) -> RepositorySource {
        RepositorySource {
            database: self.database.clone(),
            refs: self.refs.clone(),
            include_remotes,
        }
    }
}

/// Object store and refs behind the [`CommitSource`] seam
#[derive(Debug, Clone)]
pub struct RepositorySource {
    database: Database,
    refs: Refs,
    include_remotes: bool,
}

impl RepositorySource {
    /// Follow annotated tags until a commit is reached
    fn peel(&self, name: &str, oid: ObjectId) -> Result<ObjectId, GraphError> {
        let unresolved = |reason: String| GraphError::ReferenceResolution {
            name: name.to_string(),
            reason,
        };
        let mut current = oid;

        for _ in 0..MAX_TAG_CHAIN {
            if !self.database.contains(&current) {
                return Err(unresolved(format!("points to missing object {current}")));
            }

            match self
                .database
                .parse_object(&current)
                .map_err(|error| unresolved(format!("{error:#}")))?
            {
                ObjectBox::Commit(_) => return Ok(current),
                ObjectBox::Tag(tag) => {
                    debug!(name, tag = %current, target = %tag.target(), "peeling annotated tag");
                    current = tag.target().clone();
                }
                other => {
                    return Err(unresolved(format!(
                        "peels to a {} instead of a commit",
                        other.object_type()
                    )));
                }
            }
        }

        Err(unresolved(format!(
            "tag chain longer than {MAX_TAG_CHAIN} objects"
        )))
    }

    fn resolve_listing(
        &self,
        listing: anyhow::Result<Vec<ListedRef>>,
    ) -> Vec<Result<NamedRef, GraphError>> {
        let listed = match listing {
            Ok(listed) => listed,
            Err(error) => return vec![Err(GraphError::storage(error))],
        };

        listed
            .into_iter()
            .map(|listed| {
                let oid = listed
                    .target
                    .map_err(|error| GraphError::ReferenceResolution {
                        name: listed.name.clone(),
                        reason: format!("{error:#}"),
                    })?;
                let oid = self.peel(&listed.name, oid)?;
                Ok(NamedRef::new(listed.name, oid))
            })
            .collect()
    }
}

impl CommitSource for RepositorySource {
    fn list_branch_tips(&self) -> Vec<Result<NamedRef, GraphError>> {
        self.resolve_listing(self.refs.list_branches(self.include_remotes))
    }

    fn list_tags(&self) -> Vec<Result<NamedRef, GraphError>> {
        self.resolve_listing(self.refs.list_tags())
    }

    fn get_commit(&self, oid: &ObjectId) -> Result<RawCommit, GraphError> {
        if !self.database.contains(oid) {
            return Err(GraphError::CommitNotFound {
                oid: oid.clone(),
                branch: None,
            });
        }

        let commit = self
            .database
            .parse_object_as_commit(oid)
            .map_err(GraphError::storage)?
            .ok_or_else(|| GraphError::Storage {
                reason: format!("object {oid} is not a commit"),
            })?;

        Ok(RawCommit::new(
            oid.clone(),
            commit.parents().to_vec(),
            commit.author().timestamp(),
            commit.committer().timestamp(),
        ))
    }
}
