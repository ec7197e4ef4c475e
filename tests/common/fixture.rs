//! On-disk fixture repositories written with the crate's own object store

use assert_fs::TempDir;
use chrono::DateTime;
use fake::Fake;
use fake::faker::internet::en::FreeEmail;
use fake::faker::name::en::Name;
use rstest::fixture;
use spangraph::areas::repository::Repository;
use spangraph::artifacts::objects::commit::{Author, Commit};
use spangraph::artifacts::objects::object_id::ObjectId;
use spangraph::artifacts::objects::object_type::ObjectType;
use spangraph::artifacts::objects::tag::Tag;
use spangraph::artifacts::refs::ref_name::RefName;
use std::path::Path;

/// Hash of the empty tree; commits never need their tree to be present
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Base of every fixture clock, 2023-11-14T22:13:20Z
pub const EPOCH: i64 = 1_700_000_000;

pub struct FixtureRepo {
    dir: TempDir,
    repository: Repository,
}

fn random_author(seconds: i64) -> Author {
    Author::new(
        Name().fake::<String>(),
        FreeEmail().fake::<String>(),
        DateTime::from_timestamp(EPOCH + seconds, 0)
            .expect("valid fixture timestamp")
            .fixed_offset(),
    )
}

fn ref_name(name: &str) -> RefName {
    RefName::try_parse(name.to_string()).expect("valid fixture ref name")
}

impl FixtureRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let repository =
            Repository::init(dir.path(), Box::new(std::io::sink())).expect("Failed to init repository");

        FixtureRepo { dir, repository }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git_dir(&self) -> &Path {
        self.repository.git_dir()
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Commit authored and committed `seconds` after [`EPOCH`]
    pub fn commit(&self, parents: &[&ObjectId], seconds: i64, message: &str) -> ObjectId {
        self.commit_at(parents, seconds, seconds, message)
    }

    pub fn commit_at(
        &self,
        parents: &[&ObjectId],
        authored: i64,
        committed: i64,
        message: &str,
    ) -> ObjectId {
        let commit = Commit::new(
            parents.iter().map(|parent| (*parent).clone()).collect(),
            ObjectId::try_parse(EMPTY_TREE.to_string()).expect("valid tree id"),
            random_author(authored),
            random_author(committed),
            message.to_string(),
        );

        self.repository
            .database()
            .store(&commit)
            .expect("Failed to store commit")
    }

    pub fn branch(&self, name: &str, oid: &ObjectId) {
        self.repository
            .refs()
            .create_branch(&ref_name(name), oid)
            .expect("Failed to create branch");
    }

    pub fn remote_branch(&self, remote: &str, name: &str, oid: &ObjectId) {
        self.repository
            .refs()
            .update_ref(&format!("refs/remotes/{remote}/{name}"), oid)
            .expect("Failed to create remote branch");
    }

    pub fn tag(&self, name: &str, oid: &ObjectId) {
        self.repository
            .refs()
            .create_tag(&ref_name(name), oid)
            .expect("Failed to create tag");
    }

    /// Annotated tag object plus the ref pointing at it
    pub fn annotated_tag(&self, name: &str, oid: &ObjectId) -> ObjectId {
        let tag = Tag::new(
            oid.clone(),
            ObjectType::Commit,
            name.to_string(),
            Some(random_author(0)),
            format!("Release {name}\n"),
        );
        let tag_oid = self
            .repository
            .database()
            .store(&tag)
            .expect("Failed to store tag");
        self.tag(name, &tag_oid);
        tag_oid
    }

    pub fn pack_refs(&self, entries: &[(&str, &ObjectId)]) {
        let entries = entries
            .iter()
            .map(|(name, oid)| (name.to_string(), (*oid).clone()))
            .collect::<Vec<_>>();
        self.repository
            .refs()
            .write_packed_refs(&entries)
            .expect("Failed to write packed refs");
    }

    pub fn write_config(&self, content: &str) {
        std::fs::write(self.git_dir().join("spangraph.toml"), content)
            .expect("Failed to write config");
    }
}

/// Hashes of a history with one split and one merge
///
/// ```text
/// A - B ----- D (main)
///      \     /
///       C --    (topic, tagged v1)
/// ```
pub struct Diamond {
    pub repo: FixtureRepo,
    pub a: ObjectId,
    pub b: ObjectId,
    pub c: ObjectId,
    pub d: ObjectId,
}

#[fixture]
pub fn empty_repo() -> FixtureRepo {
    FixtureRepo::new()
}

#[fixture]
pub fn linear_repo() -> FixtureRepo {
    let repo = FixtureRepo::new();
    let a = repo.commit(&[], 100, "first");
    let b = repo.commit(&[&a], 200, "second");
    let c = repo.commit(&[&b], 300, "third");
    repo.branch("main", &c);
    repo
}

#[fixture]
pub fn diamond() -> Diamond {
    let repo = FixtureRepo::new();
    let a = repo.commit(&[], 100, "root");
    let b = repo.commit(&[&a], 200, "split");
    let c = repo.commit(&[&b], 300, "topic work");
    // committer clock of the merge lags behind its topic parent
    let d = repo.commit_at(&[&b, &c], 400, 250, "merge topic");
    repo.branch("main", &d);
    repo.branch("topic", &c);
    repo.annotated_tag("v1", &c);

    Diamond { repo, a, b, c, d }
}
