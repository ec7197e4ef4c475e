mod common;

use common::fixture::{Diamond, FixtureRepo, diamond, linear_repo};
use pretty_assertions::assert_eq;
use rstest::rstest;
use spangraph::artifacts::analysis::RepositoryAnalysis;
use spangraph::artifacts::objects::object_id::ObjectId;
use spangraph::artifacts::objects::object_type::ObjectType;
use spangraph::artifacts::objects::tag::Tag;
use spangraph::config::AnalysisConfig;
use spangraph::errors::GraphError;
use std::sync::Arc;

fn analysis(jobs: usize) -> RepositoryAnalysis {
    RepositoryAnalysis::new(AnalysisConfig {
        jobs,
        ..AnalysisConfig::default()
    })
}

#[rstest]
fn symbolic_branches_resolve_through_their_target(linear_repo: FixtureRepo) {
    linear_repo
        .repository()
        .refs()
        .set_symbolic_ref("refs/heads/alias", "refs/heads/main")
        .unwrap();

    let outcome = analysis(1)
        .run(&linear_repo.repository().commit_source(false))
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(
        outcome.snapshot.branches["alias"],
        outcome.snapshot.branches["main"]
    );
}

#[rstest]
fn broken_references_are_reported_and_skipped(linear_repo: FixtureRepo) {
    std::fs::write(linear_repo.git_dir().join("refs/heads/empty"), "").unwrap();
    let missing = ObjectId::try_parse("ab".repeat(20)).unwrap();
    linear_repo.tag("dangling", &missing);

    let outcome = analysis(1)
        .run(&linear_repo.repository().commit_source(false))
        .unwrap();

    assert_eq!(outcome.table.len(), 3);
    assert_eq!(outcome.errors.len(), 2);
    assert!(outcome.errors.iter().all(|error| matches!(
        error,
        GraphError::ReferenceResolution { .. }
    )));
    assert!(outcome.errors.iter().any(|error| error.to_string().contains("dangling")));
}

#[rstest]
fn nested_annotated_tags_are_peeled(diamond: Diamond) {
    let repository = diamond.repo.repository();
    let inner = repository.refs().resolve("refs/tags/v1").unwrap();
    let outer = Tag::new(
        inner.clone(),
        ObjectType::Tag,
        "v1-signed".to_string(),
        None,
        "Signed v1\n".to_string(),
    );
    let outer = repository.database().store(&outer).unwrap();
    diamond.repo.tag("v1-signed", &outer);

    let outcome = analysis(1)
        .run(&repository.commit_source(false))
        .unwrap();

    assert_ne!(inner, diamond.c);
    assert_eq!(outcome.snapshot.tags["v1"], diamond.c);
    assert_eq!(outcome.snapshot.tags["v1-signed"], diamond.c);
    assert!(outcome.errors.is_empty());
}

#[rstest]
#[tokio::test]
async fn parallel_run_over_disk_matches_sequential(diamond: Diamond) {
    let source = Arc::new(diamond.repo.repository().commit_source(false));

    let sequential = analysis(1).run(source.as_ref()).unwrap();
    let parallel = analysis(4).run_parallel(source).await.unwrap();

    assert_eq!(parallel.table, sequential.table);
    assert_eq!(parallel.errors, sequential.errors);
    assert_eq!(parallel.spans_allocated, sequential.spans_allocated);
}
