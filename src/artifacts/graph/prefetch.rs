//! Parallel history prefetch
//!
//! Reading commit objects is the expensive part of discovery, and walks from
//! different branch tips only ever read. Each tip therefore gets a blocking
//! worker that walks backwards and claims hashes in a shared [`DashMap`]:
//! claiming is an atomic create-if-absent, and only the claiming worker reads
//! the commit and expands its parents. Nothing is fetched twice and no child
//! edge is lost to a race, because edges are not recorded here at all.
//!
//! The sequential [`GraphBuilder`](super::builder::GraphBuilder) then runs over
//! the filled cache, so the table it builds (and therefore every span) does
//! not depend on how the workers were scheduled.

use crate::artifacts::graph::source::{CommitSource, InMemorySource, NamedRef, RawCommit};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::GraphError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

#[derive(Debug)]
enum Slot {
    /// Claimed by a worker that is still reading it
    Pending,
    Ready(RawCommit),
    Failed(GraphError),
}

struct SharedCache {
    slots: DashMap<ObjectId, Slot>,
    claimed: AtomicUsize,
    max_commits: Option<usize>,
}

impl SharedCache {
    /// Returns true if the caller won the hash and must read it
    fn claim(&self, oid: &ObjectId) -> Result<bool, GraphError> {
        match self.slots.entry(oid.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                let claimed = self.claimed.fetch_add(1, Ordering::SeqCst);
                if let Some(limit) = self.max_commits
                    && claimed >= limit
                {
                    return Err(GraphError::CommitLimitExceeded { limit });
                }
                vacant.insert(Slot::Pending);
                Ok(true)
            }
        }
    }

    fn fill(&self, oid: ObjectId, slot: Slot) {
        self.slots.insert(oid, slot);
    }
}

fn walk_into_cache<S: CommitSource + ?Sized>(
    source: &S,
    cache: &SharedCache,
    tip: ObjectId,
) -> Result<usize, GraphError> {
    let mut stack = vec![tip];
    let mut fetched = 0;

    while let Some(oid) = stack.pop() {
        if !cache.claim(&oid)? {
            continue;
        }

        match source.get_commit(&oid) {
            Ok(raw) => {
                stack.extend(raw.parents.iter().rev().cloned());
                cache.fill(oid, Slot::Ready(raw));
                fetched += 1;
            }
            Err(error) => cache.fill(oid, Slot::Failed(error)),
        }
    }

    Ok(fetched)
}

/// Read every commit reachable from `tips` using up to `jobs` workers
///
/// The returned source answers `get_commit` from memory, including replaying
/// the failures seen while reading, and carries the same refs as `source`.
pub async fn prefetch<S: CommitSource + 'static>(
    source: Arc<S>,
    tips: &[NamedRef],
    jobs: usize,
    max_commits: Option<usize>,
) -> Result<InMemorySource, GraphError> {
    let cache = Arc::new(SharedCache {
        slots: DashMap::new(),
        claimed: AtomicUsize::new(0),
        max_commits,
    });
    let permits = Arc::new(Semaphore::new(jobs.max(1)));
    let mut workers = JoinSet::new();

    for tip in tips {
        let source = source.clone();
        let cache = cache.clone();
        let permits = permits.clone();
        let tip = tip.clone();

        workers.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|error| GraphError::invariant(format!("worker pool closed: {error}")))?;

            let branch = tip.name.clone();
            let fetched = tokio::task::spawn_blocking(move || {
                walk_into_cache(source.as_ref(), &cache, tip.oid)
            })
            .await
            .map_err(|error| GraphError::invariant(format!("discovery worker failed: {error}")))??;

            debug!(branch, fetched, "prefetch worker finished");
            Ok::<_, GraphError>(fetched)
        });
    }

    let mut outcome = Ok(());
    while let Some(joined) = workers.join_next().await {
        let result = joined
            .map_err(|error| GraphError::invariant(format!("discovery worker failed: {error}")))
            .and_then(|result| result);
        if let Err(error) = result
            && outcome.is_ok()
        {
            outcome = Err(error);
        }
    }
    outcome?;

    let cache = Arc::try_unwrap(cache)
        .map_err(|_| GraphError::invariant("prefetch cache still shared after workers joined"))?;

    let mut prefetched = InMemorySource::new();
    prefetched.set_refs(source.list_branch_tips(), source.list_tags());
    for (oid, slot) in cache.slots {
        match slot {
            Slot::Ready(raw) => {
                prefetched.insert_commit(raw);
            }
            Slot::Failed(error) => {
                prefetched.insert_failure(oid, error);
            }
            Slot::Pending => {
                return Err(GraphError::invariant(format!(
                    "commit {oid} was claimed but never read"
                )));
            }
        }
    }

    info!(commits = prefetched.len(), workers = jobs, "prefetched history");
    Ok(prefetched)
}
