//! In-memory digest cache
//!
//! The whole read model lives in one immutable [`Snapshot`] published
//! through an [`ArcSwap`]. Readers grab the current `Arc<Snapshot>` and
//! never block. Full rebuilds build a fresh snapshot off to the side and
//! swap it in only on success, so a failed rebuild leaves the previous
//! snapshot serving. Point lookups that miss fetch a single entity and
//! publish it with a copy-on-write `rcu`.

mod refresh;

pub use refresh::{RefreshHandle, RefreshScheduler};

use crate::db::rows::DigestRow;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::materialize::Materializer;
use crate::metrics;
use crate::models::{Digest, Story, Timeline};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// What caused a rebuild; used as a metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Startup,
    Scheduled,
    Pointer,
    Explicit,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Scheduled => "scheduled",
            Self::Pointer => "pointer",
            Self::Explicit => "explicit",
        }
    }
}

/// Summary of a successful rebuild
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshOutcome {
    pub digest_id: Option<i64>,
    pub stories: usize,
    pub timelines: usize,
}

/// One consistent view of the cached read model
///
/// The ranked list, the id indexes and the latest digest share the same
/// `Arc`s, so a snapshot holds one copy of each entity.
#[derive(Debug, Clone)]
pub struct Snapshot {
    digest_id: Option<i64>,
    latest: Option<Arc<Digest>>,
    ranked: Arc<[Arc<Story>]>,
    stories: HashMap<i64, Arc<Story>>,
    timelines: HashMap<i64, Arc<Timeline>>,
    digests: HashMap<i64, Arc<Digest>>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            digest_id: None,
            latest: None,
            ranked: Arc::from(Vec::new()),
            stories: HashMap::new(),
            timelines: HashMap::new(),
            digests: HashMap::new(),
            refreshed_at: None,
        }
    }
}

impl Snapshot {
    /// A built snapshot with no READY digest behind it
    fn empty_at(refreshed_at: DateTime<Utc>) -> Self {
        Self {
            refreshed_at: Some(refreshed_at),
            ..Default::default()
        }
    }

    fn from_digest(digest: Digest, refreshed_at: DateTime<Utc>) -> Self {
        let ranked: Arc<[Arc<Story>]> = digest.stories.iter().cloned().collect();
        let stories = ranked.iter().map(|s| (s.id, Arc::clone(s))).collect();
        let timelines = digest
            .timelines
            .iter()
            .map(|t| (t.id, Arc::clone(t)))
            .collect();
        let digest = Arc::new(digest);

        Self {
            digest_id: Some(digest.id),
            ranked,
            stories,
            timelines,
            digests: HashMap::from([(digest.id, Arc::clone(&digest))]),
            latest: Some(digest),
            refreshed_at: Some(refreshed_at),
        }
    }

    /// Id of the digest this snapshot was built from
    pub fn digest_id(&self) -> Option<i64> {
        self.digest_id
    }

    pub fn latest_digest(&self) -> Option<&Arc<Digest>> {
        self.latest.as_ref()
    }

    /// Ranked stories of the latest digest
    pub fn stories(&self) -> &[Arc<Story>] {
        &self.ranked
    }

    /// Shared handle to the ranked list
    pub fn ranked(&self) -> Arc<[Arc<Story>]> {
        Arc::clone(&self.ranked)
    }

    pub fn story(&self, id: i64) -> Option<&Arc<Story>> {
        self.stories.get(&id)
    }

    pub fn timeline(&self, id: i64) -> Option<&Arc<Timeline>> {
        self.timelines.get(&id)
    }

    pub fn digest(&self, id: i64) -> Option<&Arc<Digest>> {
        self.digests.get(&id)
    }

    /// `None` until the first rebuild succeeds
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn is_built(&self) -> bool {
        self.refreshed_at.is_some()
    }

    fn outcome(&self) -> RefreshOutcome {
        RefreshOutcome {
            digest_id: self.digest_id,
            stories: self.stories().len(),
            timelines: self.latest.as_deref().map_or(0, |d| d.timelines.len()),
        }
    }
}

/// Snapshot holder plus the pipeline that rebuilds it
pub struct DigestCache {
    repo: Repository,
    materializer: Materializer,
    snapshot: ArcSwap<Snapshot>,
    refresh_lock: Mutex<()>,
}

impl DigestCache {
    /// Create an empty cache; nothing is fetched until the first rebuild
    pub fn new(repo: Repository, materializer: Materializer) -> Self {
        Self {
            repo,
            materializer,
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current snapshot. Holding the `Arc` keeps a consistent view even if
    /// a rebuild swaps in new data meanwhile.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Rebuild the whole snapshot from the latest READY digest.
    ///
    /// The digest id is resolved once and every sub-query binds it. Lazily
    /// filled entries are dropped. On error the current snapshot is kept.
    pub async fn rebuild(&self, trigger: RefreshTrigger) -> Result<RefreshOutcome> {
        let _guard = self.refresh_lock.lock().await;
        let start = Instant::now();

        let result = match self.repo.latest_ready_digest().await {
            Ok(latest) => self.build_and_swap(latest).await,
            Err(e) => Err(e),
        };

        self.finish(trigger, start, result)
    }

    /// Rebuild only if the latest READY digest differs from the pinned one.
    ///
    /// Returns `None` when the snapshot is already current.
    pub async fn refresh_latest(&self) -> Result<Option<RefreshOutcome>> {
        let _guard = self.refresh_lock.lock().await;
        let start = Instant::now();

        let latest = match self.repo.latest_ready_digest().await {
            Ok(latest) => latest,
            Err(e) => return self.finish(RefreshTrigger::Pointer, start, Err(e)).map(Some),
        };

        let pinned = self.snapshot.load().digest_id;
        let latest_id = latest.as_ref().map(|d| d.id);
        if self.snapshot.load().is_built() && pinned == latest_id {
            debug!(digest_id = ?pinned, "Latest digest unchanged");
            return Ok(None);
        }

        let result = self.build_and_swap(latest).await;
        self.finish(RefreshTrigger::Pointer, start, result).map(Some)
    }

    async fn build_and_swap(&self, latest: Option<DigestRow>) -> Result<RefreshOutcome> {
        let snapshot = match latest {
            None => Snapshot::empty_at(Utc::now()),
            Some(row) => {
                let rows = self
                    .repo
                    .digest_rows(row.id)
                    .await?
                    .ok_or_else(|| AppError::Internal {
                        message: format!("digest {} vanished during refresh", row.id),
                    })?;
                let digest = self.materializer.digest(rows)?;
                Snapshot::from_digest(digest, Utc::now())
            }
        };

        let outcome = snapshot.outcome();
        self.snapshot.store(Arc::new(snapshot));
        metrics::record_snapshot(outcome.stories, outcome.timelines);
        Ok(outcome)
    }

    fn finish(
        &self,
        trigger: RefreshTrigger,
        start: Instant,
        result: Result<RefreshOutcome>,
    ) -> Result<RefreshOutcome> {
        let elapsed = start.elapsed();
        metrics::record_refresh(trigger.as_str(), elapsed.as_secs_f64(), result.is_ok());

        match &result {
            Ok(outcome) => info!(
                trigger = trigger.as_str(),
                digest_id = ?outcome.digest_id,
                stories = outcome.stories,
                timelines = outcome.timelines,
                duration_ms = elapsed.as_millis() as u64,
                "Snapshot rebuilt"
            ),
            Err(e) => error!(
                trigger = trigger.as_str(),
                error = %e,
                "Snapshot rebuild failed, keeping stale snapshot"
            ),
        }

        result
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Ranked stories of the latest digest
    pub fn stories(&self) -> Arc<[Arc<Story>]> {
        self.snapshot.load().ranked()
    }

    pub fn latest_digest(&self) -> Result<Arc<Digest>> {
        self.snapshot
            .load()
            .latest_digest()
            .cloned()
            .ok_or_else(|| AppError::NotFound {
                resource_type: "digest",
                id: "latest".to_string(),
            })
    }

    pub async fn story(&self, id: i64) -> Result<Arc<Story>> {
        let cached = self.snapshot.load().story(id).cloned();
        if let Some(story) = cached {
            metrics::record_cache(true, "story");
            return Ok(story);
        }
        metrics::record_cache(false, "story");

        let rows = self
            .repo
            .story_rows(id)
            .await?
            .ok_or_else(|| AppError::not_found("story", id))?;
        let story = Arc::new(self.materializer.story(&rows)?);

        Ok(self.fill(id, story, |s| &mut s.stories))
    }

    pub async fn timeline(&self, id: i64) -> Result<Arc<Timeline>> {
        let cached = self.snapshot.load().timeline(id).cloned();
        if let Some(timeline) = cached {
            metrics::record_cache(true, "timeline");
            return Ok(timeline);
        }
        metrics::record_cache(false, "timeline");

        let rows = self
            .repo
            .timeline_rows(id)
            .await?
            .ok_or_else(|| AppError::not_found("timeline", id))?;
        let timeline = Arc::new(self.materializer.timeline(&rows));

        Ok(self.fill(id, timeline, |s| &mut s.timelines))
    }

    pub async fn digest(&self, id: i64) -> Result<Arc<Digest>> {
        let cached = self.snapshot.load().digest(id).cloned();
        if let Some(digest) = cached {
            metrics::record_cache(true, "digest");
            return Ok(digest);
        }
        metrics::record_cache(false, "digest");

        let rows = self
            .repo
            .digest_rows(id)
            .await?
            .ok_or_else(|| AppError::not_found("digest", id))?;
        let digest = Arc::new(self.materializer.digest(rows)?);

        Ok(self.fill(id, digest, |s| &mut s.digests))
    }

    /// Publish a lazily fetched entity into one index of the snapshot.
    ///
    /// The ranked list is untouched. If the index already holds `id` (a
    /// concurrent fill or rebuild got there first) that entry wins.
    fn fill<T, F>(&self, id: i64, value: Arc<T>, index: F) -> Arc<T>
    where
        F: Fn(&mut Snapshot) -> &mut HashMap<i64, Arc<T>>,
    {
        let mut stored = Arc::clone(&value);
        self.snapshot.rcu(|current| {
            let mut next = Snapshot::clone(current);
            stored = Arc::clone(index(&mut next).entry(id).or_insert_with(|| Arc::clone(&value)));
            Arc::new(next)
        });
        debug!(id, "Lazily filled cache entry");
        stored
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::db::{queries, Cell, MemoryStore};

    fn cache_over(store: &Arc<MemoryStore>) -> DigestCache {
        DigestCache::new(Repository::new(store.clone()), Materializer::default())
    }

    #[tokio::test]
    async fn test_rebuild_ranks_and_indexes() {
        let store = Arc::new(MemoryStore::new());
        seed_digest(&store, 1);
        let cache = cache_over(&store);

        let outcome = cache.rebuild(RefreshTrigger::Startup).await.unwrap();
        assert_eq!(outcome, RefreshOutcome { digest_id: Some(1), stories: 2, timelines: 1 });

        let (a, b) = story_ids(1);
        let ids: Vec<i64> = cache.stories().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a, b]);

        let snapshot = cache.snapshot();
        assert!(Arc::ptr_eq(&cache.stories()[0], snapshot.story(a).unwrap()));
        assert!(Arc::ptr_eq(&snapshot.latest_digest().unwrap().stories[1], snapshot.story(b).unwrap()));
        assert!(snapshot.timeline(150).is_some());
        assert_eq!(cache.latest_digest().unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_rebuild_pins_one_digest_id() {
        let store = Arc::new(MemoryStore::new());
        seed_digest(&store, 3);
        let cache = cache_over(&store);

        cache.rebuild(RefreshTrigger::Explicit).await.unwrap();

        let calls = store.calls();
        assert_eq!(calls[0].query, queries::LATEST_READY_DIGEST.name);
        assert!(calls[1..].iter().all(|c| c.params == vec![Cell::Int(3)]));
    }

    #[tokio::test]
    async fn test_lazy_fill_serves_second_lookup_from_cache() {
        let store = Arc::new(MemoryStore::new());
        seed_digest(&store, 1);
        seed_story(&store, 500);
        let cache = cache_over(&store);
        cache.rebuild(RefreshTrigger::Startup).await.unwrap();
        store.reset_calls();

        let first = cache.story(500).await.unwrap();
        assert!(store.call_count() > 0);
        store.reset_calls();

        let second = cache.story(500).await.unwrap();
        assert_eq!(store.call_count(), 0);
        assert_eq!(first, second);
        assert_eq!(second.articles[0].provider.name, "dw");

        // Reachable by id only, not ranked
        assert_eq!(cache.stories().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_entities_are_not_found_and_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(&store);

        assert!(matches!(cache.story(7).await, Err(AppError::NotFound { .. })));
        assert!(matches!(cache.timeline(7).await, Err(AppError::NotFound { .. })));
        assert!(matches!(cache.digest(7).await, Err(AppError::NotFound { .. })));

        store.reset_calls();
        let _ = cache.story(7).await;
        assert_eq!(store.calls_to(queries::STORY_BY_ID), 1);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_stale_snapshot() {
        let store = Arc::new(MemoryStore::new());
        seed_digest(&store, 1);
        let cache = cache_over(&store);
        cache.rebuild(RefreshTrigger::Startup).await.unwrap();
        let before = serde_json::to_vec(&cache.stories()).unwrap();

        store.set_available(false);
        let err = cache.rebuild(RefreshTrigger::Scheduled).await.unwrap_err();
        assert!(err.is_transient());

        let after = serde_json::to_vec(&cache.stories()).unwrap();
        assert_eq!(before, after);
        assert_eq!(cache.snapshot().digest_id(), Some(1));
    }

    #[tokio::test]
    async fn test_failed_materialization_keeps_stale_snapshot() {
        let store = Arc::new(MemoryStore::new());
        seed_digest(&store, 1);
        let cache = cache_over(&store);
        cache.rebuild(RefreshTrigger::Startup).await.unwrap();

        // Digest 2 references a provider nobody returns
        seed_digest(&store, 2);
        store.insert(queries::PROVIDERS_BY_DIGEST, vec![Cell::Int(2)], vec![]);

        let err = cache.rebuild(RefreshTrigger::Scheduled).await.unwrap_err();
        assert!(matches!(err, AppError::DanglingReference { .. }));
        assert_eq!(cache.snapshot().digest_id(), Some(1));
    }

    #[tokio::test]
    async fn test_refresh_latest_only_rebuilds_on_new_digest() {
        let store = Arc::new(MemoryStore::new());
        seed_digest(&store, 1);
        let cache = cache_over(&store);
        cache.rebuild(RefreshTrigger::Startup).await.unwrap();
        seed_story(&store, 500);
        cache.story(500).await.unwrap();
        store.reset_calls();

        assert_eq!(cache.refresh_latest().await.unwrap(), None);
        assert_eq!(store.call_count(), 1);
        // Lazy fills survive a no-op pointer check
        assert!(cache.snapshot().story(500).is_some());

        seed_digest(&store, 2);
        let outcome = cache.refresh_latest().await.unwrap().unwrap();
        assert_eq!(outcome.digest_id, Some(2));
        assert_eq!(cache.stories()[0].id, story_ids(2).0);
        assert!(cache.snapshot().story(500).is_none());
    }

    #[tokio::test]
    async fn test_no_ready_digest_builds_empty_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(&store);
        assert!(!cache.snapshot().is_built());

        let outcome = cache.rebuild(RefreshTrigger::Startup).await.unwrap();
        assert_eq!(outcome.digest_id, None);
        assert!(cache.stories().is_empty());
        assert!(cache.snapshot().is_built());
        assert!(matches!(cache.latest_digest(), Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_digest_lookup_by_id() {
        let store = Arc::new(MemoryStore::new());
        seed_digest(&store, 1);
        seed_digest(&store, 2);
        let cache = cache_over(&store);
        cache.rebuild(RefreshTrigger::Startup).await.unwrap();
        store.reset_calls();

        // Latest is 2 now; 1 comes from the store once
        let old = cache.digest(1).await.unwrap();
        assert_eq!(old.id, 1);
        assert_eq!(old.stories[0].id, story_ids(1).0);
        let calls = store.call_count();
        cache.digest(1).await.unwrap();
        assert_eq!(store.call_count(), calls);
    }

    #[tokio::test]
    async fn test_fill_keeps_existing_entry() {
        let store = Arc::new(MemoryStore::new());
        seed_digest(&store, 1);
        let cache = cache_over(&store);
        cache.rebuild(RefreshTrigger::Startup).await.unwrap();

        let (a, _) = story_ids(1);
        let existing = Arc::clone(cache.snapshot().story(a).unwrap());
        let mut replacement = Story::clone(&existing);
        replacement.title = "replacement".to_string();

        let returned = cache.fill(a, Arc::new(replacement), |s| &mut s.stories);
        assert!(Arc::ptr_eq(&returned, &existing));
        assert!(Arc::ptr_eq(cache.snapshot().story(a).unwrap(), &existing));
        assert_eq!(cache.stories()[0].title, existing.title);
    }

    /// Ranked list, indexes and latest digest all describe one digest
    fn assert_consistent(snapshot: &Snapshot) {
        let Some(id) = snapshot.digest_id() else {
            panic!("snapshot lost its digest");
        };
        let (a, b) = story_ids(id);
        let ranked: Vec<i64> = snapshot.stories().iter().map(|s| s.id).collect();
        assert_eq!(ranked, vec![a, b]);
        assert_eq!(snapshot.latest_digest().map(|d| d.id), Some(id));
        for story in snapshot.stories() {
            assert!(Arc::ptr_eq(story, snapshot.story(story.id).unwrap()));
        }
        assert!(snapshot.timeline(id * 100 + 50).is_some());

        let other = 3 - id;
        let (other_a, other_b) = story_ids(other);
        assert!(snapshot.story(other_a).is_none());
        assert!(snapshot.story(other_b).is_none());
        assert!(snapshot.timeline(other * 100 + 50).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fills_and_rebuilds_stay_consistent() {
        let store = Arc::new(MemoryStore::new());
        seed_digest(&store, 2);
        seed_digest(&store, 1);
        for id in 500..520 {
            seed_story(&store, id);
        }
        let cache = Arc::new(cache_over(&store));
        cache.rebuild(RefreshTrigger::Startup).await.unwrap();

        let rebuilds = {
            let (store, cache) = (Arc::clone(&store), Arc::clone(&cache));
            tokio::spawn(async move {
                for round in 0..20 {
                    seed_digest(&store, if round % 2 == 0 { 2 } else { 1 });
                    cache.rebuild(RefreshTrigger::Scheduled).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let fills: Vec<_> = (500..520)
            .map(|id| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for _ in 0..5 {
                        assert_eq!(cache.story(id).await.unwrap().id, id);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        let checker = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                for _ in 0..200 {
                    assert_consistent(&cache.snapshot());
                    tokio::task::yield_now().await;
                }
            })
        };

        rebuilds.await.unwrap();
        for fill in fills {
            fill.await.unwrap();
        }
        checker.await.unwrap();

        assert_consistent(&cache.snapshot());
        assert_eq!(cache.snapshot().digest_id(), Some(1));
    }
}
