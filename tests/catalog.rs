//! Integration tests for the segment catalog and discovery.
//!
//! Each test runs against a fresh SQLite database in a temporary directory,
//! with an in-memory partition lister standing in for object storage.

use anyhow::Result;
use async_trait::async_trait;
use crawl_ledger::clock::{Clock, ManualClock};
use crawl_ledger::db;
use crawl_ledger::error::Error;
use crawl_ledger::index::DatasetIndex;
use crawl_ledger::migrate;
use crawl_ledger::models::ReleaseStatus;
use crawl_ledger::segments::{SegmentStore, MAX_SEGMENTS_PER_JOB};
use crawl_ledger::traits::PartitionLister;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const ROOT: &str = "s3://aws-publicdatasets/common-crawl/crawl-data";
const RELEASE: &str = "CC-MAIN-2014-49";

// ─── Test listers ───────────────────────────────────────────────────

/// Lister whose listing can be changed between discoveries.
#[derive(Default)]
struct MemoryLister {
    paths: Mutex<Vec<String>>,
}

impl MemoryLister {
    fn with_segments(names: &[&str]) -> Self {
        let lister = Self::default();
        lister.set(names);
        lister
    }

    fn set(&self, names: &[&str]) {
        *self.paths.lock().unwrap() = names.iter().map(|n| partition(n)).collect();
    }
}

#[async_trait]
impl PartitionLister for MemoryLister {
    async fn list_partitions(&self, _release: &str) -> Result<Vec<String>> {
        Ok(self.paths.lock().unwrap().clone())
    }
}

struct FailingLister;

#[async_trait]
impl PartitionLister for FailingLister {
    async fn list_partitions(&self, _release: &str) -> Result<Vec<String>> {
        anyhow::bail!("access denied")
    }
}

fn partition(name: &str) -> String {
    format!("common-crawl/crawl-data/{}/segments/{}", RELEASE, name)
}

// ─── Helpers ────────────────────────────────────────────────────────

async fn setup() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("data/ledger.sqlite"))
        .await
        .unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    (tmp, pool)
}

fn clock() -> Arc<dyn Clock> {
    Arc::new(ManualClock::at_millis(1_417_000_000_000))
}

fn index(pool: &SqlitePool, lister: Arc<dyn PartitionLister>) -> DatasetIndex {
    DatasetIndex::new(SegmentStore::new(pool.clone()), lister, ROOT.to_string(), clock())
}

async fn release_id(store: &SegmentStore) -> i64 {
    store.release_by_name(RELEASE).await.unwrap().unwrap().id
}

fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}", 1416400372000_i64 + i as i64)).collect()
}

// ─── Discovery ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_discover_creates_segments_with_locations() {
    let (_tmp, pool) = setup().await;
    let lister = Arc::new(MemoryLister::with_segments(&["1416400372202", "1416400372490"]));

    let created = index(&pool, lister).discover(RELEASE).await.unwrap();
    assert_eq!(created, 2);

    let store = SegmentStore::new(pool.clone());
    let segments = store.segments(release_id(&store).await).await.unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].name, "1416400372202");
    assert_eq!(segments[0].release_name, RELEASE);
    assert_eq!(
        segments[0].location_uri,
        format!("{}/{}/segments/1416400372202/", ROOT, RELEASE)
    );
    assert!(segments.iter().all(|s| !s.is_processed()));
}

#[tokio::test]
async fn test_discover_is_idempotent() {
    let (_tmp, pool) = setup().await;
    let lister = Arc::new(MemoryLister::with_segments(&["a1", "a2", "a3"]));
    let index = index(&pool, lister);

    assert_eq!(index.discover(RELEASE).await.unwrap(), 3);
    assert_eq!(index.discover(RELEASE).await.unwrap(), 0);

    let store = SegmentStore::new(pool.clone());
    assert_eq!(store.releases().await.unwrap().len(), 1);
    assert_eq!(store.segment_count(release_id(&store).await).await.unwrap(), 3);
}

#[tokio::test]
async fn test_rediscovery_keeps_processed_markers() {
    let (_tmp, pool) = setup().await;
    let lister = Arc::new(MemoryLister::with_segments(&["a1", "a2"]));
    let index = index(&pool, lister.clone());
    index.discover(RELEASE).await.unwrap();

    let store = SegmentStore::new(pool.clone());
    let rid = release_id(&store).await;
    let first = store.segments(rid).await.unwrap()[0].clone();
    store.mark_processed(&[first.id], 1_417_000_000).await.unwrap();

    lister.set(&["a1", "a2", "a3"]);
    assert_eq!(index.discover(RELEASE).await.unwrap(), 1);

    let after = store.segment(first.id).await.unwrap().unwrap();
    assert_eq!(after.processed_at, Some(1_417_000_000));
    assert_eq!(
        store.status(rid).await.unwrap(),
        ReleaseStatus {
            total: 3,
            processed: 1,
            remaining: 2
        }
    );
}

#[tokio::test]
async fn test_repeated_partitions_count_files() {
    let (_tmp, pool) = setup().await;
    let lister = Arc::new(MemoryLister::with_segments(&["a1", "a1", "a1", "a2"]));
    assert_eq!(index(&pool, lister).discover(RELEASE).await.unwrap(), 2);

    let store = SegmentStore::new(pool.clone());
    let segments = store.segments(release_id(&store).await).await.unwrap();
    assert_eq!(segments[0].file_count, 3);
    assert_eq!(segments[1].file_count, 1);
}

#[tokio::test]
async fn test_empty_listing_creates_nothing() {
    let (_tmp, pool) = setup().await;
    let lister = Arc::new(MemoryLister::default());

    assert_eq!(index(&pool, lister).discover(RELEASE).await.unwrap(), 0);

    let store = SegmentStore::new(pool.clone());
    assert!(store.release_by_name(RELEASE).await.unwrap().is_none());
    assert!(store.releases().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_failure_is_discovery_unavailable() {
    let (_tmp, pool) = setup().await;

    let err = index(&pool, Arc::new(FailingLister))
        .discover(RELEASE)
        .await
        .unwrap_err();

    match err {
        Error::DiscoveryUnavailable { release, message } => {
            assert_eq!(release, RELEASE);
            assert!(message.contains("access denied"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(SegmentStore::new(pool.clone())
        .releases()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_ensure_segments_discovers_on_first_use() {
    let (_tmp, pool) = setup().await;
    let lister = Arc::new(MemoryLister::with_segments(&["a1"]));
    let index = index(&pool, lister.clone());

    assert!(index.ensure_segments(RELEASE).await.unwrap());

    // Already catalogued: the listing is not consulted again.
    lister.set(&[]);
    assert!(index.ensure_segments(RELEASE).await.unwrap());
    assert!(!index.ensure_segments("CC-MAIN-2099-01").await.unwrap());
}

// ─── Selection ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_unprocessed_is_bounded() {
    let (_tmp, pool) = setup().await;
    let all = names(300);
    let refs: Vec<&str> = all.iter().map(String::as_str).collect();
    index(&pool, Arc::new(MemoryLister::with_segments(&refs)))
        .discover(RELEASE)
        .await
        .unwrap();

    let store = SegmentStore::new(pool.clone());
    let rid = release_id(&store).await;

    assert_eq!(
        store.unprocessed(rid, None).await.unwrap().len(),
        MAX_SEGMENTS_PER_JOB
    );
    assert_eq!(
        store.unprocessed(rid, Some(1000)).await.unwrap().len(),
        MAX_SEGMENTS_PER_JOB
    );

    let two = store.unprocessed(rid, Some(2)).await.unwrap();
    assert_eq!(
        two.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec![all[0].as_str(), all[1].as_str()]
    );
}

#[tokio::test]
async fn test_unprocessed_skips_processed_segments() {
    let (_tmp, pool) = setup().await;
    index(&pool, Arc::new(MemoryLister::with_segments(&["a1", "a2", "a3"])))
        .discover(RELEASE)
        .await
        .unwrap();

    let store = SegmentStore::new(pool.clone());
    let rid = release_id(&store).await;
    let segments = store.segments(rid).await.unwrap();
    store.mark_processed(&[segments[0].id], 100).await.unwrap();

    let next = store.unprocessed(rid, Some(5)).await.unwrap();
    assert_eq!(
        next.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec!["a2", "a3"]
    );
}

#[tokio::test]
async fn test_select_ignores_unknown_names() {
    let (_tmp, pool) = setup().await;
    index(&pool, Arc::new(MemoryLister::with_segments(&["a1", "a2", "a3"])))
        .discover(RELEASE)
        .await
        .unwrap();

    let store = SegmentStore::new(pool.clone());
    let rid = release_id(&store).await;

    let picked = store
        .select(rid, &["a3".to_string(), "zz".to_string(), "a1".to_string()])
        .await
        .unwrap();
    assert_eq!(
        picked.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec!["a1", "a3"]
    );
    assert!(store.select(rid, &[]).await.unwrap().is_empty());
}

// ─── Processed markers ──────────────────────────────────────────────

#[tokio::test]
async fn test_mark_processed_keeps_first_timestamp() {
    let (_tmp, pool) = setup().await;
    index(&pool, Arc::new(MemoryLister::with_segments(&["a1"])))
        .discover(RELEASE)
        .await
        .unwrap();

    let store = SegmentStore::new(pool.clone());
    let id = store.segments(release_id(&store).await).await.unwrap()[0].id;

    assert_eq!(store.mark_processed(&[id], 100).await.unwrap(), 1);
    assert_eq!(store.mark_processed(&[id], 200).await.unwrap(), 0);
    assert_eq!(
        store.segment(id).await.unwrap().unwrap().processed_at,
        Some(100)
    );
}

#[tokio::test]
async fn test_reset_release_clears_only_that_release() {
    let (_tmp, pool) = setup().await;
    let store = SegmentStore::new(pool.clone());

    index(&pool, Arc::new(MemoryLister::with_segments(&["a1", "a2"])))
        .discover(RELEASE)
        .await
        .unwrap();
    index(&pool, Arc::new(MemoryLister::with_segments(&["b1"])))
        .discover("CC-MAIN-2014-52")
        .await
        .unwrap();

    let rid = release_id(&store).await;
    let other = store
        .release_by_name("CC-MAIN-2014-52")
        .await
        .unwrap()
        .unwrap()
        .id;

    let ids: Vec<i64> = store
        .segments(rid)
        .await
        .unwrap()
        .iter()
        .chain(store.segments(other).await.unwrap().iter())
        .map(|s| s.id)
        .collect();
    store.mark_processed(&ids, 100).await.unwrap();

    assert_eq!(store.reset_release(rid).await.unwrap(), 2);
    assert_eq!(store.status(rid).await.unwrap().processed, 0);
    assert_eq!(store.status(other).await.unwrap().processed, 1);
    assert_eq!(store.unprocessed(rid, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_status_counts() {
    let (_tmp, pool) = setup().await;
    index(&pool, Arc::new(MemoryLister::with_segments(&["a1", "a2", "a3"])))
        .discover(RELEASE)
        .await
        .unwrap();

    let store = SegmentStore::new(pool.clone());
    let rid = release_id(&store).await;
    let segments = store.segments(rid).await.unwrap();
    store
        .mark_processed(&[segments[0].id, segments[1].id], 100)
        .await
        .unwrap();

    assert_eq!(
        store.status(rid).await.unwrap(),
        ReleaseStatus {
            total: 3,
            processed: 2,
            remaining: 1
        }
    );
}
