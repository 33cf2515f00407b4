//! Dataset discovery.
//!
//! Turns a release's partition listing into segment records. Discovery can
//! be repeated at any time: segments already in the catalog are left alone,
//! including their processed marker, and only new ones are counted.

use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::segments::{insert_segment_in, upsert_release_in, SegmentStore};
use crate::traits::PartitionLister;

/// A partition found in the listing, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSegment {
    pub name: String,
    pub file_count: i64,
}

/// Group listing entries by partition name, keeping first-seen order.
/// Each repeat of a partition counts as one more file.
pub fn group_partitions(paths: &[String]) -> Vec<DiscoveredSegment> {
    let mut found: Vec<DiscoveredSegment> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for path in paths {
        let name = match path.trim().trim_end_matches('/').rsplit('/').next() {
            Some(n) if !n.is_empty() => n,
            _ => continue,
        };

        match positions.get(name) {
            Some(&i) => found[i].file_count += 1,
            None => {
                positions.insert(name.to_string(), found.len());
                found.push(DiscoveredSegment {
                    name: name.to_string(),
                    file_count: 1,
                });
            }
        }
    }

    found
}

/// Canonical storage location of a segment.
pub fn segment_location(dataset_root: &str, release: &str, segment: &str) -> String {
    format!(
        "{}/{}/segments/{}/",
        dataset_root.trim_end_matches('/'),
        release,
        segment
    )
}

pub struct DatasetIndex {
    store: SegmentStore,
    lister: Arc<dyn PartitionLister>,
    dataset_root: String,
    clock: Arc<dyn Clock>,
}

impl DatasetIndex {
    pub fn new(
        store: SegmentStore,
        lister: Arc<dyn PartitionLister>,
        dataset_root: String,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            lister,
            dataset_root,
            clock,
        }
    }

    /// List the release and store any segment not yet catalogued. Returns
    /// the number of segments created; 0 for an unpublished release.
    pub async fn discover(&self, release: &str) -> Result<usize> {
        let paths = self
            .lister
            .list_partitions(release)
            .await
            .map_err(|e| Error::DiscoveryUnavailable {
                release: release.to_string(),
                message: format!("{:#}", e),
            })?;

        let partitions = group_partitions(&paths);
        if partitions.is_empty() {
            tracing::info!(release, "no partitions listed; release not published yet");
            return Ok(0);
        }

        let now = self.clock.now().timestamp();
        let mut tx = self.store.pool().begin().await?;
        let release_id = upsert_release_in(&mut *tx, release, now).await?;

        let mut created = 0usize;
        for partition in &partitions {
            let location = segment_location(&self.dataset_root, release, &partition.name);
            if insert_segment_in(
                &mut *tx,
                release_id,
                &partition.name,
                &location,
                partition.file_count,
                now,
            )
            .await?
            {
                created += 1;
            }
        }
        tx.commit().await?;

        tracing::info!(
            release,
            listed = partitions.len(),
            created,
            "discovery complete"
        );
        Ok(created)
    }

    /// Whether the release has segments, discovering them first when the
    /// catalog holds none.
    pub async fn ensure_segments(&self, release: &str) -> Result<bool> {
        if let Some(existing) = self.store.release_by_name(release).await? {
            if self.store.segment_count(existing.id).await? > 0 {
                return Ok(true);
            }
        }
        Ok(self.discover(release).await? > 0)
    }
}
