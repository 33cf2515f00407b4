//! Capability contracts for the external collaborators.
//!
//! The catalog never talks to object storage or a batch runner directly.
//! Discovery asks a [`PartitionLister`], submission hands a compiled
//! [`LaunchRequest`] to a [`BatchRunner`], and the cluster sizing comes from
//! a [`ClusterShapeProvider`].
//!
//! ```text
//! ┌────────────────┐   ┌──────────────┐   ┌───────────────────┐
//! │PartitionLister │   │ BatchRunner  │   │ClusterShapeProvider│
//! └───────┬────────┘   └──────┬───────┘   └─────────┬─────────┘
//!         ▼                   ▼                     ▼
//!   DatasetIndex        RunCoordinator ◀────────────┘
//! ```
//!
//! Implementations report failures as [`anyhow::Error`]; the component that
//! calls them wraps the message into the crate's [`Error`](crate::error::Error)
//! taxonomy together with the release or job concerned.

use anyhow::Result;
use async_trait::async_trait;

use crate::cluster::ClusterShape;
use crate::config::ClusterConfig;
use crate::flow::LaunchRequest;

/// Lists the partitions of a dataset release.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use crawl_ledger::traits::PartitionLister;
///
/// struct Fixed(Vec<String>);
///
/// #[async_trait]
/// impl PartitionLister for Fixed {
///     async fn list_partitions(&self, _release: &str) -> Result<Vec<String>> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait PartitionLister: Send + Sync {
    /// Returns one path per partition, or per data file when a partition
    /// holds several files (repeats count towards the segment's file count).
    ///
    /// An empty result means the release has not been published.
    async fn list_partitions(&self, release: &str) -> Result<Vec<String>>;
}

/// Accepts compiled jobs for execution.
#[async_trait]
pub trait BatchRunner: Send + Sync {
    /// Launch the request, returning the runner's handle for it.
    ///
    /// A returned error means the submission was not accepted.
    async fn launch(&self, request: &LaunchRequest) -> Result<String>;
}

/// Supplies the cluster sizing used at submission time.
pub trait ClusterShapeProvider: Send + Sync {
    fn cluster_shape(&self) -> Result<ClusterShape>;
}

impl ClusterShapeProvider for ClusterConfig {
    fn cluster_shape(&self) -> Result<ClusterShape> {
        Ok(ClusterShape::from_config(self))
    }
}
