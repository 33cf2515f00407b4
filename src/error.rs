//! Error taxonomy for catalog, planning, and submission operations.
//!
//! Capability failures (listing, launching) are wrapped with the release or
//! job they concern so the caller can tell which operation to retry.

/// Errors produced by the segment catalog, job ledger, and run coordinator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The partition listing for a release could not be fetched.
    #[error("discovery unavailable for release '{release}': {message}")]
    DiscoveryUnavailable { release: String, message: String },

    /// Catalog read or write failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// The batch runner rejected or failed to accept a job.
    #[error("execution dispatch failed for job '{job}': {message}")]
    DispatchFailed { job: String, message: String },

    /// A referenced record does not exist.
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    /// The job already holds a run handle and cannot be submitted again.
    #[error("job '{job}' was already submitted as {run_handle}")]
    AlreadySubmitted { job: String, run_handle: String },

    /// The job has no steps to run.
    #[error("job '{job}' has no steps to submit")]
    EmptyPlan { job: String },

    /// A read-only collaborator (e.g. the cluster shape provider) failed.
    #[error("{what} unavailable: {message}")]
    Capability { what: &'static str, message: String },
}

impl Error {
    pub(crate) fn job_not_found(name: &str) -> Self {
        Error::NotFound {
            what: "job",
            name: name.to_string(),
        }
    }

    /// Whether the operation may be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::DispatchFailed { .. } | Error::DiscoveryUnavailable { .. }
        )
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
