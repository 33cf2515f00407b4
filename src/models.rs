//! Core records persisted in the catalog.
//!
//! A [`Release`] owns [`Segment`]s; a [`Job`] owns an ordered list of
//! [`Step`]s. Timestamps are unix seconds.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// One published release of the crawl dataset.
#[derive(Debug, Clone, Serialize)]
pub struct Release {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
}

/// One partition of a release, individually markable as processed.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub id: i64,
    pub release_id: i64,
    /// Name of the owning release, joined in on read.
    pub release_name: String,
    pub name: String,
    pub location_uri: String,
    pub file_count: i64,
    /// `None` until a job covering this segment has been submitted.
    pub processed_at: Option<i64>,
    pub created_at: i64,
}

impl Segment {
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

/// The two kinds of execution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobVariant {
    /// One step per segment, each parsing that segment's files.
    Parse,
    /// A single step aggregating the outputs of earlier parse jobs.
    Combine,
}

impl JobVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobVariant::Parse => "parse",
            JobVariant::Combine => "combine",
        }
    }

    /// Path component under which this variant's data and logs are stored.
    pub fn stage_dir(&self) -> &'static str {
        match self {
            JobVariant::Parse => "1-parse",
            JobVariant::Combine => "2-combine",
        }
    }
}

impl fmt::Display for JobVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parse" => Ok(JobVariant::Parse),
            "combine" => Ok(JobVariant::Combine),
            other => Err(format!("unknown job variant: '{}'", other)),
        }
    }
}

/// Submission state of a job, derived from its persisted fields.
///
/// `Submitting` is never persisted; it only exists while the runner call is
/// in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Planned,
    Submitting,
    Submitted,
    SubmissionFailed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Planned => "planned",
            RunState::Submitting => "submitting",
            RunState::Submitted => "submitted",
            RunState::SubmissionFailed => "submission failed",
        };
        f.write_str(s)
    }
}

/// A compiled execution plan.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub variant: JobVariant,
    /// Millisecond epoch token, unique across all jobs.
    pub name: String,
    pub description: String,
    pub max_units_per_step: Option<i64>,
    /// The runner's identifier, set once the submission was accepted.
    pub run_handle: Option<String>,
    /// Message of the most recent failed submission.
    pub last_error: Option<String>,
    pub created_at: i64,
}

impl Job {
    pub fn run_state(&self) -> RunState {
        match (&self.run_handle, &self.last_error) {
            (Some(_), _) => RunState::Submitted,
            (None, Some(_)) => RunState::SubmissionFailed,
            (None, None) => RunState::Planned,
        }
    }
}

/// One input→output mapping of a job.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub id: i64,
    pub job_id: i64,
    pub position: i64,
    /// Set for parse steps only.
    pub segment_id: Option<i64>,
    pub segment_name: Option<String>,
    pub input_paths: Vec<String>,
    pub output_path: String,
}

/// Separator used when an input path list is stored or passed as one string.
pub const INPUT_PATH_DELIMITER: char = ',';

pub fn join_input_paths(paths: &[String]) -> String {
    paths.join(&INPUT_PATH_DELIMITER.to_string())
}

pub fn split_input_paths(joined: &str) -> Vec<String> {
    joined
        .split(INPUT_PATH_DELIMITER)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Segment counts for one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReleaseStatus {
    pub total: i64,
    pub processed: i64,
    pub remaining: i64,
}
