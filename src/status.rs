//! Release status and job history.
//!
//! [`overview`] gathers per-release segment counts and the submitted-job
//! history; [`print_overview`] prints it for `crawl-ledger status`.

use serde::Serialize;

use crate::error::Result;
use crate::ledger::JobLedger;
use crate::models::{Job, Release, ReleaseStatus};
use crate::segments::SegmentStore;

/// Number of history entries shown unless all are requested.
pub const DEFAULT_HISTORY_LIMIT: i64 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseReport {
    pub release: Release,
    pub status: ReleaseStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub releases: Vec<ReleaseReport>,
    pub history: Vec<Job>,
    pub history_truncated: bool,
}

pub async fn overview(store: &SegmentStore, ledger: &JobLedger, show_all: bool) -> Result<Overview> {
    let mut releases = Vec::new();
    for release in store.releases().await? {
        let status = store.status(release.id).await?;
        releases.push(ReleaseReport { release, status });
    }

    let limit = if show_all {
        None
    } else {
        Some(DEFAULT_HISTORY_LIMIT)
    };
    let history = ledger.history(limit).await?;

    Ok(Overview {
        releases,
        history,
        history_truncated: !show_all,
    })
}

/// Print the overview.
pub fn print_overview(overview: &Overview) {
    println!("Release Status");
    if overview.releases.is_empty() {
        println!("  (no releases discovered)");
    }
    for r in &overview.releases {
        println!(
            "  {} Segments: to parse {}, parsed {}, total {}",
            r.release.name, r.status.remaining, r.status.processed, r.status.total
        );
    }

    println!();
    if overview.history_truncated {
        println!("Job History (last {})", DEFAULT_HISTORY_LIMIT);
    } else {
        println!("Job History");
    }
    for job in &overview.history {
        println!("  {}", history_line(job));
    }
}

pub fn history_line(job: &Job) -> String {
    format!(
        "{} Launched: {} {}",
        job.name,
        format_ts(job.created_at),
        job.description
    )
}

pub fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobVariant;

    #[test]
    fn history_line_has_name_time_and_description() {
        let job = Job {
            id: 1,
            variant: JobVariant::Parse,
            name: "1389789645620".into(),
            description: "Release: CC-MAIN-2013-20 Segments: 3 Parsing: all files".into(),
            max_units_per_step: None,
            run_handle: Some("j-3QHDKKBT6VAIS".into()),
            last_error: None,
            created_at: 1_389_789_645,
        };
        assert_eq!(
            history_line(&job),
            "1389789645620 Launched: 2014-01-15 12:40:45 Release: CC-MAIN-2013-20 Segments: 3 Parsing: all files"
        );
    }
}
