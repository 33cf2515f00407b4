//! Step planning.
//!
//! [`plan_parse`] and [`plan_combine`] are pure: they turn catalog state into
//! a [`JobPlan`] without touching storage or any external service. The
//! [`StepPlanner`] wraps them with job naming and persistence.
//!
//! # Output layout
//!
//! ```text
//! {output_root}/data/1-parse/{job}/segments/{segment}/   parse step output
//! {output_root}/data/2-combine/{job}/                    combine step output
//! {output_root}/logs/{stage}/{job}/                      runner logs
//! ```
//!
//! A combine step reads every segment directory of each parse job it
//! aggregates through a wildcard, so its inputs never name segments.

use std::sync::Arc;

use crate::clock::JobNamer;
use crate::error::{Error, Result};
use crate::ledger::JobLedger;
use crate::models::{Job, JobVariant, Segment};

/// Settings the planner needs; nothing else is read.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// URI prefix for job data and logs (e.g. `s3://my-bucket`).
    pub output_root: String,
    /// Appended to a segment's location to select the files a parse step reads.
    pub parse_input_filter: String,
    /// Appended to each parse job's segment wildcard for combine steps.
    pub combine_input_filter: String,
}

/// A step before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub segment_id: Option<i64>,
    pub segment_name: Option<String>,
    pub input_paths: Vec<String>,
    pub output_path: String,
}

/// A job before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPlan {
    pub variant: JobVariant,
    pub name: String,
    pub description: String,
    pub max_units_per_step: Option<i64>,
    pub steps: Vec<PlannedStep>,
}

/// An earlier parse job referenced by a combine plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorJob {
    pub name: String,
    pub step_count: i64,
}

fn uri(root: &str, path: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Where the runner writes logs for a job.
pub fn log_uri(output_root: &str, variant: JobVariant, job_name: &str) -> String {
    uri(
        output_root,
        &format!("logs/{}/{}/", variant.stage_dir(), job_name),
    )
}

fn parse_job_root(output_root: &str, job_name: &str) -> String {
    uri(
        output_root,
        &format!("data/{}/{}/segments", JobVariant::Parse.stage_dir(), job_name),
    )
}

/// One step per segment, in the order given.
///
/// An empty segment list yields a plan with no steps.
pub fn plan_parse(
    config: &PlannerConfig,
    job_name: String,
    segments: &[Segment],
    max_units_per_step: Option<u32>,
) -> JobPlan {
    let job_root = parse_job_root(&config.output_root, &job_name);

    let steps = segments
        .iter()
        .map(|segment| PlannedStep {
            segment_id: Some(segment.id),
            segment_name: Some(segment.name.clone()),
            input_paths: vec![format!(
                "{}{}",
                segment.location_uri, config.parse_input_filter
            )],
            output_path: format!("{}/{}/", job_root, segment.name),
        })
        .collect();

    let release = segments
        .first()
        .map(|s| s.release_name.as_str())
        .unwrap_or("-");
    let files = match max_units_per_step {
        Some(n) => format!("{} files per segment", n),
        None => "all files".to_string(),
    };

    JobPlan {
        variant: JobVariant::Parse,
        description: format!(
            "Release: {} Segments: {} Parsing: {}",
            release,
            segments.len(),
            files
        ),
        name: job_name,
        max_units_per_step: max_units_per_step.map(i64::from),
        steps,
    }
}

/// A single step reading the output of every prior parse job that has at
/// least one step. With no such job the plan has no steps at all.
pub fn plan_combine(config: &PlannerConfig, job_name: String, inputs: &[PriorJob]) -> JobPlan {
    let contributing: Vec<&PriorJob> = inputs.iter().filter(|j| j.step_count > 0).collect();
    let segment_count: i64 = contributing.iter().map(|j| j.step_count).sum();

    let input_paths: Vec<String> = contributing
        .iter()
        .map(|j| {
            format!(
                "{}/*/{}",
                parse_job_root(&config.output_root, &j.name),
                config.combine_input_filter
            )
        })
        .collect();

    let steps = if input_paths.is_empty() {
        Vec::new()
    } else {
        vec![PlannedStep {
            segment_id: None,
            segment_name: None,
            input_paths,
            output_path: uri(
                &config.output_root,
                &format!("data/{}/{}/", JobVariant::Combine.stage_dir(), job_name),
            ),
        }]
    };

    JobPlan {
        variant: JobVariant::Combine,
        description: format!("Combining: {} segments", segment_count),
        name: job_name,
        max_units_per_step: None,
        steps,
    }
}

/// Derives plans and records them in the ledger.
pub struct StepPlanner {
    config: PlannerConfig,
    namer: Arc<JobNamer>,
    ledger: JobLedger,
}

impl StepPlanner {
    pub fn new(config: PlannerConfig, namer: Arc<JobNamer>, ledger: JobLedger) -> Self {
        Self {
            config,
            namer,
            ledger,
        }
    }

    async fn next_job_name(&self) -> Result<String> {
        if let Some(latest) = self.ledger.latest_job_millis().await? {
            self.namer.observe(latest);
        }
        Ok(self.namer.next_name())
    }

    pub async fn create_parse_job(
        &self,
        segments: &[Segment],
        max_units_per_step: Option<u32>,
    ) -> Result<Job> {
        let plan = plan_parse(
            &self.config,
            self.next_job_name().await?,
            segments,
            max_units_per_step,
        );
        let now = self.namer.clock().now().timestamp();
        let job = self.ledger.record(&plan, now).await?;

        tracing::info!(
            job = %job.name,
            steps = plan.steps.len(),
            max_units_per_step = ?max_units_per_step,
            "parse job planned"
        );
        Ok(job)
    }

    /// Resolve each named parse job and plan one combine job over them.
    /// Names that do not resolve are skipped.
    pub async fn create_combine_job(&self, job_names: &[String]) -> Result<Job> {
        let mut inputs = Vec::with_capacity(job_names.len());
        for name in job_names {
            match self.ledger.resolve_prior(name).await {
                Ok(prior) => inputs.push(prior),
                Err(Error::NotFound { what, name }) => {
                    tracing::warn!(what, %name, "combine input skipped");
                }
                Err(e) => return Err(e),
            }
        }

        let plan = plan_combine(&self.config, self.next_job_name().await?, &inputs);
        if plan.steps.is_empty() {
            tracing::warn!(job = %plan.name, "no combine input resolved; job has no steps");
        }

        let now = self.namer.clock().now().timestamp();
        let job = self.ledger.record(&plan, now).await?;

        tracing::info!(job = %job.name, inputs = inputs.len(), "combine job planned");
        Ok(job)
    }
}
