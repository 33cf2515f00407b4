//! Run coordination.
//!
//! A job moves `Planned → Submitting → Submitted` or
//! `Planned → Submitting → SubmissionFailed`. Only the runner call happens
//! between the first and second transition. The run handle and the
//! processed markers of a parse job's segments are written together, after
//! the runner accepted the job; a failed launch changes no segment.
//! `Submitted` is terminal; a `SubmissionFailed` job can be submitted again
//! and reuses its recorded steps.

use std::sync::Arc;

use crate::clock::Clock;
use crate::cluster::ClusterShape;
use crate::config::{StepConfig, StepsConfig};
use crate::error::{Error, Result};
use crate::flow;
use crate::ledger::JobLedger;
use crate::models::{JobVariant, RunState};
use crate::traits::{BatchRunner, ClusterShapeProvider};

pub struct RunCoordinator {
    ledger: JobLedger,
    runner: Arc<dyn BatchRunner>,
    cluster: Arc<dyn ClusterShapeProvider>,
    steps: StepsConfig,
    output_root: String,
    clock: Arc<dyn Clock>,
}

impl RunCoordinator {
    pub fn new(
        ledger: JobLedger,
        runner: Arc<dyn BatchRunner>,
        cluster: Arc<dyn ClusterShapeProvider>,
        steps: StepsConfig,
        output_root: String,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            runner,
            cluster,
            steps,
            output_root,
            clock,
        }
    }

    fn step_config(&self, variant: JobVariant) -> &StepConfig {
        match variant {
            JobVariant::Parse => &self.steps.parse,
            JobVariant::Combine => &self.steps.combine,
        }
    }

    fn cluster_shape(&self) -> Result<ClusterShape> {
        self.cluster
            .cluster_shape()
            .map_err(|e| Error::Capability {
                what: "cluster shape",
                message: format!("{:#}", e),
            })
    }

    /// Submit a planned job and return the runner's handle.
    pub async fn submit(&self, job_name: &str) -> Result<String> {
        let job = self.ledger.job(job_name).await?;
        if let Some(handle) = &job.run_handle {
            return Err(Error::AlreadySubmitted {
                job: job.name.clone(),
                run_handle: handle.clone(),
            });
        }

        let steps = self.ledger.steps(job.id).await?;
        if steps.is_empty() {
            return Err(Error::EmptyPlan {
                job: job.name.clone(),
            });
        }

        let request = flow::compile(
            &job,
            &steps,
            self.step_config(job.variant),
            &self.output_root,
            self.cluster_shape()?,
        );

        tracing::info!(
            job = %job.name,
            variant = %job.variant,
            steps = steps.len(),
            state = %RunState::Submitting,
            "launching job"
        );

        let launched = self
            .runner
            .launch(&request)
            .await
            .and_then(|handle| {
                let handle = handle.trim().to_string();
                if handle.is_empty() {
                    anyhow::bail!("runner returned an empty run handle");
                }
                Ok(handle)
            });

        match launched {
            Ok(handle) => {
                let segment_ids: Vec<i64> = match job.variant {
                    JobVariant::Parse => steps.iter().filter_map(|s| s.segment_id).collect(),
                    JobVariant::Combine => Vec::new(),
                };
                let at = self.clock.now().timestamp();
                let marked = self
                    .ledger
                    .commit_submission(&job, &handle, &segment_ids, at)
                    .await?;

                tracing::info!(
                    job = %job.name,
                    run_handle = %handle,
                    segments_marked = marked,
                    state = %RunState::Submitted,
                    "job submitted"
                );
                Ok(handle)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                if let Err(db) = self.ledger.record_failure(job.id, &message).await {
                    tracing::warn!(job = %job.name, error = %db, "could not record submission failure");
                }

                tracing::warn!(
                    job = %job.name,
                    error = %message,
                    state = %RunState::SubmissionFailed,
                    "job submission failed"
                );
                Err(Error::DispatchFailed {
                    job: job.name,
                    message,
                })
            }
        }
    }
}
