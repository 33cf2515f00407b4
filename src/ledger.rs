//! Job ledger.
//!
//! Every plan is recorded with its steps, whether or not it is ever
//! submitted. A job gains its run handle exactly once, in the same
//! transaction that marks its segments processed.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{Error, Result};
use crate::models::{join_input_paths, split_input_paths, Job, JobVariant, Step};
use crate::planner::{JobPlan, PriorJob};
use crate::segments::mark_processed_in;

const JOB_COLUMNS: &str =
    "id, variant, name, description, max_units_per_step, run_handle, last_error, created_at";

/// Filter for [`JobLedger::jobs`]. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    pub variant: Option<JobVariant>,
    /// `Some(true)`: only jobs with a run handle; `Some(false)`: only without.
    pub submitted: Option<bool>,
}

/// SQLite-backed job ledger.
#[derive(Clone)]
pub struct JobLedger {
    pool: SqlitePool,
}

impl JobLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a plan and its steps in one transaction.
    pub async fn record(&self, plan: &JobPlan, now: i64) -> Result<Job> {
        let mut tx = self.pool.begin().await?;

        let job_id = sqlx::query(
            r#"
            INSERT INTO jobs (variant, name, description, max_units_per_step, run_handle, last_error, created_at)
            VALUES (?, ?, ?, ?, NULL, NULL, ?)
            "#,
        )
        .bind(plan.variant.as_str())
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(plan.max_units_per_step)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (position, step) in plan.steps.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO steps (job_id, position, segment_id, input_paths, output_path)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(job_id)
            .bind(position as i64)
            .bind(step.segment_id)
            .bind(join_input_paths(&step.input_paths))
            .bind(&step.output_path)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Job {
            id: job_id,
            variant: plan.variant,
            name: plan.name.clone(),
            description: plan.description.clone(),
            max_units_per_step: plan.max_units_per_step,
            run_handle: None,
            last_error: None,
            created_at: now,
        })
    }

    pub async fn job_by_name(&self, name: &str) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    /// Like [`job_by_name`](Self::job_by_name) but a missing job is an error.
    pub async fn job(&self, name: &str) -> Result<Job> {
        self.job_by_name(name)
            .await?
            .ok_or_else(|| Error::job_not_found(name))
    }

    /// Jobs matching the filter, oldest first.
    pub async fn jobs(&self, filter: JobFilter) -> Result<Vec<Job>> {
        let mut sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE 1 = 1");
        if filter.variant.is_some() {
            sql.push_str(" AND variant = ?");
        }
        match filter.submitted {
            Some(true) => sql.push_str(" AND run_handle IS NOT NULL"),
            Some(false) => sql.push_str(" AND run_handle IS NULL"),
            None => {}
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query(&sql);
        if let Some(variant) = filter.variant {
            query = query.bind(variant.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(job_from_row).collect()
    }

    /// Submitted jobs, newest first. `None` returns all of them.
    pub async fn history(&self, limit: Option<i64>) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE run_handle IS NOT NULL \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    /// Steps of a job in plan order.
    pub async fn steps(&self, job_id: i64) -> Result<Vec<Step>> {
        let rows = sqlx::query(
            r#"
            SELECT st.id, st.job_id, st.position, st.segment_id, sg.name AS segment_name,
                   st.input_paths, st.output_path
            FROM steps st
            LEFT JOIN segments sg ON sg.id = st.segment_id
            WHERE st.job_id = ?
            ORDER BY st.position
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(step_from_row).collect()
    }

    /// Highest job name recorded so far, read as epoch milliseconds.
    pub async fn latest_job_millis(&self) -> Result<Option<i64>> {
        let latest: Option<i64> =
            sqlx::query_scalar("SELECT MAX(CAST(name AS INTEGER)) FROM jobs")
                .fetch_one(&self.pool)
                .await?;
        Ok(latest)
    }

    pub async fn step_count(&self, job_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM steps WHERE job_id = ?")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Look up a parse job by name for use as combine input.
    pub async fn resolve_prior(&self, name: &str) -> Result<PriorJob> {
        let job = self
            .job_by_name(name)
            .await?
            .filter(|j| j.variant == JobVariant::Parse)
            .ok_or_else(|| Error::job_not_found(name))?;

        Ok(PriorJob {
            step_count: self.step_count(job.id).await?,
            name: job.name,
        })
    }

    /// Store the run handle and mark the given segments processed, as one
    /// transaction. Returns the number of segments newly marked.
    pub async fn commit_submission(
        &self,
        job: &Job,
        run_handle: &str,
        segment_ids: &[i64],
        at: i64,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE jobs SET run_handle = ?, last_error = NULL WHERE id = ? AND run_handle IS NULL",
        )
        .bind(run_handle)
        .bind(job.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            let existing: Option<String> =
                sqlx::query_scalar("SELECT run_handle FROM jobs WHERE id = ?")
                    .bind(job.id)
                    .fetch_optional(&self.pool)
                    .await?
                    .flatten();
            return Err(match existing {
                Some(handle) => Error::AlreadySubmitted {
                    job: job.name.clone(),
                    run_handle: handle,
                },
                None => Error::job_not_found(&job.name),
            });
        }

        let marked = mark_processed_in(&mut *tx, segment_ids, at).await?;
        tx.commit().await?;

        Ok(marked)
    }

    /// Remember why the latest submission of a job failed.
    pub async fn record_failure(&self, job_id: i64, message: &str) -> Result<()> {
        sqlx::query("UPDATE jobs SET last_error = ? WHERE id = ? AND run_handle IS NULL")
            .bind(message)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let variant: String = row.try_get("variant")?;
    let variant = variant
        .parse::<JobVariant>()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;

    Ok(Job {
        id: row.try_get("id")?,
        variant,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        max_units_per_step: row.try_get("max_units_per_step")?,
        run_handle: row.try_get("run_handle")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
    })
}

fn step_from_row(row: &SqliteRow) -> Result<Step> {
    let input_paths: String = row.try_get("input_paths")?;

    Ok(Step {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        position: row.try_get("position")?,
        segment_id: row.try_get("segment_id")?,
        segment_name: row.try_get("segment_name")?,
        input_paths: split_input_paths(&input_paths),
        output_path: row.try_get("output_path")?,
    })
}
