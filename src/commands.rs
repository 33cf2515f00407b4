//! Command handlers behind the `crawl-ledger` binary.
//!
//! Each handler opens the database named in the config, wires the
//! components it needs, and prints a short human-readable result.

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::clock::{Clock, JobNamer, SystemClock};
use crate::cluster::ClusterShape;
use crate::config::Config;
use crate::coordinator::RunCoordinator;
use crate::db;
use crate::error::Error;
use crate::flow;
use crate::index::DatasetIndex;
use crate::ledger::JobLedger;
use crate::lister_manifest::ManifestLister;
use crate::migrate;
use crate::models::JobVariant;
use crate::planner::StepPlanner;
use crate::runner_command::CommandRunner;
use crate::segments::{SegmentStore, MAX_SEGMENTS_PER_JOB};
use crate::status;

async fn open(config: &Config) -> Result<SqlitePool> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    Ok(pool)
}

fn dataset_index(config: &Config, pool: &SqlitePool, clock: Arc<dyn Clock>) -> Result<DatasetIndex> {
    let lister = ManifestLister::new(&config.dataset)?;
    Ok(DatasetIndex::new(
        SegmentStore::new(pool.clone()),
        Arc::new(lister),
        config.dataset.root.clone(),
        clock,
    ))
}

pub async fn run_init(config: &Config) -> Result<()> {
    let pool = open(config).await?;
    pool.close().await;
    println!("Database initialized at {}", config.db.path.display());
    Ok(())
}

pub async fn run_discover(config: &Config, release: &str) -> Result<()> {
    let pool = open(config).await?;
    let index = dataset_index(config, &pool, Arc::new(SystemClock))?;

    let created = index.discover(release).await?;
    let store = SegmentStore::new(pool.clone());
    match store.release_by_name(release).await? {
        Some(r) => {
            let st = store.status(r.id).await?;
            println!(
                "Release {}: {} new segments, {} total",
                release, created, st.total
            );
        }
        None => println!("Release {} has no published segments", release),
    }

    pool.close().await;
    Ok(())
}

pub async fn run_status(config: &Config, show_all: bool) -> Result<()> {
    let pool = open(config).await?;
    let overview = status::overview(
        &SegmentStore::new(pool.clone()),
        &JobLedger::new(pool.clone()),
        show_all,
    )
    .await?;
    pool.close().await;

    status::print_overview(&overview);
    Ok(())
}

pub async fn run_plan_parse(
    config: &Config,
    release: &str,
    max_segments: Option<usize>,
    max_files: Option<u32>,
    segment_names: Option<Vec<String>>,
) -> Result<()> {
    let pool = open(config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let index = dataset_index(config, &pool, clock.clone())?;
    if !index.ensure_segments(release).await? {
        pool.close().await;
        bail!("release {} has no segments; is it published?", release);
    }

    let store = SegmentStore::new(pool.clone());
    let release_row = store
        .release_by_name(release)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "release",
            name: release.to_string(),
        })?;

    let segments = match &segment_names {
        Some(names) if names.len() > MAX_SEGMENTS_PER_JOB => {
            pool.close().await;
            bail!(
                "at most {} segments per job; {} selected",
                MAX_SEGMENTS_PER_JOB,
                names.len()
            );
        }
        Some(names) => store.select(release_row.id, names).await?,
        None => store.unprocessed(release_row.id, max_segments).await?,
    };
    if segments.is_empty() {
        pool.close().await;
        println!("No segments to parse in {}", release);
        return Ok(());
    }

    let planner = StepPlanner::new(
        config.planner_config(),
        Arc::new(JobNamer::new(clock)),
        JobLedger::new(pool.clone()),
    );
    let job = planner.create_parse_job(&segments, max_files).await?;
    pool.close().await;

    println!("Job: {}", job.name);
    println!("{}", job.description);
    Ok(())
}

pub async fn run_plan_combine(config: &Config, inputs: &[String]) -> Result<()> {
    let pool = open(config).await?;
    let planner = StepPlanner::new(
        config.planner_config(),
        Arc::new(JobNamer::new(Arc::new(SystemClock))),
        JobLedger::new(pool.clone()),
    );

    let job = planner.create_combine_job(inputs).await?;
    pool.close().await;

    println!("Job: {}", job.name);
    println!("{}", job.description);
    Ok(())
}

pub async fn run_submit(config: &Config, job_name: &str) -> Result<()> {
    let runner = config
        .runner
        .clone()
        .context("no [runner] section configured; cannot submit")?;

    let pool = open(config).await?;
    let coordinator = RunCoordinator::new(
        JobLedger::new(pool.clone()),
        Arc::new(CommandRunner::new(runner)),
        Arc::new(config.cluster.clone()),
        config.steps.clone(),
        config.output.root.clone(),
        Arc::new(SystemClock),
    );

    let result = coordinator.submit(job_name).await;
    pool.close().await;

    let handle = result?;
    println!("Job {} submitted: {}", job_name, handle);
    Ok(())
}

pub async fn run_reset(config: &Config, release: &str) -> Result<()> {
    let pool = open(config).await?;
    let store = SegmentStore::new(pool.clone());

    let release_row = store
        .release_by_name(release)
        .await?
        .ok_or_else(|| Error::NotFound {
            what: "release",
            name: release.to_string(),
        })?;
    let cleared = store.reset_release(release_row.id).await?;
    pool.close().await;

    println!("Release {}: {} segments reset", release, cleared);
    Ok(())
}

pub async fn run_show(config: &Config, job_name: &str) -> Result<()> {
    let pool = open(config).await?;
    let ledger = JobLedger::new(pool.clone());

    let job = ledger.job(job_name).await?;
    let steps = ledger.steps(job.id).await?;
    pool.close().await;

    let step_config = match job.variant {
        JobVariant::Parse => &config.steps.parse,
        JobVariant::Combine => &config.steps.combine,
    };
    let shape = ClusterShape::from_config(&config.cluster);
    let request = flow::compile(&job, &steps, step_config, &config.output.root, shape);

    println!("Job:         {}", job.name);
    println!("Type:        {}", job.variant);
    println!("Description: {}", job.description);
    println!("State:       {}", job.run_state());
    if let Some(handle) = &job.run_handle {
        println!("Run handle:  {}", handle);
    }
    if let Some(err) = &job.last_error {
        println!("Last error:  {}", err);
    }
    println!("Created:     {}", status::format_ts(job.created_at));
    println!();
    println!("Cluster");
    println!("{}", request.cluster.describe());
    println!();
    println!("Steps ({})", request.steps.len());
    for step in &request.steps {
        println!("  {}", step.name);
        println!("    {}", step.arguments.join(" "));
    }
    Ok(())
}
