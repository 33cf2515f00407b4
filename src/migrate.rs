use sqlx::SqlitePool;

use crate::error::Result;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Create releases table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS releases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create segments table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            release_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            location_uri TEXT NOT NULL,
            file_count INTEGER NOT NULL DEFAULT 0,
            processed_at INTEGER,
            created_at INTEGER NOT NULL,
            UNIQUE(release_id, name),
            UNIQUE(release_id, location_uri),
            FOREIGN KEY (release_id) REFERENCES releases(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            variant TEXT NOT NULL,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL,
            max_units_per_step INTEGER,
            run_handle TEXT,
            last_error TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create steps table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS steps (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            segment_id INTEGER,
            input_paths TEXT NOT NULL,
            output_path TEXT NOT NULL,
            UNIQUE(job_id, position),
            FOREIGN KEY (job_id) REFERENCES jobs(id),
            FOREIGN KEY (segment_id) REFERENCES segments(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_segments_unprocessed ON segments(release_id, processed_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_steps_job_id ON steps(job_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_run_handle ON jobs(run_handle)")
        .execute(pool)
        .await?;

    Ok(())
}
