//! Segment catalog.
//!
//! Segments are created once by discovery and afterwards only change their
//! `processed_at` marker. Every selection returns segments in creation order
//! (`id` ascending) so that repeated planning over the same catalog state
//! yields the same batches.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::Result;
use crate::models::{Release, ReleaseStatus, Segment};

/// Upper bound on segments per parse job: the batch runner accepts at most
/// this many steps in one submission.
pub const MAX_SEGMENTS_PER_JOB: usize = 256;

const SEGMENT_SELECT: &str = r#"
    SELECT s.id, s.release_id, r.name AS release_name, s.name, s.location_uri,
           s.file_count, s.processed_at, s.created_at
    FROM segments s
    JOIN releases r ON r.id = s.release_id
"#;

/// Clamp a caller-supplied batch size to [`MAX_SEGMENTS_PER_JOB`].
pub fn batch_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(MAX_SEGMENTS_PER_JOB)
        .min(MAX_SEGMENTS_PER_JOB)
}

/// SQLite-backed segment catalog.
#[derive(Clone)]
pub struct SegmentStore {
    pool: SqlitePool,
}

impl SegmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn release_by_name(&self, name: &str) -> Result<Option<Release>> {
        let row = sqlx::query("SELECT id, name, created_at FROM releases WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(release_from_row).transpose()
    }

    /// All releases, oldest first.
    pub async fn releases(&self) -> Result<Vec<Release>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM releases ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(release_from_row).collect()
    }

    /// Every segment of a release, in creation order.
    pub async fn segments(&self, release_id: i64) -> Result<Vec<Segment>> {
        let rows = sqlx::query(&format!("{SEGMENT_SELECT} WHERE s.release_id = ? ORDER BY s.id"))
            .bind(release_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(segment_from_row).collect()
    }

    pub async fn segment(&self, id: i64) -> Result<Option<Segment>> {
        let row = sqlx::query(&format!("{SEGMENT_SELECT} WHERE s.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(segment_from_row).transpose()
    }

    pub async fn segment_count(&self, release_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM segments WHERE release_id = ?")
            .bind(release_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Next unprocessed segments in creation order, at most
    /// [`MAX_SEGMENTS_PER_JOB`] of them whatever `limit` says.
    pub async fn unprocessed(&self, release_id: i64, limit: Option<usize>) -> Result<Vec<Segment>> {
        let limit = batch_limit(limit) as i64;
        let rows = sqlx::query(&format!(
            "{SEGMENT_SELECT} WHERE s.release_id = ? AND s.processed_at IS NULL ORDER BY s.id LIMIT ?"
        ))
        .bind(release_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(segment_from_row).collect()
    }

    /// Segments of the release whose name is listed. Unknown names are
    /// ignored.
    pub async fn select(&self, release_id: i64, names: &[String]) -> Result<Vec<Segment>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "{SEGMENT_SELECT} WHERE s.release_id = ? AND s.name IN ({placeholders}) ORDER BY s.id"
        );

        let mut query = sqlx::query(&sql).bind(release_id);
        for name in names {
            query = query.bind(name);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(segment_from_row).collect()
    }

    /// Mark segments processed at `at`, all or none. Segments that are
    /// already processed keep their original timestamp.
    pub async fn mark_processed(&self, segment_ids: &[i64], at: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let marked = mark_processed_in(&mut *tx, segment_ids, at).await?;
        tx.commit().await?;
        Ok(marked)
    }

    /// Clear the processed marker of every segment in the release so it is
    /// picked up by the next parse plan. Jobs and steps are left as they are.
    pub async fn reset_release(&self, release_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE segments SET processed_at = NULL WHERE release_id = ? AND processed_at IS NOT NULL",
        )
        .bind(release_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(release_id, cleared = result.rows_affected(), "release reset");
        Ok(result.rows_affected())
    }

    pub async fn status(&self, release_id: i64) -> Result<ReleaseStatus> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN processed_at IS NULL THEN 0 ELSE 1 END), 0) AS processed
            FROM segments
            WHERE release_id = ?
            "#,
        )
        .bind(release_id)
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.try_get("total")?;
        let processed: i64 = row.try_get("processed")?;

        Ok(ReleaseStatus {
            total,
            processed,
            remaining: total - processed,
        })
    }
}

/// Insert the release if it is new and return its id.
pub(crate) async fn upsert_release_in(
    conn: &mut SqliteConnection,
    name: &str,
    now: i64,
) -> Result<i64> {
    sqlx::query("INSERT INTO releases (name, created_at) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM releases WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

/// Insert a segment unless its name or location is already catalogued for
/// the release. Returns whether a row was created.
pub(crate) async fn insert_segment_in(
    conn: &mut SqliteConnection,
    release_id: i64,
    name: &str,
    location_uri: &str,
    file_count: i64,
    now: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO segments (release_id, name, location_uri, file_count, processed_at, created_at)
        VALUES (?, ?, ?, ?, NULL, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(release_id)
    .bind(name)
    .bind(location_uri)
    .bind(file_count)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn mark_processed_in(
    conn: &mut SqliteConnection,
    segment_ids: &[i64],
    at: i64,
) -> Result<u64> {
    let mut marked = 0u64;
    for id in segment_ids {
        let result = sqlx::query(
            "UPDATE segments SET processed_at = ? WHERE id = ? AND processed_at IS NULL",
        )
        .bind(at)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        marked += result.rows_affected();
    }
    Ok(marked)
}

fn release_from_row(row: &SqliteRow) -> Result<Release> {
    Ok(Release {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn segment_from_row(row: &SqliteRow) -> Result<Segment> {
    Ok(Segment {
        id: row.try_get("id")?,
        release_id: row.try_get("release_id")?,
        release_name: row.try_get("release_name")?,
        name: row.try_get("name")?,
        location_uri: row.try_get("location_uri")?,
        file_count: row.try_get("file_count")?,
        processed_at: row.try_get("processed_at")?,
        created_at: row.try_get("created_at")?,
    })
}
