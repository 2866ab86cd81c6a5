use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Row;
use tracing::instrument;

use crate::util::db::Db;

/// Outcome of one import attempt in the `data_import` audit table. Stored
/// as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImportStatus {
    Processing,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

/// One row per import attempt. Append/update only, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportRow {
    pub id: i64,
    pub batch_id: String,
    pub product_code: String,
    pub status: String,
    pub raw_data: Option<Value>,
    pub processed_data: Option<Value>,
    pub error_message: Option<String>,
    pub tour_id: Option<i64>,
    pub tour_type_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Atomically claim a product code for this batch. The insert and the
/// dedup decision are a single statement: `ON CONFLICT DO NOTHING` returns
/// no row when the code was already imported by any earlier (or concurrent)
/// run, and the caller counts it as skipped.
#[instrument(skip(db, raw_data))]
pub async fn claim_product_code(
    db: &Db,
    batch_id: &str,
    product_code: &str,
    raw_data: &Value,
) -> Result<Option<i64>> {
    let row = sqlx::query(
        "INSERT INTO data_import (batch_id, product_code, status, raw_data)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (product_code) DO NOTHING
         RETURNING id",
    )
    .persistent(false)
    .bind(batch_id)
    .bind(product_code)
    .bind(ImportStatus::Processing.as_str())
    .bind(raw_data)
    .fetch_optional(&db.pool)
    .await?;
    Ok(row.map(|r| r.get::<i64, _>("id")))
}

#[instrument(skip(db, processed_data))]
pub async fn mark_completed(
    db: &Db,
    id: i64,
    tour_id: i64,
    tour_type_id: Option<i64>,
    processed_data: &Value,
) -> Result<()> {
    sqlx::query(
        "UPDATE data_import
         SET status = $1, tour_id = $2, tour_type_id = $3,
             processed_data = $4, updated_at = now()
         WHERE id = $5",
    )
    .persistent(false)
    .bind(ImportStatus::Completed.as_str())
    .bind(tour_id)
    .bind(tour_type_id)
    .bind(processed_data)
    .bind(id)
    .execute(&db.pool)
    .await?;
    Ok(())
}

#[instrument(skip(db))]
pub async fn mark_failed(db: &Db, id: i64, error_message: &str) -> Result<()> {
    sqlx::query(
        "UPDATE data_import
         SET status = $1, error_message = $2, updated_at = now()
         WHERE id = $3",
    )
    .persistent(false)
    .bind(ImportStatus::Failed.as_str())
    .bind(error_message)
    .bind(id)
    .execute(&db.pool)
    .await?;
    Ok(())
}

/// Most recent import attempts, newest first.
pub async fn recent_imports(db: &Db, limit: u32) -> Result<Vec<ImportRow>> {
    let rows = sqlx::query_as::<_, ImportRow>(
        "SELECT * FROM data_import ORDER BY created_at DESC LIMIT $1",
    )
    .persistent(false)
    .bind(limit.clamp(1, 500) as i64)
    .fetch_all(&db.pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_as_text() {
        assert_eq!(ImportStatus::Processing.as_str(), "PROCESSING");
        assert_eq!(
            serde_json::to_string(&ImportStatus::Failed).unwrap(),
            "\"FAILED\""
        );
    }
}
