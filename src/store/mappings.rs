use anyhow::Result;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument};

use crate::util::db::Db;

use super::cities;

/// Persisted association between a provider country id and a provider city
/// id in `locations_mapping`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MappingRow {
    pub id: i64,
    pub country_id: String,
    pub city_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingPair {
    pub country_id: String,
    pub city_id: String,
}

pub async fn list_mappings(db: &Db) -> Result<Vec<MappingRow>> {
    let rows = sqlx::query_as::<_, MappingRow>(
        "SELECT * FROM locations_mapping ORDER BY country_id, city_id",
    )
    .persistent(false)
    .fetch_all(&db.pool)
    .await?;
    Ok(rows)
}

/// Replace the stored mappings with the given set, as a diff: rows no longer
/// present are deleted, new pairs inserted, unchanged rows left untouched
/// (keeping their audit timestamps). Runs in one transaction.
#[instrument(skip(db, pairs))]
pub async fn replace_mappings(db: &Db, pairs: &[MappingPair]) -> Result<(usize, usize)> {
    let desired: HashSet<MappingPair> = pairs.iter().cloned().unique().collect();

    let mut tx = db.pool.begin().await?;

    let existing = sqlx::query_as::<_, MappingRow>("SELECT * FROM locations_mapping")
        .persistent(false)
        .fetch_all(&mut *tx)
        .await?;
    let existing_pairs: HashSet<MappingPair> = existing
        .iter()
        .map(|r| MappingPair {
            country_id: r.country_id.clone(),
            city_id: r.city_id.clone(),
        })
        .collect();

    let mut deleted = 0usize;
    for row in &existing {
        let pair = MappingPair {
            country_id: row.country_id.clone(),
            city_id: row.city_id.clone(),
        };
        if !desired.contains(&pair) {
            sqlx::query("DELETE FROM locations_mapping WHERE id = $1")
                .persistent(false)
                .bind(row.id)
                .execute(&mut *tx)
                .await?;
            deleted += 1;
        }
    }

    let mut inserted = 0usize;
    for pair in desired.iter().sorted_by(|a, b| {
        (&a.country_id, &a.city_id).cmp(&(&b.country_id, &b.city_id))
    }) {
        if !existing_pairs.contains(pair) {
            sqlx::query(
                "INSERT INTO locations_mapping (country_id, city_id) VALUES ($1, $2)",
            )
            .persistent(false)
            .bind(&pair.country_id)
            .bind(&pair.city_id)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }
    }

    tx.commit().await?;
    let kept = existing_pairs.intersection(&desired).count();
    info!(inserted, deleted, kept, "mappings replaced");
    Ok((inserted, deleted))
}

/// Existence check against the cities table before accepting a mapping
/// payload. Returns the ids with no matching city row.
pub async fn validate_city_ids(db: &Db, ids: &[String]) -> Result<Vec<String>> {
    let known = cities::existing_external_ids(db, ids).await?;
    Ok(ids
        .iter()
        .filter(|id| !known.contains(*id))
        .cloned()
        .unique()
        .collect())
}
