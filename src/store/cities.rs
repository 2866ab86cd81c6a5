use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::HashSet;
use tracing::instrument;

use crate::util::db::Db;

/// Row in the `cities` table. Cities are the site's own content records,
/// linked to the provider taxonomy through `external_destination_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CityRow {
    pub id: i64,
    pub name: String,
    pub external_destination_id: Option<String>,
    pub country_destination_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub population: Option<i64>,
    pub iata_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by a city upsert. Keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CityUpsert {
    pub name: String,
    pub external_destination_id: Option<String>,
    pub country_destination_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub iata_code: Option<String>,
    pub population: Option<i64>,
}

/// Insert-or-update a city keyed by name, returning its id. Population is
/// only overwritten when the new value is present.
#[instrument(skip(db, city), fields(city = %city.name))]
pub async fn ensure_city(db: &Db, city: &CityUpsert) -> Result<i64> {
    let row = sqlx::query(
        "INSERT INTO cities
            (name, external_destination_id, country_destination_id,
             latitude, longitude, timezone, iata_code, population)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (name) DO UPDATE SET
            external_destination_id = EXCLUDED.external_destination_id,
            country_destination_id = EXCLUDED.country_destination_id,
            latitude = COALESCE(EXCLUDED.latitude, cities.latitude),
            longitude = COALESCE(EXCLUDED.longitude, cities.longitude),
            timezone = COALESCE(EXCLUDED.timezone, cities.timezone),
            iata_code = COALESCE(EXCLUDED.iata_code, cities.iata_code),
            population = COALESCE(EXCLUDED.population, cities.population),
            updated_at = now()
         RETURNING id",
    )
    .persistent(false)
    .bind(&city.name)
    .bind(&city.external_destination_id)
    .bind(&city.country_destination_id)
    .bind(city.latitude)
    .bind(city.longitude)
    .bind(&city.timezone)
    .bind(&city.iata_code)
    .bind(city.population)
    .fetch_one(&db.pool)
    .await?;
    Ok(row.get::<i64, _>("id"))
}

#[instrument(skip(db))]
pub async fn update_city_population(db: &Db, id: i64, population: i64) -> Result<()> {
    sqlx::query("UPDATE cities SET population = $1, updated_at = now() WHERE id = $2")
        .persistent(false)
        .bind(population)
        .bind(id)
        .execute(&db.pool)
        .await?;
    Ok(())
}

pub async fn get_city(db: &Db, id: i64) -> Result<Option<CityRow>> {
    let row = sqlx::query_as::<_, CityRow>("SELECT * FROM cities WHERE id = $1")
        .persistent(false)
        .bind(id)
        .fetch_optional(&db.pool)
        .await?;
    Ok(row)
}

pub async fn city_by_external_id(db: &Db, external_id: &str) -> Result<Option<CityRow>> {
    let row =
        sqlx::query_as::<_, CityRow>("SELECT * FROM cities WHERE external_destination_id = $1")
            .persistent(false)
            .bind(external_id)
            .fetch_optional(&db.pool)
            .await?;
    Ok(row)
}

/// Paginated city listing ordered by name. Returns (rows, total count).
pub async fn list_cities(db: &Db, page: u32, page_size: u32) -> Result<(Vec<CityRow>, i64)> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, 100);
    let offset = ((page - 1) * page_size) as i64;

    let total: i64 = sqlx::query_scalar("SELECT count(*) FROM cities")
        .persistent(false)
        .fetch_one(&db.pool)
        .await?;
    let rows = sqlx::query_as::<_, CityRow>(
        "SELECT * FROM cities ORDER BY name LIMIT $1 OFFSET $2",
    )
    .persistent(false)
    .bind(page_size as i64)
    .bind(offset)
    .fetch_all(&db.pool)
    .await?;
    Ok((rows, total))
}

/// Which of the given external destination ids exist in the cities table.
pub async fn existing_external_ids(db: &Db, ids: &[String]) -> Result<HashSet<String>> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let found: Vec<String> = sqlx::query_scalar(
        "SELECT external_destination_id FROM cities WHERE external_destination_id = ANY($1)",
    )
    .persistent(false)
    .bind(ids)
    .fetch_all(&db.pool)
    .await?;
    Ok(found.into_iter().collect())
}
