use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::instrument;

use crate::util::db::Db;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TourTypeRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TourRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub city_id: i64,
    pub tour_type_id: Option<i64>,
    pub price: Option<f64>,
    pub duration: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub inclusions: Option<String>,
    pub exclusions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by a tour upsert. Keyed by (name, city_id).
#[derive(Debug, Clone, Default)]
pub struct TourUpsert {
    pub name: String,
    pub description: Option<String>,
    pub city_id: i64,
    pub tour_type_id: Option<i64>,
    pub price: Option<f64>,
    pub duration: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub inclusions: Option<String>,
    pub exclusions: Option<String>,
}

/// Insert-or-update a tour type keyed by name, returning its id.
#[instrument(skip(db, description))]
pub async fn ensure_tour_type(db: &Db, name: &str, description: Option<&str>) -> Result<i64> {
    let row = sqlx::query(
        "INSERT INTO tour_types (name, description) VALUES ($1, $2)
         ON CONFLICT (name) DO UPDATE SET
            description = COALESCE(EXCLUDED.description, tour_types.description),
            updated_at = now()
         RETURNING id",
    )
    .persistent(false)
    .bind(name)
    .bind(description)
    .fetch_one(&db.pool)
    .await?;
    Ok(row.get::<i64, _>("id"))
}

/// Insert-or-update a tour keyed by (name, city_id), returning its id.
#[instrument(skip(db, tour), fields(tour = %tour.name, city_id = tour.city_id))]
pub async fn upsert_tour(db: &Db, tour: &TourUpsert) -> Result<i64> {
    let row = sqlx::query(
        "INSERT INTO tours
            (name, description, city_id, tour_type_id, price, duration,
             image_url, rating, review_count, inclusions, exclusions)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (name, city_id) DO UPDATE SET
            description = COALESCE(EXCLUDED.description, tours.description),
            tour_type_id = COALESCE(EXCLUDED.tour_type_id, tours.tour_type_id),
            price = COALESCE(EXCLUDED.price, tours.price),
            duration = COALESCE(EXCLUDED.duration, tours.duration),
            image_url = COALESCE(EXCLUDED.image_url, tours.image_url),
            rating = COALESCE(EXCLUDED.rating, tours.rating),
            review_count = COALESCE(EXCLUDED.review_count, tours.review_count),
            inclusions = COALESCE(EXCLUDED.inclusions, tours.inclusions),
            exclusions = COALESCE(EXCLUDED.exclusions, tours.exclusions),
            updated_at = now()
         RETURNING id",
    )
    .persistent(false)
    .bind(&tour.name)
    .bind(&tour.description)
    .bind(tour.city_id)
    .bind(tour.tour_type_id)
    .bind(tour.price)
    .bind(&tour.duration)
    .bind(&tour.image_url)
    .bind(tour.rating)
    .bind(tour.review_count)
    .bind(&tour.inclusions)
    .bind(&tour.exclusions)
    .fetch_one(&db.pool)
    .await?;
    Ok(row.get::<i64, _>("id"))
}

pub async fn get_tour(db: &Db, id: i64) -> Result<Option<TourRow>> {
    let row = sqlx::query_as::<_, TourRow>("SELECT * FROM tours WHERE id = $1")
        .persistent(false)
        .bind(id)
        .fetch_optional(&db.pool)
        .await?;
    Ok(row)
}

/// Paginated tour listing, optionally scoped to a city, newest first.
/// Returns (rows, total count).
pub async fn list_tours(
    db: &Db,
    city_id: Option<i64>,
    page: u32,
    page_size: u32,
) -> Result<(Vec<TourRow>, i64)> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, 100);
    let offset = ((page - 1) * page_size) as i64;

    let (total, rows) = match city_id {
        Some(city_id) => {
            let total: i64 = sqlx::query_scalar("SELECT count(*) FROM tours WHERE city_id = $1")
                .persistent(false)
                .bind(city_id)
                .fetch_one(&db.pool)
                .await?;
            let rows = sqlx::query_as::<_, TourRow>(
                "SELECT * FROM tours WHERE city_id = $1
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
            .persistent(false)
            .bind(city_id)
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(&db.pool)
            .await?;
            (total, rows)
        }
        None => {
            let total: i64 = sqlx::query_scalar("SELECT count(*) FROM tours")
                .persistent(false)
                .fetch_one(&db.pool)
                .await?;
            let rows = sqlx::query_as::<_, TourRow>(
                "SELECT * FROM tours ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            )
            .persistent(false)
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(&db.pool)
            .await?;
            (total, rows)
        }
    };
    Ok((rows, total))
}
