// HTTP request handlers for API endpoints

use actix_web::{web, HttpResponse};
use bytes::Bytes;
use futures::Stream;
use itertools::Itertools;
use tracing::info;

use crate::api::error::ApiError;
use crate::api::models::*;
use crate::import::pipeline::{self, ImportContext, ImportParams};
use crate::store::cities::CityUpsert;
use crate::store::{audit, cities, mappings, tours};

type ApiResult = Result<HttpResponse, ApiError>;

fn ok<T: serde::Serialize>(message: &str, data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope::success(message, data))
}

/// Health check endpoint
pub async fn health_check(ctx: web::Data<ImportContext>) -> ApiResult {
    let db_status = match sqlx::query_scalar::<_, bool>("SELECT true")
        .persistent(false)
        .fetch_one(&ctx.db.pool)
        .await
    {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Ok(ok(
        "healthy",
        serde_json::json!({ "database": db_status, "version": env!("CARGO_PKG_VERSION") }),
    ))
}

/// Saved provider country/city mappings.
pub async fn list_location_mappings(ctx: web::Data<ImportContext>) -> ApiResult {
    let rows = mappings::list_mappings(&ctx.db)
        .await
        .map_err(ApiError::from)?;
    Ok(ok("location mappings", rows))
}

/// Replace the stored mappings. Mapped cities are first upserted into the
/// local cities table from the provider listing, then every city id is
/// validated before the mapping rows are written.
pub async fn save_location_mappings(
    ctx: web::Data<ImportContext>,
    payload: web::Json<SaveMappingsRequest>,
) -> ApiResult {
    let pairs = payload
        .into_inner()
        .mappings
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::validation("mappings array is required"))?;

    let country_ids: Vec<String> = pairs.iter().map(|p| p.country_id.clone()).unique().collect();
    let listings = ctx
        .inventory
        .get_cities_by_countries(&country_ids)
        .await
        .map_err(ApiError::from)?;

    let mapped_city_ids: Vec<String> = pairs.iter().map(|p| p.city_id.clone()).unique().collect();
    for listing in listings
        .iter()
        .filter(|l| mapped_city_ids.contains(&l.destination.destination_id))
    {
        let d = &listing.destination;
        cities::ensure_city(
            &ctx.db,
            &CityUpsert {
                name: d.name.clone(),
                external_destination_id: Some(d.destination_id.clone()),
                country_destination_id: d.parent_id.clone(),
                latitude: d.latitude,
                longitude: d.longitude,
                timezone: d.timezone.clone(),
                iata_code: d.iata_code.clone(),
                population: None,
            },
        )
        .await
        .map_err(ApiError::from)?;
    }

    let unknown = mappings::validate_city_ids(&ctx.db, &mapped_city_ids)
        .await
        .map_err(ApiError::from)?;
    if !unknown.is_empty() {
        return Err(ApiError::validation(format!(
            "unknown city ids: {}",
            unknown.join(", ")
        )));
    }

    let (inserted, deleted) = mappings::replace_mappings(&ctx.db, &pairs)
        .await
        .map_err(ApiError::from)?;
    Ok(ok(
        "location mappings saved",
        SaveMappingsResult {
            inserted,
            deleted,
            total: pairs.len(),
        },
    ))
}

/// Provider country taxonomy, sorted by name.
pub async fn list_provider_countries(ctx: web::Data<ImportContext>) -> ApiResult {
    let countries = ctx.inventory.get_countries().await.map_err(ApiError::from)?;
    Ok(ok("countries", countries))
}

/// Provider cities for a comma-separated list of country ids.
pub async fn list_provider_cities(
    ctx: web::Data<ImportContext>,
    query: web::Query<ProviderCitiesQuery>,
) -> ApiResult {
    let country_ids: Vec<String> = query
        .countries
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if country_ids.is_empty() {
        return Err(ApiError::validation("countries query parameter is required"));
    }

    let listings = ctx
        .inventory
        .get_cities_by_countries(&country_ids)
        .await
        .map_err(ApiError::from)?;
    Ok(ok("cities", listings))
}

pub async fn list_cities(
    ctx: web::Data<ImportContext>,
    query: web::Query<PageQuery>,
) -> ApiResult {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(20);
    let (rows, total) = cities::list_cities(&ctx.db, page, page_size)
        .await
        .map_err(ApiError::from)?;
    Ok(ok("cities", Paginated::new(rows, total, page, page_size)))
}

pub async fn get_city(ctx: web::Data<ImportContext>, path: web::Path<i64>) -> ApiResult {
    let id = path.into_inner();
    let city = cities::get_city(&ctx.db, id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found(format!("city {id} not found")))?;
    Ok(ok("city", city))
}

pub async fn list_tours(
    ctx: web::Data<ImportContext>,
    query: web::Query<ToursListQuery>,
) -> ApiResult {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(20);
    let (rows, total) = tours::list_tours(&ctx.db, query.city_id, page, page_size)
        .await
        .map_err(ApiError::from)?;
    Ok(ok("tours", Paginated::new(rows, total, page, page_size)))
}

pub async fn get_tour(ctx: web::Data<ImportContext>, path: web::Path<i64>) -> ApiResult {
    let id = path.into_inner();
    let tour = tours::get_tour(&ctx.db, id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found(format!("tour {id} not found")))?;
    Ok(ok("tour", tour))
}

/// Verify that each selected city has provider inventory.
pub async fn verify_tours(
    ctx: web::Data<ImportContext>,
    payload: web::Json<VerifyRequest>,
) -> ApiResult {
    let city_ids = payload
        .into_inner()
        .location_ids
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ApiError::validation("locationIds array is required"))?;

    let results = pipeline::verify_locations(&ctx.inventory, &city_ids).await;
    Ok(ok("verification results", results))
}

/// Paginated preview across the selected cities.
pub async fn preview_tours(
    ctx: web::Data<ImportContext>,
    payload: web::Json<PreviewRequest>,
) -> ApiResult {
    let payload = payload.into_inner();
    let city_ids = payload
        .location_ids
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ApiError::validation("locationIds array is required"))?;
    let page = payload.page.unwrap_or(1);
    let page_size = payload.page_size.unwrap_or(10);

    let report = pipeline::preview_tours(&ctx.inventory, &city_ids, page, page_size)
        .await
        .map_err(ApiError::from)?;
    Ok(ok("preview", report))
}

/// Streamed import: one JSON event per line over a chunked response. The
/// run continues to completion even if the client stops consuming.
pub async fn import_tours(
    ctx: web::Data<ImportContext>,
    payload: web::Json<ImportRequest>,
) -> ApiResult {
    let payload = payload.into_inner();
    let city_ids = payload
        .location_ids
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ApiError::validation("locationIds array is required"))?;

    let params = ImportParams {
        city_ids,
        limit: payload.limit.unwrap_or(10),
        tour_type: payload.tour_type,
        batch_id: pipeline::new_batch_id(),
    };
    info!(batch_id = %params.batch_id, cities = params.city_ids.len(), limit = params.limit, "import requested");

    let rx = pipeline::spawn_import(ctx.get_ref().clone(), params);
    Ok(HttpResponse::Ok()
        .content_type("application/x-ndjson")
        .streaming(event_stream(rx)))
}

fn event_stream(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<crate::import::ImportEvent>,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(Bytes::from(event.to_ndjson_line()));
        }
    }
}

/// Recent audit rows, newest first.
pub async fn recent_imports(
    ctx: web::Data<ImportContext>,
    query: web::Query<PageQuery>,
) -> ApiResult {
    let limit = query.page_size.unwrap_or(50);
    let rows = audit::recent_imports(&ctx.db, limit)
        .await
        .map_err(ApiError::from)?;
    Ok(ok("recent imports", rows))
}
