use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::catalog::models::{Destination, DestinationType, InventoryTour};
use crate::catalog::population::PopulationClient;
use crate::catalog::InventoryClient;
use crate::import::duration::format_range;
use crate::import::events::{ImportEvent, ImportSummary, ToastStatus};
use crate::media::cdn::{object_path, CdnStorage};
use crate::store::{audit, cities, tours};
use crate::util::db::Db;

/// Everything the import pipeline needs to talk to. CDN and population
/// lookup are optional: without a CDN the provider image URL is stored
/// directly, and population stays NULL without a lookup client.
#[derive(Clone)]
pub struct ImportContext {
    pub db: Db,
    pub inventory: InventoryClient,
    pub cdn: Option<CdnStorage>,
    pub population: Option<PopulationClient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportParams {
    pub city_ids: Vec<String>,
    pub limit: u32,
    /// Tour type chosen in the wizard's category stage; upserted once per run.
    pub tour_type: Option<String>,
    pub batch_id: String,
}

/// Timestamp-derived identifier grouping all attempts of one import run.
/// A short random suffix keeps concurrent runs distinct.
pub fn new_batch_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "import_{}_{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}

const DEFAULT_TOUR_TYPE: &str = "Tours & Sightseeing";
const MAX_IMAGES_PER_TOUR: usize = 5;

/// Compact tour shape used by verify/preview responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourSummary {
    pub product_code: Option<String>,
    pub title: String,
    pub price_from: Option<f64>,
    pub duration: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
}

impl From<&InventoryTour> for TourSummary {
    fn from(tour: &InventoryTour) -> Self {
        Self {
            product_code: tour.product_code.clone(),
            title: tour.title.clone(),
            price_from: tour.price_from,
            duration: tour.duration.as_ref().map(format_range),
            rating: tour.rating,
            review_count: tour.review_count,
        }
    }
}

/// Verify result for one selected city. A city with zero inventory (or a
/// failed sample fetch) still appears, with a null match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationMatch {
    pub city_id: String,
    pub city_name: Option<String>,
    #[serde(rename = "match")]
    pub matched: Option<TourSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPreview {
    pub city_id: String,
    pub city_name: Option<String>,
    pub country_name: Option<String>,
    pub tours: Vec<TourSummary>,
    pub total_count: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewReport {
    pub locations: Vec<LocationPreview>,
    pub total_tours: u64,
    pub total_pages: u64,
}

/// Client-side pagination math shared by preview rows and the aggregate.
pub fn total_pages(total_count: u64, page_size: u32) -> u64 {
    let page_size = page_size.max(1) as u64;
    total_count.div_ceil(page_size).max(1)
}

fn destination_names(
    destinations: &[Destination],
) -> (HashMap<String, &Destination>, HashMap<String, String>) {
    let by_id: HashMap<String, &Destination> = destinations
        .iter()
        .map(|d| (d.destination_id.clone(), d))
        .collect();
    let country_names: HashMap<String, String> = destinations
        .iter()
        .filter(|d| d.kind == DestinationType::Country)
        .map(|d| (d.destination_id.clone(), d.name.clone()))
        .collect();
    (by_id, country_names)
}

/// For each selected city id, fetch one sample tour to confirm the city has
/// inventory. Per-city failures are logged, never propagated.
pub async fn verify_locations(
    inventory: &InventoryClient,
    city_ids: &[String],
) -> Vec<LocationMatch> {
    let destinations = destinations_or_empty(inventory).await;
    let (by_id, _) = destination_names(&destinations);

    let mut out = Vec::with_capacity(city_ids.len());
    for city_id in city_ids {
        let matched = match inventory.sample_tour(city_id).await {
            Ok(Some(tour)) => Some(TourSummary::from(&tour)),
            Ok(None) => None,
            Err(err) => {
                warn!(city_id = %city_id, error = %err, "verify sample fetch failed");
                None
            }
        };
        out.push(LocationMatch {
            city_id: city_id.clone(),
            city_name: by_id.get(city_id).map(|d| d.name.clone()),
            matched,
        });
    }
    out
}

/// Fetch a page of tours per selected city, concurrently (bounded only by
/// the number of cities), annotated with city/country display names.
pub async fn preview_tours(
    inventory: &InventoryClient,
    city_ids: &[String],
    page: u32,
    page_size: u32,
) -> Result<PreviewReport> {
    let page_size = page_size.clamp(1, 50);
    let destinations = inventory
        .destinations()
        .await
        .context("destination taxonomy fetch failed")?;
    let (by_id, country_names) = destination_names(&destinations);

    let fetches = city_ids.iter().map(|city_id| {
        let inventory = inventory.clone();
        let city_id = city_id.clone();
        async move {
            let result = inventory.get_tours_by_city(&city_id, page, page_size).await;
            (city_id, result)
        }
    });

    let mut locations = Vec::with_capacity(city_ids.len());
    let mut total_tours: u64 = 0;
    let mut max_pages: u64 = 1;
    for (city_id, result) in join_all(fetches).await {
        let tour_page = match result {
            Ok(p) => p,
            Err(err) => {
                warn!(city_id = %city_id, error = %err, "preview fetch failed; returning empty page");
                crate::catalog::models::TourPage {
                    tours: Vec::new(),
                    total_count: 0,
                }
            }
        };
        let pages = total_pages(tour_page.total_count, page_size);
        max_pages = max_pages.max(pages);
        total_tours += tour_page.total_count;

        let destination = by_id.get(&city_id);
        locations.push(LocationPreview {
            city_id: city_id.clone(),
            city_name: destination.map(|d| d.name.clone()),
            country_name: destination
                .and_then(|d| d.parent_id.as_deref())
                .and_then(|p| country_names.get(p))
                .cloned(),
            tours: tour_page.tours.iter().map(TourSummary::from).collect(),
            total_count: tour_page.total_count,
            total_pages: pages,
        });
    }

    Ok(PreviewReport {
        locations,
        total_tours,
        total_pages: max_pages,
    })
}

enum TourOutcome {
    Imported { tour_id: i64 },
    NoProductCode,
    AlreadyImported,
}

/// Run an import to completion, pushing progress events into `tx`. Send
/// errors are ignored: a client that stops consuming the response does not
/// stop the run.
pub async fn run_import(
    ctx: ImportContext,
    params: ImportParams,
    tx: mpsc::UnboundedSender<ImportEvent>,
) -> ImportSummary {
    let emit = |event: ImportEvent| {
        let _ = tx.send(event);
    };

    let mut summary = ImportSummary::default();
    let limit = params.limit.clamp(1, 50);
    let type_name = params
        .tour_type
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TOUR_TYPE.to_string());

    let tour_type_id = match tours::ensure_tour_type(&ctx.db, &type_name, None).await {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(error = %err, tour_type = %type_name, "tour type upsert failed");
            emit(ImportEvent::toast(
                ToastStatus::Error,
                format!("Could not prepare tour type \"{type_name}\": {err}"),
            ));
            None
        }
    };

    let destinations = destinations_or_empty(&ctx.inventory).await;
    let (by_id, country_names) = destination_names(&destinations);

    for city_id in &params.city_ids {
        let destination = by_id.get(city_id).copied();
        let city_label = destination
            .map(|d| d.name.clone())
            .unwrap_or_else(|| format!("city {city_id}"));

        let page = match ctx.inventory.get_tours_by_city(city_id, 1, limit).await {
            Ok(page) => page,
            Err(err) => {
                warn!(city_id = %city_id, error = %err, "tour fetch failed; skipping city");
                emit(ImportEvent::toast(
                    ToastStatus::Error,
                    format!("Failed to fetch tours for {city_label}: {err}"),
                ));
                continue;
            }
        };

        emit(ImportEvent::toast(
            ToastStatus::Info,
            format!("Importing {} tour(s) for {city_label}", page.tours.len()),
        ));

        let db_city_id = match ensure_city_row(&ctx, city_id, destination, &country_names).await {
            Ok(id) => id,
            Err(err) => {
                warn!(city_id = %city_id, error = %err, "city upsert failed; skipping city");
                emit(ImportEvent::toast(
                    ToastStatus::Error,
                    format!("Failed to store city {city_label}: {err}"),
                ));
                continue;
            }
        };

        for tour in &page.tours {
            summary.total += 1;
            match import_one(&ctx, tour, db_city_id, tour_type_id, &params.batch_id).await {
                Ok(TourOutcome::Imported { tour_id }) => {
                    summary.imported += 1;
                    info!(tour_id, title = %tour.title, "tour imported");
                    emit(ImportEvent::toast(
                        ToastStatus::Success,
                        format!("Imported \"{}\"", tour.title),
                    ));
                }
                Ok(TourOutcome::NoProductCode) => {
                    summary.skipped += 1;
                    emit(ImportEvent::toast(
                        ToastStatus::Warning,
                        format!("Skipped \"{}\": no product code", tour.title),
                    ));
                }
                Ok(TourOutcome::AlreadyImported) => {
                    summary.skipped += 1;
                    emit(ImportEvent::toast(
                        ToastStatus::Info,
                        format!("Skipped \"{}\": already imported", tour.title),
                    ));
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(title = %tour.title, error = %err, "tour import failed");
                    emit(ImportEvent::toast(
                        ToastStatus::Error,
                        format!("Failed to import \"{}\": {err}", tour.title),
                    ));
                }
            }
        }
    }

    info!(
        imported = summary.imported,
        skipped = summary.skipped,
        failed = summary.failed,
        total = summary.total,
        batch_id = %params.batch_id,
        "import run finished"
    );
    emit(ImportEvent::summary(summary));
    summary
}

/// Spawn an import run on the runtime and hand back the event receiver.
/// The run continues to completion even if the receiver is dropped.
pub fn spawn_import(
    ctx: ImportContext,
    params: ImportParams,
) -> mpsc::UnboundedReceiver<ImportEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        run_import(ctx, params, tx).await;
    });
    rx
}

/// Resolve (or create) the local city row backing a provider destination,
/// backfilling population on first sight when a lookup client is available.
async fn ensure_city_row(
    ctx: &ImportContext,
    city_id: &str,
    destination: Option<&Destination>,
    country_names: &HashMap<String, String>,
) -> Result<i64> {
    if let Some(existing) = cities::city_by_external_id(&ctx.db, city_id).await? {
        if existing.population.is_none() {
            if let Some(population) = lookup_population(ctx, &existing.name, None).await {
                let _ = cities::update_city_population(&ctx.db, existing.id, population).await;
            }
        }
        return Ok(existing.id);
    }

    let destination =
        destination.with_context(|| format!("unknown destination id {city_id}"))?;
    let country_name = destination
        .parent_id
        .as_deref()
        .and_then(|p| country_names.get(p))
        .cloned();
    let population = lookup_population(ctx, &destination.name, country_name.as_deref()).await;

    cities::ensure_city(
        &ctx.db,
        &cities::CityUpsert {
            name: destination.name.clone(),
            external_destination_id: Some(destination.destination_id.clone()),
            country_destination_id: destination.parent_id.clone(),
            latitude: destination.latitude,
            longitude: destination.longitude,
            timezone: destination.timezone.clone(),
            iata_code: destination.iata_code.clone(),
            population,
        },
    )
    .await
}

async fn lookup_population(
    ctx: &ImportContext,
    city_name: &str,
    country: Option<&str>,
) -> Option<i64> {
    let client = ctx.population.as_ref()?;
    match client.population(city_name, country).await {
        Ok(population) => population,
        Err(err) => {
            warn!(city = %city_name, error = %err, "population lookup failed");
            None
        }
    }
}

async fn import_one(
    ctx: &ImportContext,
    tour: &InventoryTour,
    db_city_id: i64,
    tour_type_id: Option<i64>,
    batch_id: &str,
) -> Result<TourOutcome> {
    let Some(product_code) = tour.product_code.as_deref() else {
        return Ok(TourOutcome::NoProductCode);
    };

    let Some(audit_id) =
        audit::claim_product_code(&ctx.db, batch_id, product_code, &tour.raw).await?
    else {
        return Ok(TourOutcome::AlreadyImported);
    };

    match import_claimed(ctx, tour, product_code, db_city_id, tour_type_id).await {
        Ok((tour_id, processed)) => {
            audit::mark_completed(&ctx.db, audit_id, tour_id, tour_type_id, &processed).await?;
            Ok(TourOutcome::Imported { tour_id })
        }
        Err(err) => {
            // Partial state (an upserted tour, uploaded images) is left in
            // place; the audit row records the failure.
            if let Err(mark_err) =
                audit::mark_failed(&ctx.db, audit_id, &err.to_string()).await
            {
                warn!(audit_id, error = %mark_err, "failed to mark audit row FAILED");
            }
            Err(err)
        }
    }
}

async fn import_claimed(
    ctx: &ImportContext,
    tour: &InventoryTour,
    product_code: &str,
    db_city_id: i64,
    tour_type_id: Option<i64>,
) -> Result<(i64, serde_json::Value)> {
    let image_url = store_images(ctx, tour, product_code).await;

    let upsert = tours::TourUpsert {
        name: tour.title.clone(),
        description: tour.description.clone(),
        city_id: db_city_id,
        tour_type_id,
        price: tour.price_from,
        duration: tour.duration.as_ref().map(format_range),
        image_url,
        rating: tour.rating,
        review_count: tour.review_count,
        inclusions: join_blob(&tour.inclusions),
        exclusions: join_blob(&tour.exclusions),
    };
    let tour_id = tours::upsert_tour(&ctx.db, &upsert).await?;

    let processed = json!({
        "tour_id": tour_id,
        "name": upsert.name,
        "city_id": upsert.city_id,
        "tour_type_id": upsert.tour_type_id,
        "price": upsert.price,
        "duration": upsert.duration,
        "image_url": upsert.image_url,
        "rating": upsert.rating,
    });
    Ok((tour_id, processed))
}

/// Upload up to five highest-resolution image variants to the CDN,
/// sequentially and best-effort: a failed upload is logged and skipped, it
/// never aborts the tour. Returns the URL to store on the tour (the first
/// stored copy, or the first source URL when no CDN is configured).
async fn store_images(
    ctx: &ImportContext,
    tour: &InventoryTour,
    product_code: &str,
) -> Option<String> {
    let sources: Vec<&str> = tour
        .images
        .iter()
        .filter_map(|img| img.top_variant())
        .map(|v| v.url.as_str())
        .take(MAX_IMAGES_PER_TOUR)
        .collect();

    let Some(cdn) = ctx.cdn.as_ref() else {
        return sources.first().map(|s| s.to_string());
    };

    let mut stored_url: Option<String> = None;
    for (idx, source) in sources.iter().enumerate() {
        let path = object_path(product_code, idx, source);
        match cdn.fetch_and_upload(source, &path).await {
            Ok(public_url) => {
                if stored_url.is_none() {
                    stored_url = Some(public_url);
                }
            }
            Err(err) => {
                warn!(product_code = %product_code, source = %source, error = %err, "image upload failed");
            }
        }
    }
    stored_url
}

fn join_blob(items: &[String]) -> Option<String> {
    if items.is_empty() {
        None
    } else {
        Some(items.join("\n"))
    }
}

async fn destinations_or_empty(inventory: &InventoryClient) -> Arc<Vec<Destination>> {
    match inventory.destinations().await {
        Ok(v) => v,
        Err(err) => {
            warn!(error = %err, "destination taxonomy unavailable; names will be missing");
            Arc::new(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::DurationRange;

    #[test]
    fn total_pages_rounds_up_and_floors_at_one() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(101, 10), 11);
        // degenerate page size is clamped rather than dividing by zero
        assert_eq!(total_pages(5, 0), 5);
    }

    #[test]
    fn location_match_serializes_null_match() {
        let entry = LocationMatch {
            city_id: "50".into(),
            city_name: Some("Ljubljana".into()),
            matched: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value["match"].is_null());
        assert_eq!(value["city_id"], "50");
    }

    #[test]
    fn tour_summary_carries_formatted_duration() {
        let tour = InventoryTour {
            product_code: Some("7365P4".into()),
            title: "Lake Bled Day Trip".into(),
            description: None,
            price_from: Some(89.5),
            duration: Some(DurationRange {
                from_minutes: 540,
                to_minutes: 600,
            }),
            rating: Some(4.8),
            review_count: Some(412),
            images: Vec::new(),
            inclusions: Vec::new(),
            exclusions: Vec::new(),
            raw: serde_json::Value::Null,
        };
        let summary = TourSummary::from(&tour);
        assert_eq!(summary.duration.as_deref(), Some("Full Day"));
    }

    #[test]
    fn join_blob_collapses_empty_lists() {
        assert_eq!(join_blob(&[]), None);
        assert_eq!(
            join_blob(&["Hotel pickup".into(), "Entrance fees".into()]).as_deref(),
            Some("Hotel pickup\nEntrance fees")
        );
    }

    #[test]
    fn batch_ids_are_timestamp_derived() {
        let id = new_batch_id();
        assert!(id.starts_with("import_"));
        assert!(id.len() > "import_".len());
    }
}
