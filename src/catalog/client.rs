use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::models::{
    CityListing, Destination, DestinationType, DurationRange, ImageVariant, InventoryTour,
    TourImage, TourPage,
};

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        s.truncate(max_len);
        s.push('…');
    }
    s
}

/// Client for the third-party travel-inventory API.
///
/// Key endpoints:
/// - GET /destinations - full destination taxonomy (countries, cities, regions)
/// - POST /products/search - paginated product listings per destination
///
/// Destination responses are cached in memory keyed by query shape and never
/// invalidated except by an explicit `clear_cache()` call.
#[derive(Debug, Clone)]
pub struct InventoryClient {
    base_url: String,
    http: Client,
    api_key: Option<String>,
    destination_cache: Arc<RwLock<HashMap<String, Arc<Vec<Destination>>>>>,
}

impl InventoryClient {
    pub fn new(base_url: Option<&str>, timeout_secs: Option<u64>) -> Result<Self> {
        let base_url = base_url
            .unwrap_or("https://api.travel-inventory.com/partner")
            .trim_end_matches('/')
            .to_string();
        let timeout_secs = timeout_secs.unwrap_or(15);
        let http = Client::builder()
            .user_agent("InventoryClient/1.0")
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            http,
            api_key: None,
            destination_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|s| !s.trim().is_empty());
        self
    }

    fn add_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => req.header("exp-api-key", key),
            None => req,
        }
    }

    /// Drop every cached destination response.
    pub async fn clear_cache(&self) {
        self.destination_cache.write().await.clear();
    }

    /// Full destination taxonomy, cached. The cache is only dropped by an
    /// explicit `clear_cache()`.
    pub async fn destinations(&self) -> Result<Arc<Vec<Destination>>> {
        let cache_key = "destinations:all";
        if let Some(cached) = self.destination_cache.read().await.get(cache_key) {
            return Ok(cached.clone());
        }

        let url = format!("{}/destinations", self.base_url);
        let req = self.http.get(&url).header("Accept", "application/json");
        let resp = self.add_auth(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!(
                "destination fetch failed: {status} url={url} body={body}"
            ));
        }

        let body: Value = resp.json().await?;
        let Some(items) = body.get("destinations").and_then(|v| v.as_array()) else {
            return Err(anyhow!(
                "Unexpected destinations response shape (missing 'destinations' array)"
            ));
        };

        let destinations: Vec<Destination> = items.iter().filter_map(parse_destination).collect();
        let arc = Arc::new(destinations);
        self.destination_cache
            .write()
            .await
            .insert(cache_key.to_string(), arc.clone());
        Ok(arc)
    }

    /// All destinations of type COUNTRY, sorted by name.
    pub async fn get_countries(&self) -> Result<Vec<Destination>> {
        let all = self.destinations().await?;
        let mut countries: Vec<Destination> = all
            .iter()
            .filter(|d| d.kind == DestinationType::Country)
            .cloned()
            .collect();
        countries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(countries)
    }

    /// Cities whose parent country id is in the given set, annotated with the
    /// resolved country name and sorted by name.
    pub async fn get_cities_by_countries(&self, country_ids: &[String]) -> Result<Vec<CityListing>> {
        let all = self.destinations().await?;
        let wanted: HashSet<&str> = country_ids.iter().map(|s| s.as_str()).collect();
        let country_names: HashMap<&str, &str> = all
            .iter()
            .filter(|d| d.kind == DestinationType::Country)
            .map(|d| (d.destination_id.as_str(), d.name.as_str()))
            .collect();

        let mut cities: Vec<CityListing> = all
            .iter()
            .filter(|d| d.kind == DestinationType::City)
            .filter(|d| {
                d.parent_id
                    .as_deref()
                    .map(|p| wanted.contains(p))
                    .unwrap_or(false)
            })
            .map(|d| CityListing {
                destination: d.clone(),
                country_name: d
                    .parent_id
                    .as_deref()
                    .and_then(|p| country_names.get(p))
                    .map(|s| s.to_string()),
            })
            .collect();
        cities.sort_by(|a, b| a.destination.name.cmp(&b.destination.name));
        Ok(cities)
    }

    /// One paginated product-search request for a destination. `page` is
    /// 1-based. No retry on failure; the error carries status and body.
    pub async fn get_tours_by_city(
        &self,
        destination_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<TourPage> {
        let page = page.max(1);
        let limit = limit.clamp(1, 50); // provider page cap
        let start = (page - 1) * limit + 1;

        let url = format!("{}/products/search", self.base_url);
        let payload = json!({
            "filtering": { "destination": destination_id },
            "pagination": { "start": start, "count": limit },
            "currency": "EUR",
        });

        let req = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .json(&payload);
        let resp = self.add_auth(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!(
                "product search failed: {status} url={url} destination={destination_id} page={page} body={body}"
            ));
        }

        let body: Value = resp.json().await?;
        let total_count = body
            .get("totalCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let tours = body
            .get("products")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(parse_tour).collect())
            .unwrap_or_default();

        Ok(TourPage { tours, total_count })
    }

    /// First tour of page 1, used to confirm a destination has inventory.
    pub async fn sample_tour(&self, destination_id: &str) -> Result<Option<InventoryTour>> {
        let page = self.get_tours_by_city(destination_id, 1, 1).await?;
        Ok(page.tours.into_iter().next())
    }
}

fn parse_destination(item: &Value) -> Option<Destination> {
    let destination_id = item
        .get("destinationId")
        .and_then(value_as_id)
        .or_else(|| item.get("ref").and_then(value_as_id))?;
    let name = item.get("name").and_then(|v| v.as_str())?.to_string();
    let kind = item
        .get("type")
        .and_then(|v| v.as_str())
        .map(DestinationType::from_provider)
        .unwrap_or(DestinationType::Other);

    let (latitude, longitude) = item
        .get("center")
        .map(|c| {
            (
                c.get("latitude").and_then(|v| v.as_f64()),
                c.get("longitude").and_then(|v| v.as_f64()),
            )
        })
        .unwrap_or((None, None));

    Some(Destination {
        destination_id,
        name,
        kind,
        parent_id: item
            .get("parentDestinationId")
            .and_then(value_as_id)
            .or_else(|| item.get("parentId").and_then(value_as_id)),
        latitude,
        longitude,
        timezone: item
            .get("timeZone")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        iata_code: item
            .get("iataCode")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string()),
    })
}

// Provider ids show up as both numbers and strings across endpoints.
fn value_as_id(v: &Value) -> Option<String> {
    if let Some(s) = v.as_str() {
        if s.trim().is_empty() {
            return None;
        }
        return Some(s.to_string());
    }
    v.as_i64().map(|n| n.to_string())
}

fn parse_tour(item: &Value) -> InventoryTour {
    let title = item
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or("Untitled tour")
        .to_string();

    let description = item
        .get("description")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .or_else(|| item.get("shortDescription").and_then(|v| v.as_str()))
        .map(|s| s.to_string());

    let price_from = item
        .get("pricing")
        .and_then(|p| p.get("summary"))
        .and_then(|s| s.get("fromPrice"))
        .and_then(|v| v.as_f64());

    let rating = item
        .get("reviews")
        .and_then(|r| r.get("combinedAverageRating"))
        .and_then(|v| v.as_f64());
    let review_count = item
        .get("reviews")
        .and_then(|r| r.get("totalReviews"))
        .and_then(|v| v.as_i64());

    let images = item
        .get("images")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().map(parse_image).collect())
        .unwrap_or_default();

    InventoryTour {
        product_code: item
            .get("productCode")
            .and_then(value_as_id)
            .filter(|s| !s.trim().is_empty()),
        title,
        description,
        price_from,
        duration: parse_duration(item),
        rating,
        review_count,
        images,
        inclusions: collect_text_items(item.get("inclusions")),
        exclusions: collect_text_items(item.get("exclusions")),
        raw: item.clone(),
    }
}

fn parse_image(item: &Value) -> TourImage {
    let variants = item
        .get("variants")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| {
                    Some(ImageVariant {
                        url: v.get("url").and_then(|u| u.as_str())?.to_string(),
                        width: v.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32,
                        height: v.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    TourImage { variants }
}

fn parse_duration(item: &Value) -> Option<DurationRange> {
    let duration = item
        .get("duration")
        .or_else(|| item.get("itinerary").and_then(|i| i.get("duration")))?;
    if let Some(fixed) = duration
        .get("fixedDurationInMinutes")
        .and_then(|v| v.as_u64())
    {
        return Some(DurationRange {
            from_minutes: fixed as u32,
            to_minutes: fixed as u32,
        });
    }
    let from = duration
        .get("variableDurationFromMinutes")
        .and_then(|v| v.as_u64())?;
    let to = duration
        .get("variableDurationToMinutes")
        .and_then(|v| v.as_u64())
        .unwrap_or(from);
    Some(DurationRange {
        from_minutes: from as u32,
        to_minutes: to.max(from) as u32,
    })
}

fn collect_text_items(source: Option<&Value>) -> Vec<String> {
    let mut out = Vec::new();
    let Some(arr) = source.and_then(|v| v.as_array()) else {
        return out;
    };
    for item in arr {
        if let Some(s) = item.as_str() {
            if !s.trim().is_empty() {
                out.push(s.to_string());
            }
            continue;
        }
        // Structured form: { "otherDescription": "...", "description": "..." }
        for key in ["otherDescription", "description", "text"] {
            if let Some(s) = item.get(key).and_then(|v| v.as_str()) {
                if !s.trim().is_empty() {
                    out.push(s.to_string());
                    break;
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_destination_with_numeric_ids() {
        let raw = json!({
            "destinationId": 50,
            "name": "Ljubljana",
            "type": "CITY",
            "parentDestinationId": 55,
            "center": { "latitude": 46.05, "longitude": 14.51 },
            "timeZone": "Europe/Ljubljana",
            "iataCode": "LJU"
        });
        let d = parse_destination(&raw).unwrap();
        assert_eq!(d.destination_id, "50");
        assert_eq!(d.parent_id.as_deref(), Some("55"));
        assert_eq!(d.kind, DestinationType::City);
        assert_eq!(d.iata_code.as_deref(), Some("LJU"));
    }

    #[test]
    fn parses_tour_with_variable_duration_and_structured_inclusions() {
        let raw = json!({
            "productCode": "7365P4",
            "title": "Lake Bled Day Trip",
            "shortDescription": "A trip to Bled.",
            "pricing": { "summary": { "fromPrice": 89.5 } },
            "duration": {
                "variableDurationFromMinutes": 540,
                "variableDurationToMinutes": 600
            },
            "reviews": { "combinedAverageRating": 4.8, "totalReviews": 412 },
            "inclusions": [
                { "otherDescription": "Hotel pickup" },
                "Entrance fees"
            ],
            "images": [
                { "variants": [
                    { "url": "https://img/1-s.jpg", "width": 480, "height": 320 },
                    { "url": "https://img/1-l.jpg", "width": 1920, "height": 1080 }
                ]}
            ]
        });
        let tour = parse_tour(&raw);
        assert_eq!(tour.product_code.as_deref(), Some("7365P4"));
        assert_eq!(tour.description.as_deref(), Some("A trip to Bled."));
        assert_eq!(
            tour.duration,
            Some(DurationRange {
                from_minutes: 540,
                to_minutes: 600
            })
        );
        assert_eq!(tour.inclusions, vec!["Hotel pickup", "Entrance fees"]);
        assert_eq!(
            tour.images[0].top_variant().map(|v| v.url.as_str()),
            Some("https://img/1-l.jpg")
        );
    }

    #[test]
    fn tour_without_product_code_maps_to_none() {
        let tour = parse_tour(&json!({ "title": "Mystery walk", "productCode": "  " }));
        assert!(tour.product_code.is_none());
    }

    #[tokio::test]
    async fn client_initialization() {
        let client = InventoryClient::new(None, Some(15)).unwrap();
        assert!(client.base_url.contains("travel-inventory"));
    }
}
