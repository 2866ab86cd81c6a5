use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Taxonomy node kind as reported by the travel-inventory API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationType {
    Country,
    City,
    Region,
    Other,
}

impl DestinationType {
    pub fn from_provider(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "COUNTRY" => Self::Country,
            "CITY" => Self::City,
            "REGION" => Self::Region,
            _ => Self::Other,
        }
    }
}

/// A destination taxonomy node (country, city or region) with the
/// provider-assigned id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub destination_id: String,
    pub name: String,
    pub kind: DestinationType,
    pub parent_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub iata_code: Option<String>,
}

/// City annotated with its resolved country display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityListing {
    #[serde(flatten)]
    pub destination: Destination,
    pub country_name: Option<String>,
}

/// Duration of a tour in minutes, as a from/to range. Fixed-duration tours
/// have `from == to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRange {
    pub from_minutes: u32,
    pub to_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageVariant {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourImage {
    pub variants: Vec<ImageVariant>,
}

impl TourImage {
    /// Highest-resolution variant by pixel area.
    pub fn top_variant(&self) -> Option<&ImageVariant> {
        self.variants
            .iter()
            .max_by_key(|v| (v.width as u64) * (v.height as u64))
    }
}

/// Normalized tour shape mapped from the provider's product-search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryTour {
    pub product_code: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub price_from: Option<f64>,
    pub duration: Option<DurationRange>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub images: Vec<TourImage>,
    pub inclusions: Vec<String>,
    pub exclusions: Vec<String>,
    /// Raw provider payload, kept for the audit table.
    pub raw: Value,
}

/// One page of product-search results; `total_count` is the provider's total
/// for the query, carried for client-side pagination math.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourPage {
    pub tours: Vec<InventoryTour>,
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_type_maps_provider_strings() {
        assert_eq!(
            DestinationType::from_provider("COUNTRY"),
            DestinationType::Country
        );
        assert_eq!(DestinationType::from_provider("city"), DestinationType::City);
        assert_eq!(
            DestinationType::from_provider("WARD"),
            DestinationType::Other
        );
    }

    #[test]
    fn top_variant_prefers_largest_area() {
        let image = TourImage {
            variants: vec![
                ImageVariant {
                    url: "a".into(),
                    width: 480,
                    height: 320,
                },
                ImageVariant {
                    url: "b".into(),
                    width: 720,
                    height: 480,
                },
                ImageVariant {
                    url: "c".into(),
                    width: 100,
                    height: 100,
                },
            ],
        };
        assert_eq!(image.top_variant().map(|v| v.url.as_str()), Some("b"));
    }
}
