// API request/response models (DTOs)

use serde::{Deserialize, Serialize};

use crate::store::mappings::MappingPair;

/// Standard response wrapper: `{status, statusCode, message, data}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            status_code: 200,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            status_code,
            message: message.into(),
            data: None,
        }
    }
}

/// Save-mappings payload. The `mappings` array is required; a missing or
/// empty array is a validation error.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveMappingsRequest {
    pub mappings: Option<Vec<MappingPair>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveMappingsResult {
    pub inserted: usize,
    pub deleted: usize,
    pub total: usize,
}

/// Provider-cities query: comma-separated country destination ids.
#[derive(Debug, Deserialize)]
pub struct ProviderCitiesQuery {
    pub countries: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ToursListQuery {
    #[serde(rename = "cityId")]
    pub city_id: Option<i64>,
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub location_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub location_ids: Option<Vec<String>>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub location_ids: Option<Vec<String>>,
    pub limit: Option<u32>,
    pub tour_type: Option<String>,
}

/// Paginated listing body used by the cities and tours endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, page_size: u32) -> Self {
        let total_pages = crate::import::pipeline::total_pages(total.max(0) as u64, page_size);
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_status_code_in_camel_case() {
        let env = Envelope::success("ok", serde_json::json!({"n": 1}));
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["data"]["n"], 1);
    }

    #[test]
    fn error_envelope_omits_data() {
        let env = Envelope::<serde_json::Value>::error(400, "mappings array is required");
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["statusCode"], 400);
        assert!(value.get("data").is_none());
    }

    #[test]
    fn verify_request_accepts_camel_case_ids() {
        let req: VerifyRequest = serde_json::from_str(r#"{"locationIds": ["50", "51"]}"#).unwrap();
        assert_eq!(req.location_ids.as_deref().map(|v| v.len()), Some(2));
    }

    #[test]
    fn paginated_body_carries_page_math() {
        let body = Paginated::new(vec![1, 2, 3], 101, 1, 10);
        assert_eq!(body.total_pages, 11);
    }
}
