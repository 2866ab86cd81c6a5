use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Client for the population-lookup HTTP API used to backfill city
/// population figures. Lookups are best effort; callers log failures and
/// leave the column NULL.
#[derive(Debug, Clone)]
pub struct PopulationClient {
    base_url: String,
    http: Client,
    api_key: Option<String>,
}

impl PopulationClient {
    pub fn new(base_url: Option<&str>, timeout_secs: Option<u64>) -> Result<Self> {
        let base_url = base_url
            .unwrap_or("https://api.geo-lookup.io/v1")
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .user_agent("PopulationClient/1.0")
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(10)))
            .build()?;
        Ok(Self {
            base_url,
            http,
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|s| !s.trim().is_empty());
        self
    }

    /// Look up the population of a city by name and country. Returns None
    /// when the API has no match.
    pub async fn population(&self, city: &str, country: Option<&str>) -> Result<Option<i64>> {
        let url = format!("{}/city", self.base_url);
        let mut req = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(&[("name", city)]);
        if let Some(country) = country {
            req = req.query(&[("country", country)]);
        }
        if let Some(key) = self.api_key.as_deref() {
            req = req.header("X-Api-Key", key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow!("population lookup failed: {status} city={city}"));
        }

        let body: Value = resp.json().await?;
        Ok(extract_population(&body))
    }
}

fn extract_population(body: &Value) -> Option<i64> {
    // Either a bare object or a result list; take the first match.
    let node = body
        .get("results")
        .and_then(|r| r.as_array())
        .and_then(|arr| arr.first())
        .unwrap_or(body);
    node.get("population")
        .and_then(|v| v.as_i64())
        .filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_population_from_result_list() {
        let body = json!({ "results": [ { "name": "Ljubljana", "population": 295504 } ] });
        assert_eq!(extract_population(&body), Some(295504));
    }

    #[test]
    fn zero_population_treated_as_missing() {
        assert_eq!(extract_population(&json!({ "population": 0 })), None);
        assert_eq!(extract_population(&json!({})), None);
    }
}
