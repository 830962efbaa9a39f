use serde::Deserialize;

use crate::{
    config::GeocodingConfig,
    error::{AppError, AppResult},
};

pub const ADDRESS_NOT_FOUND: &str = "Dirección no encontrada";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: Option<String>,
}

/// First formatted address of a provider response, if it has one.
fn first_address(body: &str) -> Option<String> {
    let response: GeocodeResponse = serde_json::from_str(body).ok()?;
    if !response.status.is_empty() && response.status != "OK" {
        return None;
    }
    response
        .results
        .into_iter()
        .filter_map(|r| r.formatted_address)
        .map(|a| a.trim().to_string())
        .find(|a| !a.is_empty())
}

pub struct GeocodingService {
    http: reqwest::Client,
    config: GeocodingConfig,
}

impl GeocodingService {
    pub fn new(config: GeocodingConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    /// Address for a coordinate. Provider failures degrade to
    /// [`ADDRESS_NOT_FOUND`] instead of an error.
    pub async fn reverse(&self, lat: f64, lng: f64) -> AppResult<String> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::Validation("Coordenadas inválidas".to_string()));
        }

        match self.lookup(lat, lng).await {
            Ok(Some(address)) => Ok(address),
            Ok(None) => Ok(ADDRESS_NOT_FOUND.to_string()),
            Err(e) => {
                tracing::warn!(lat, lng, error = %e, "reverse geocoding failed");
                Ok(ADDRESS_NOT_FOUND.to_string())
            }
        }
    }

    async fn lookup(&self, lat: f64, lng: f64) -> Result<Option<String>, reqwest::Error> {
        let latlng = format!("{},{}", lat, lng);
        let mut query = vec![("latlng", latlng.as_str()), ("language", "es")];
        if let Some(key) = self.config.api_key.as_deref() {
            query.push(("key", key));
        }

        let body = self
            .http
            .get(&self.config.endpoint)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(first_address(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn takes_the_first_formatted_address() {
        let body = r#"{"status": "OK", "results": [
            {"formatted_address": " Av. Universidad 3000, CDMX "},
            {"formatted_address": "Coyoacán"}
        ]}"#;
        assert_eq!(
            first_address(body).as_deref(),
            Some("Av. Universidad 3000, CDMX")
        );
    }

    #[test]
    fn empty_or_failed_lookups_have_no_address() {
        assert_eq!(first_address(r#"{"status": "ZERO_RESULTS", "results": []}"#), None);
        assert_eq!(
            first_address(r#"{"status": "REQUEST_DENIED", "results": [{"formatted_address": "x"}]}"#),
            None
        );
        assert_eq!(first_address("<html>"), None);
    }

    #[tokio::test]
    async fn unreachable_provider_falls_back() {
        let service = GeocodingService::new(GeocodingConfig {
            endpoint: "http://127.0.0.1:9/geocode".to_string(),
            api_key: None,
            timeout: Duration::from_millis(200),
        });
        assert_eq!(service.reverse(19.4, -99.1).await.unwrap(), ADDRESS_NOT_FOUND);
        assert!(service.reverse(91.0, 0.0).await.is_err());
    }
}
