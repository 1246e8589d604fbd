use async_trait::async_trait;
use fruitsync_core::config::{HttpConfig, SourceConfig};
use fruitsync_core::error::AppError;
use fruitsync_core::models::FetchedCatalog;
use fruitsync_core::traits::FruitSource;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

/// Path of the full-catalog endpoint, relative to the API base URL.
const ALL_FRUITS_PATH: &str = "api/fruit/all";

/// HTTP client for the Fruityvice API.
///
/// API reference: <https://www.fruityvice.com/doc/index.html>
///
/// # Examples
///
/// ```no_run
/// use fruitsync_client::FruityviceClient;
/// use fruitsync_core::FruitSource;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = FruityviceClient::new("https://fruityvice.com")?;
/// let catalog = client.fetch_all().await?;
/// println!("HTTP {}: {} fruits", catalog.http_status, catalog.records.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FruityviceClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl FruityviceClient {
    /// Creates a client with the default HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the URL is malformed.
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(base_url_str: &str) -> Result<Self, AppError> {
        Self::with_config(
            &SourceConfig {
                base_url: base_url_str.to_string(),
            },
            &HttpConfig::default(),
        )
    }

    pub fn with_config(source: &SourceConfig, http: &HttpConfig) -> Result<Self, AppError> {
        // Without the trailing slash `join` would drop the last path segment.
        let normalized = format!("{}/", source.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|_| AppError::InvalidUrl(source.base_url.clone()))?;

        let client = Client::builder()
            .user_agent(http.user_agent.as_str())
            .timeout(http.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout: http.timeout,
        })
    }

    /// Full URL of the catalog endpoint.
    pub fn catalog_url(&self) -> Result<Url, AppError> {
        self.base_url
            .join(ALL_FRUITS_PATH)
            .map_err(|e| AppError::InvalidUrl(e.to_string()))
    }

    fn map_request_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout.as_secs())
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {}", e))
        } else {
            AppError::ClientError(e.to_string())
        }
    }
}

/// Decodes a catalog response body.
///
/// A success status with an undecodable body is an error. Any other status
/// keeps whatever records the body holds, or none if it is not a JSON array.
pub fn decode_catalog(http_status: u16, body: &[u8]) -> Result<FetchedCatalog, AppError> {
    let is_success = (200..300).contains(&http_status);

    match serde_json::from_slice::<Vec<Value>>(body) {
        Ok(records) => Ok(FetchedCatalog::new(http_status, records)),
        Err(e) if is_success => Err(AppError::SerializationError(e)),
        Err(e) => {
            warn!(
                "HTTP {} body is not a fruit list ({}), continuing with no records",
                http_status, e
            );
            Ok(FetchedCatalog::new(http_status, Vec::new()))
        }
    }
}

#[async_trait]
impl FruitSource for FruityviceClient {
    async fn fetch_all(&self) -> Result<FetchedCatalog, AppError> {
        let url = self.catalog_url()?;
        info!("GET {}", url);

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;

        decode_catalog(status.as_u16(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_valid_url() {
        let client = FruityviceClient::new("https://fruityvice.com").unwrap();
        assert_eq!(client.base_url.as_str(), "https://fruityvice.com/");
        assert_eq!(
            client.catalog_url().unwrap().as_str(),
            "https://fruityvice.com/api/fruit/all"
        );
    }

    #[test]
    fn test_catalog_url_keeps_base_path() {
        let client = FruityviceClient::new("http://localhost:8080/mock/").unwrap();
        assert_eq!(
            client.catalog_url().unwrap().as_str(),
            "http://localhost:8080/mock/api/fruit/all"
        );
    }

    #[test]
    fn test_new_with_invalid_url() {
        let result = FruityviceClient::new("not-a-valid-url");
        assert!(matches!(result, Err(AppError::InvalidUrl(ref url)) if url == "not-a-valid-url"));
    }

    #[test]
    fn test_decode_catalog_success() {
        let body = br#"[
            {"id": 6, "name": "Apple", "genus": "Malus", "family": "Rosaceae", "order": "Rosales",
             "nutritions": {"carbohydrates": 11.4, "protein": 0.3, "fat": 0.4, "calories": 52, "sugar": 10.3}},
            {"id": 4, "name": "Pear", "genus": "Pyrus", "family": "Rosaceae", "order": "Rosales"}
        ]"#;

        let catalog = decode_catalog(200, body).unwrap();
        assert_eq!(catalog.http_status, 200);
        assert_eq!(catalog.records.len(), 2);
        assert_eq!(catalog.records[0]["name"], "Apple");
    }

    #[test]
    fn test_decode_catalog_keeps_malformed_entries() {
        let catalog = decode_catalog(200, br#"[{"id": 1}, "not an object"]"#).unwrap();
        assert_eq!(catalog.records.len(), 2);
    }

    #[test]
    fn test_decode_catalog_bad_body_on_success_is_error() {
        let result = decode_catalog(200, b"<html>maintenance</html>");
        assert!(matches!(result, Err(AppError::SerializationError(_))));
    }

    #[test]
    fn test_decode_catalog_bad_body_on_error_status_is_degraded() {
        let catalog = decode_catalog(503, br#"{"error": "unavailable"}"#).unwrap();
        assert_eq!(catalog.http_status, 503);
        assert!(catalog.records.is_empty());
    }

    #[test]
    fn test_decode_catalog_list_on_error_status_is_kept() {
        let catalog = decode_catalog(500, br#"[{"id": 1, "name": "Apple"}]"#).unwrap();
        assert_eq!(catalog.http_status, 500);
        assert_eq!(catalog.records.len(), 1);
    }
}
