//! HTTP market-data adapter.
//!
//! One reqwest client serves all three slow-path ports: the security
//! universe, previous closes, and session volumes. Batched endpoints
//! take comma-joined symbol lists in a single query parameter.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::ports::{
    MarketDataError, ReferencePriceSource, UniverseSource, VolumeSource,
};
use crate::domain::market::SecurityMetadata;
use crate::infrastructure::config::HttpSettings;

/// Market-data API client.
///
/// Implements `UniverseSource`, `ReferencePriceSource` and
/// `VolumeSource` against the REST endpoints.
#[derive(Debug)]
pub struct MarketDataClient {
    client: reqwest::Client,
    base_url: String,
}

impl MarketDataClient {
    /// Create a client from HTTP settings.
    pub fn new(settings: &HttpSettings) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| MarketDataError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<T, MarketDataError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketDataError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::Api {
                status: status.as_u16(),
                message: truncate(&body, 512),
            });
        }

        response
            .json()
            .await
            .map_err(|e| MarketDataError::Malformed(e.to_string()))
    }

    fn batched_url(&self, path: &str, symbols: &[String]) -> Result<String, MarketDataError> {
        if symbols.is_empty() {
            return Err(MarketDataError::EmptySymbolList);
        }
        Ok(format!(
            "{}{}?symbols={}",
            self.base_url,
            path,
            symbols.join(",")
        ))
    }
}

fn truncate(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        body.to_string()
    } else {
        let mut end = limit;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

#[async_trait]
impl UniverseSource for MarketDataClient {
    async fn fetch_universe(&self) -> Result<Vec<SecurityMetadata>, MarketDataError> {
        let url = format!("{}/v1/universe", self.base_url);
        let response: UniverseResponse = self.get_json(url).await?;

        Ok(response
            .securities
            .into_iter()
            .map(|row| SecurityMetadata {
                symbol: row.symbol,
                name: row.name,
                sector: row.sector,
                exchange: row.exchange.unwrap_or_default(),
                market_cap: row.market_cap,
            })
            .collect())
    }
}

#[async_trait]
impl ReferencePriceSource for MarketDataClient {
    async fn fetch_previous_closes(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Decimal>, MarketDataError> {
        let url = self.batched_url("/v1/stocks/closes/previous", symbols)?;
        let response: ClosesResponse = self.get_json(url).await?;
        Ok(response.closes)
    }
}

#[async_trait]
impl VolumeSource for MarketDataClient {
    async fn fetch_volumes(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, u64>, MarketDataError> {
        let url = self.batched_url("/v1/stocks/volumes", symbols)?;
        let response: VolumesResponse = self.get_json(url).await?;
        Ok(response.volumes)
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct UniverseResponse {
    securities: Vec<UniverseRow>,
}

#[derive(Debug, Deserialize)]
struct UniverseRow {
    symbol: String,
    name: String,
    sector: String,
    exchange: Option<String>,
    #[serde(rename = "marketCap")]
    market_cap: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct ClosesResponse {
    closes: HashMap<String, Decimal>,
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    volumes: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resilience::RetryClass;

    fn client_for(server: &MockServer) -> MarketDataClient {
        MarketDataClient::new(&HttpSettings {
            base_url: server.uri(),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn fetches_and_maps_the_universe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/universe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "securities": [
                    {
                        "symbol": "AAPL",
                        "name": "Apple Inc",
                        "sector": "technology",
                        "exchange": "NASDAQ",
                        "marketCap": "3000000000000"
                    },
                    {
                        "symbol": "PLTR",
                        "name": "Palantir",
                        "sector": "technology",
                        "exchange": null,
                        "marketCap": null
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let universe = client.fetch_universe().await.unwrap();

        assert_eq!(universe.len(), 2);
        assert_eq!(universe[0].symbol, "AAPL");
        assert_eq!(universe[0].market_cap, Some(dec!(3_000_000_000_000)));
        assert_eq!(universe[1].exchange, "");
        assert!(universe[1].market_cap.is_none());
    }

    #[tokio::test]
    async fn batches_previous_closes_in_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/stocks/closes/previous"))
            .and(query_param("symbols", "AAPL,MSFT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "closes": { "AAPL": "200.50", "MSFT": "415" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let closes = client
            .fetch_previous_closes(&["AAPL".to_owned(), "MSFT".to_owned()])
            .await
            .unwrap();

        assert_eq!(closes.get("AAPL"), Some(&dec!(200.50)));
        assert_eq!(closes.get("MSFT"), Some(&dec!(415)));
    }

    #[tokio::test]
    async fn missing_symbols_are_simply_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/stocks/volumes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "volumes": { "AAPL": 123456 }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let volumes = client
            .fetch_volumes(&["AAPL".to_owned(), "GHOST".to_owned()])
            .await
            .unwrap();

        assert_eq!(volumes.get("AAPL"), Some(&123_456));
        assert!(!volumes.contains_key("GHOST"));
    }

    #[tokio::test]
    async fn empty_symbol_list_short_circuits_without_a_request() {
        let server = MockServer::start().await;
        // No mock mounted: any request would 404 and fail differently.
        let client = client_for(&server);

        let error = client.fetch_volumes(&[]).await.unwrap_err();
        assert!(matches!(error, MarketDataError::EmptySymbolList));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn server_errors_map_to_retryable_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/universe"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let error = client.fetch_universe().await.unwrap_err();

        match &error {
            MarketDataError::Api { status, message } => {
                assert_eq!(*status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn garbage_bodies_map_to_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/universe"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let error = client.fetch_universe().await.unwrap_err();
        assert!(matches!(error, MarketDataError::Malformed(_)));
        assert!(!error.is_retryable());
    }
}
