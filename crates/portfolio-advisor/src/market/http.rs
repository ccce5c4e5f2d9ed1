//! HTTP JSON market data provider.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::MarketData;
use crate::config::MarketDataSettings;
use crate::error::{AdvisorError, Result};
use crate::model::Instrument;

/// First retry delay unless overridden
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Retry delays stop doubling after this many attempts
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Response body of the instruments endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstrumentsResponse {
    pub instruments: Vec<Instrument>,
}

#[derive(Debug, Clone)]
pub struct HttpMarketData {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
    backoff: Duration,
}

impl HttpMarketData {
    pub fn from_settings(settings: &MarketDataSettings) -> Result<Self> {
        let base_url = settings
            .base_url
            .clone()
            .ok_or_else(|| AdvisorError::Config("MARKET_DATA_BASE_URL is required".into()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: settings.api_key.clone(),
            path: settings.path.clone(),
            retries: settings.retries.max(1),
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Delay before the first retry; doubles on each further attempt
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.backoff.saturating_mul(1 << shift)
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            let value = HeaderValue::from_str(api_key)
                .map_err(|e| AdvisorError::Config(format!("invalid MARKET_DATA_API_KEY: {e}")))?;
            headers.insert("x-api-key", value);
        }
        Ok(headers)
    }

    async fn fetch_once(&self, symbols: &[String]) -> Result<InstrumentsResponse> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .query(&[("symbols", symbols.join(","))])
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        if status.is_client_error() {
            return Err(AdvisorError::MarketDataRejected(format!("HTTP {status}: {text}")));
        }
        if !status.is_success() {
            return Err(AdvisorError::MarketData(format!("HTTP {status}: {text}")));
        }

        Ok(serde_json::from_str::<InstrumentsResponse>(&text)?)
    }
}

/// Arrange fetched instruments in request order; every symbol must be present.
fn order_by_request(instruments: Vec<Instrument>, symbols: &[String]) -> Result<Vec<Instrument>> {
    let mut by_symbol: HashMap<String, Instrument> = instruments
        .into_iter()
        .map(|i| (i.symbol().to_string(), i))
        .collect();

    symbols
        .iter()
        .map(|s| {
            by_symbol
                .remove(&s.trim().to_uppercase())
                .ok_or_else(|| AdvisorError::UnknownInstrument(s.clone()))
        })
        .collect()
}

#[async_trait]
impl MarketData for HttpMarketData {
    async fn fetch_instrument(&self, symbol: &str) -> Result<Instrument> {
        let mut found = self.fetch_instruments(&[symbol.to_string()]).await?;
        found
            .pop()
            .ok_or_else(|| AdvisorError::UnknownInstrument(symbol.to_string()))
    }

    async fn fetch_instruments(&self, symbols: &[String]) -> Result<Vec<Instrument>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(symbols).await {
                Ok(resp) => return order_by_request(resp.instruments, symbols),
                Err(err) if err.is_retryable() && attempt < self.retries => {
                    let backoff = self.backoff_for(attempt);
                    tracing::warn!(attempt, ?backoff, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.http
            .head(self.url())
            .headers(self.headers().unwrap_or_default())
            .send()
            .await
            .is_ok_and(|res| res.status().is_success())
    }

    fn name(&self) -> &str {
        "HttpJson"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one connection per canned (status, body), counting requests.
    async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let reason = match status {
                    200 => "OK",
                    404 => "Not Found",
                    _ => "Internal Server Error",
                };
                let reply = format!(
                    "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}"), hits)
    }

    fn local_client(base_url: &str, retries: u32) -> HttpMarketData {
        let settings = MarketDataSettings {
            retries,
            ..settings(base_url, "/v1/instruments")
        };
        HttpMarketData::from_settings(&settings)
            .unwrap()
            .with_client(reqwest::Client::builder().no_proxy().build().unwrap())
            .with_backoff(Duration::from_millis(5))
    }

    fn body() -> String {
        serde_json::json!({
            "instruments": [{"symbol": "AAPL", "dates": ["2024-01-02"], "returns": [0.01]}]
        })
        .to_string()
    }

    fn settings(base_url: &str, path: &str) -> MarketDataSettings {
        MarketDataSettings {
            base_url: Some(base_url.to_string()),
            path: path.to_string(),
            ..MarketDataSettings::default()
        }
    }

    fn inst(symbol: &str) -> Instrument {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        Instrument::new(symbol, vec![d], vec![0.01]).unwrap()
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let client = HttpMarketData::from_settings(&settings("https://data.example.com/", "v1/returns")).unwrap();
        assert_eq!(client.url(), "https://data.example.com/v1/returns");

        let client = HttpMarketData::from_settings(&settings("https://data.example.com", "/v1/returns")).unwrap();
        assert_eq!(client.url(), "https://data.example.com/v1/returns");
    }

    #[test]
    fn test_requires_base_url() {
        let err = HttpMarketData::from_settings(&MarketDataSettings::default()).unwrap_err();
        assert!(matches!(err, AdvisorError::Config(_)));
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let (url, hits) = serve(vec![(500, "busy".into()), (200, body())]).await;
        let client = local_client(&url, 3);

        let got = client.fetch_instruments(&["aapl".to_string()]).await.unwrap();
        assert_eq!(got[0].symbol(), "AAPL");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (url, hits) = serve(vec![(404, "no such path".into()), (200, body())]).await;
        let client = local_client(&url, 3);

        let err = client.fetch_instruments(&["AAPL".to_string()]).await.unwrap_err();
        assert!(matches!(err, AdvisorError::MarketDataRejected(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let (url, hits) = serve(vec![(500, "a".into()), (500, "b".into()), (500, "c".into())]).await;
        let client = local_client(&url, 2);

        let err = client.fetch_instruments(&["AAPL".to_string()]).await.unwrap_err();
        assert!(matches!(err, AdvisorError::MarketData(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_health_check_needs_success_status() {
        let (url, _) = serve(vec![(200, String::new())]).await;
        assert!(local_client(&url, 1).health_check().await);

        let (url, _) = serve(vec![(500, String::new())]).await;
        assert!(!local_client(&url, 1).health_check().await);
    }

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let client = HttpMarketData::from_settings(&settings("http://localhost", "/")).unwrap();
        assert_eq!(client.backoff_for(1), Duration::from_secs(1));
        assert_eq!(client.backoff_for(3), Duration::from_secs(4));
        assert_eq!(client.backoff_for(200), Duration::from_secs(1 << MAX_BACKOFF_SHIFT));
    }

    #[test]
    fn test_order_by_request() {
        let symbols = vec!["msft".to_string(), "AAPL".to_string()];
        let ordered = order_by_request(vec![inst("AAPL"), inst("MSFT"), inst("XOM")], &symbols).unwrap();
        assert_eq!(ordered[0].symbol(), "MSFT");
        assert_eq!(ordered[1].symbol(), "AAPL");

        let err = order_by_request(vec![inst("AAPL")], &symbols).unwrap_err();
        assert!(matches!(err, AdvisorError::UnknownInstrument(s) if s == "msft"));
    }

    #[test]
    fn test_parses_response_shape() {
        let body = serde_json::json!({
            "instruments": [
                {"symbol": "AAPL", "sector": "Technology", "dates": ["2024-01-02"], "returns": [0.01]}
            ]
        });
        let parsed: InstrumentsResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.instruments[0].sector(), Some("Technology"));

        let bad = serde_json::json!({
            "instruments": [{"symbol": "AAPL", "dates": ["2024-01-02"], "returns": ["x"]}]
        });
        assert!(serde_json::from_value::<InstrumentsResponse>(bad).is_err());
    }
}
