use std::future::Future;
use std::time::Duration;

use crate::errors::FetchError;
use crate::models::candle::{BinanceKline, Candle};

/// Anything that can hand back the most recent candles of an instrument
pub trait CandleSource {
    fn fetch_recent(
        &self,
        symbol: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Candle>, FetchError>> + Send;
}

#[derive(Clone)]
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
    interval: String,
}

impl BinanceClient {
    pub fn new(base_url: &str, interval: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            interval: interval.to_string(),
        })
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }
}

impl CandleSource for BinanceClient {
    /// Latest `limit` klines, oldest first. The final one is usually still forming.
    async fn fetch_recent(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, FetchError> {
        let response = self
            .client
            .get(format!("{}/api/v3/klines", self.base_url))
            .query(&[("symbol", symbol), ("interval", self.interval.as_str())])
            .query(&[("limit", limit)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let rows: Vec<BinanceKline> =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(rows.into_iter().map(Candle::from).collect())
    }
}
