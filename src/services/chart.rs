use std::sync::Arc;

use crate::business_logic::config::DetectionConfig;
use crate::business_logic::indicators::{ema_series, macd, rsi};
use crate::errors::FetchError;
use crate::models::candle::Candle;
use crate::models::chart::ChartSnapshot;
use crate::services::binance::{BinanceClient, CandleSource};

pub struct ChartService {
    client: Arc<BinanceClient>,
    config: Arc<DetectionConfig>,
}

impl ChartService {
    pub fn new(client: Arc<BinanceClient>, config: Arc<DetectionConfig>) -> Self {
        Self { client, config }
    }

    /// Fetches a full window so the overlays are warmed up, then keeps the last `limit` candles
    pub async fn fetch_snapshot(&self, symbol: &str, limit: usize) -> Result<ChartSnapshot, FetchError> {
        let candles = self
            .client
            .fetch_recent(symbol, self.config.window_capacity)
            .await?;
        if candles.is_empty() {
            return Err(FetchError::Decode(format!("no candles returned for {symbol}")));
        }

        Ok(build_snapshot(
            symbol,
            self.client.interval(),
            &candles,
            limit,
            &self.config,
            chrono::Utc::now().timestamp_millis(),
        ))
    }
}

fn build_snapshot(
    symbol: &str,
    interval: &str,
    candles: &[Candle],
    limit: usize,
    config: &DetectionConfig,
    as_of_ms: i64,
) -> ChartSnapshot {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let len = closes.len();
    let take = limit.min(len);

    let macd = macd(&closes, config.macd_fast, config.macd_slow, config.macd_signal);
    let rsi: Vec<f64> = rsi(&closes, config.rsi_period).collect();

    ChartSnapshot {
        as_of_ms,
        symbol: symbol.to_string(),
        interval: interval.to_string(),
        candles: candles[len - take..].to_vec(),
        ema21: align_tail(&ema_series(&closes, config.ema_fast), len, take),
        ema55: align_tail(&ema_series(&closes, config.ema_mid), len, take),
        ema144: align_tail(&ema_series(&closes, config.ema_slow), len, take),
        macd: align_tail(&macd.line, len, take),
        macd_signal: align_tail(&macd.signal, len, take),
        macd_histogram: align_tail(&macd.histogram, len, take),
        rsi: align_tail(&rsi, len, take),
    }
}

/// `series` ends on the last of `len` inputs; map the last `take` inputs to
/// their value, `None` where the series has not started yet
fn align_tail(series: &[f64], len: usize, take: usize) -> Vec<Option<f64>> {
    let lead = len.saturating_sub(series.len());
    (len - take..len)
        .map(|i| i.checked_sub(lead).and_then(|j| series.get(j).copied()))
        .collect()
}
