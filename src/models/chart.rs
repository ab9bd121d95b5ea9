use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::candle::Candle;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema, IntoParams)]
pub struct ChartQuery {
    #[validate(length(min = 1, max = 24))]
    #[param(example = "BTCUSDT")]
    pub symbol: String,
    /// Number of most recent candles to return
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 200))]
    #[param(example = 55, default = 55)]
    pub limit: usize,
}

/// Candles plus indicator overlays, each series aligned index-for-index with `candles`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChartSnapshot {
    pub as_of_ms: i64,
    pub symbol: String,
    pub interval: String,
    pub candles: Vec<Candle>,
    pub ema21: Vec<Option<f64>>,
    pub ema55: Vec<Option<f64>>,
    pub ema144: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_histogram: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
}

fn default_limit() -> usize {
    55
}
