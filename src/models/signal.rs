use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PivotKind {
    Top,
    Bottom,
}

/// An extremum located inside the current candle window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PivotPoint {
    pub price: f64,
    /// Position within the current window
    pub index: usize,
    /// Open time of the candle carrying the extremum (epoch ms)
    pub timestamp: i64,
    pub kind: PivotKind,
}

/// Latest indicator values for one instrument. `None` means not enough history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IndicatorSnapshot {
    pub ema21: Option<f64>,
    pub ema55: Option<f64>,
    pub ema144: Option<f64>,
    pub atr: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    DoubleTop,
    DoubleBottom,
    UptrendOnset,
    DowntrendOnset,
}

impl SignalKind {
    pub fn label(&self) -> &'static str {
        match self {
            SignalKind::DoubleTop => "double top",
            SignalKind::DoubleBottom => "double bottom",
            SignalKind::UptrendOnset => "EMA uptrend onset",
            SignalKind::DowntrendOnset => "EMA downtrend onset",
        }
    }
}

/// A, B and C pivots of a double top / double bottom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatternPoints {
    pub a: PivotPoint,
    pub b: PivotPoint,
    pub c: PivotPoint,
}

/// A detected event. Immutable once built; handed to notification/chart consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Signal {
    pub symbol: String,
    pub kind: SignalKind,
    /// Close of the newest candle in the window
    pub price: f64,
    /// Open time of the newest candle in the window (epoch ms)
    pub candle_time: i64,
    pub detected_at: DateTime<Utc>,
    pub indicators: IndicatorSnapshot,
    pub pattern: Option<PatternPoints>,
}
