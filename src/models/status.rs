use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::signal::{IndicatorSnapshot, PivotPoint, Signal};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InstrumentStatus {
    pub symbol: String,
    pub candles: usize,
    pub is_initialized: bool,
    pub a_top: Option<PivotPoint>,
    pub a_bottom: Option<PivotPoint>,
    pub indicators: IndicatorSnapshot,
    pub last_update: Option<DateTime<Utc>>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignalsResponse {
    pub instruments: Vec<InstrumentStatus>,
    /// Signals emitted since the start of the current UTC day
    pub signals: Vec<Signal>,
}
