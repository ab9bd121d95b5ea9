use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Instruments whose candle window is full
    pub initialized: usize,
    pub monitored: usize,
}
