use axum::{
    extract::{Query, State},
    Json,
};
use validator::Validate;

use crate::errors::AppError;
use crate::models::chart::{ChartQuery, ChartSnapshot};
use crate::services::chart::ChartService;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/chart",
    params(ChartQuery),
    responses(
        (status = 200, description = "Recent candles with EMA, MACD and RSI overlays", body = ChartSnapshot),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 502, description = "Candle source unavailable", body = crate::errors::ErrorResponse)
    )
)]
pub async fn get_chart(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ChartSnapshot>, AppError> {
    query
        .validate()
        .map_err(|err| AppError::Validation(err.to_string()))?;

    let symbol = query.symbol.trim().to_uppercase();
    let service = ChartService::new(state.binance.clone(), state.detection.clone());
    let snapshot = service.fetch_snapshot(&symbol, query.limit).await?;

    Ok(Json(snapshot))
}
