use axum::{routing::get, Router};

use crate::handlers::{chart, health, signals};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/signals", get(signals::get_signals))
        .route("/signals/stream", get(signals::get_signal_stream))
        .route("/chart", get(chart::get_chart))
        .with_state(state)
}
