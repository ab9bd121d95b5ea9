use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::models::signal::Signal;
use crate::models::status::SignalsResponse;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/signals",
    responses(
        (status = 200, description = "Per-instrument status and today's signals", body = SignalsResponse)
    )
)]
pub async fn get_signals(State(state): State<AppState>) -> Result<Json<SignalsResponse>, AppError> {
    let instruments = state.signal_state.instruments.read().await.clone();
    let signals = state.signal_state.signals.read().await.clone();
    Ok(Json(SignalsResponse {
        instruments,
        signals,
    }))
}

#[utoipa::path(
    get,
    path = "/signals/stream",
    responses(
        (status = 200, description = "SSE stream of emitted signals", content_type = "text/event-stream")
    )
)]
pub async fn get_signal_stream(
    State(state): State<AppState>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let rx = state.signal_state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|message| match message {
        Ok(signal) => signal_event(&signal).map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!("signal stream lagged, skipped {} signal(s)", skipped);
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn signal_event(signal: &Signal) -> Option<Event> {
    let data = serde_json::to_string(signal).ok()?;
    Some(
        Event::default()
            .event("signal")
            .id(format!("{}-{}", signal.symbol, signal.candle_time))
            .data(data),
    )
}
