mod business_logic;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::business_logic::config::{DetectionConfig, MonitorConfig};
use crate::services::binance::BinanceClient;
use crate::services::monitor::MonitorService;
use crate::services::signal_state::SignalStateInner;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::signals::get_signals,
        handlers::signals::get_signal_stream,
        handlers::chart::get_chart
    ),
    components(schemas(
        models::health::HealthResponse,
        models::status::SignalsResponse,
        models::status::InstrumentStatus,
        models::signal::Signal,
        models::signal::SignalKind,
        models::signal::PatternPoints,
        models::signal::PivotPoint,
        models::signal::PivotKind,
        models::signal::IndicatorSnapshot,
        models::chart::ChartSnapshot,
        models::candle::Candle,
        errors::ErrorResponse
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = MonitorConfig::from_env()?;

    // Initialize tracing: stdout plus a daily rolling file
    let file_appender = tracing_appender::rolling::daily(&settings.log_dir, "screener.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("patternscreener={}", settings.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    let detection = DetectionConfig::default();
    let binance = Arc::new(
        BinanceClient::new(
            &settings.binance_api_url,
            &settings.interval,
            settings.request_timeout,
        )
        .context("failed to build HTTP client")?,
    );
    let signal_state = Arc::new(SignalStateInner::new(64));

    // Start the hourly scan in background
    let mut monitor = MonitorService::new(
        (*binance).clone(),
        &settings,
        detection.clone(),
        signal_state.clone(),
    );
    let symbols = settings.symbols.join(", ");
    let (stop_monitor, monitor_stopped) = tokio::sync::oneshot::channel::<()>();
    let monitor_task = tokio::spawn(async move {
        tracing::info!("Pattern detection starting for {}", symbols);
        monitor
            .run_until(async {
                let _ = monitor_stopped.await;
            })
            .await;
    });

    let state = AppState {
        signal_state,
        binance,
        detection: Arc::new(detection),
    };
    let app = routes::router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    tracing::info!("Server running on http://{}", settings.bind_addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui", settings.bind_addr);
    // open SSE streams never end, so Ctrl-C drops the server instead of draining it
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result?,
        _ = shutdown_signal() => {}
    }

    let _ = stop_monitor.send(());
    monitor_task.await.context("monitor task failed")?;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl-C received, shutting down"),
        Err(e) => {
            tracing::error!("Unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
