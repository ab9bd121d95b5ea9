use crate::business_logic::config::{DetectionConfig, MonitorConfig};
use crate::business_logic::indicators::EmaStack;
use crate::business_logic::instrument::{InstrumentState, RefreshOutcome};
use crate::models::signal::Signal;
use crate::models::status::InstrumentStatus;
use crate::services::binance::CandleSource;
use crate::services::signal_journal::SignalJournal;
use crate::services::signal_state::SharedSignalState;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use tokio::time::Duration;

const HOUR_MS: i64 = 3_600_000;

/// Hourly scanner: keeps one `InstrumentState` per symbol and runs both
/// detectors after every refresh
pub struct MonitorService<S: CandleSource> {
    source: S,
    symbols: Vec<String>,
    instruments: HashMap<String, InstrumentState>,
    config: DetectionConfig,
    request_interval: Duration,
    cycle_offset_secs: i64,
    data_dir: PathBuf,
    journal: SignalJournal,
    shared_state: SharedSignalState,
}

impl<S: CandleSource> MonitorService<S> {
    pub fn new(
        source: S,
        settings: &MonitorConfig,
        config: DetectionConfig,
        shared_state: SharedSignalState,
    ) -> Self {
        let instruments = settings
            .symbols
            .iter()
            .map(|symbol| (symbol.clone(), InstrumentState::new(symbol.clone(), &config)))
            .collect();

        Self {
            source,
            symbols: settings.symbols.clone(),
            instruments,
            config,
            request_interval: settings.request_interval,
            cycle_offset_secs: settings.cycle_offset_secs,
            data_dir: PathBuf::from(&settings.data_dir),
            journal: SignalJournal::new(Utc::now().date_naive()),
            shared_state,
        }
    }

    /// Fill every instrument's window before the first cycle
    pub async fn warmup(&mut self) {
        let symbols = self.symbols.clone();

        for symbol in symbols {
            tracing::info!("Initializing {}", symbol);
            if let Err(e) = self.initialize_symbol(&symbol).await {
                tracing::error!("Failed to initialize {}: {:#}", symbol, e);
            }
            tokio::time::sleep(self.request_interval).await;
        }

        self.publish_state().await;
    }

    /// Warm up and scan until `shutdown` resolves, then flush the journal so
    /// signals from an interrupted cycle are not lost
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::select! {
            biased;
            _ = shutdown => {}
            _ = async {
                self.warmup().await;
                self.run().await;
            } => {}
        }

        tracing::info!("Monitor stopping, saving signal journal");
        self.flush_journal().await;
    }

    /// Start the monitoring loop
    pub async fn run(&mut self) {
        loop {
            let signals = self.run_cycle().await;

            let delay = next_cycle_delay(Utc::now(), self.cycle_offset_secs);
            tracing::info!(
                "Cycle finished with {} signal(s), next scan in {:.1}s",
                signals.len(),
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One pass over every symbol in configured order
    pub async fn run_cycle(&mut self) -> Vec<Signal> {
        self.journal.roll_to(Utc::now().date_naive());

        let symbols = self.symbols.clone();
        let mut emitted = Vec::new();

        for symbol in symbols {
            tracing::info!("Checking {}", symbol);
            match self.process_symbol(&symbol).await {
                Ok(signals) => {
                    for signal in signals {
                        self.handle_signal(signal.clone());
                        emitted.push(signal);
                    }
                }
                Err(e) => tracing::error!("Error processing {}: {:#}", symbol, e),
            }
            tokio::time::sleep(self.request_interval).await;
        }

        self.flush_journal().await;
        self.publish_state().await;

        emitted
    }

    async fn flush_journal(&self) {
        if let Err(e) = self.journal.persist(&self.data_dir, Utc::now()).await {
            tracing::error!("Failed to persist signal journal: {:#}", e);
        }
    }

    async fn initialize_symbol(&mut self, symbol: &str) -> anyhow::Result<()> {
        let candles = self
            .source
            .fetch_recent(symbol, self.config.window_capacity)
            .await?;

        let Some(state) = self.instruments.get_mut(symbol) else {
            anyhow::bail!("{symbol} is not a monitored instrument");
        };
        state.initialize(&candles, Utc::now())?;
        Ok(())
    }

    async fn process_symbol(&mut self, symbol: &str) -> anyhow::Result<Vec<Signal>> {
        let initialized = self
            .instruments
            .get(symbol)
            .is_some_and(InstrumentState::is_initialized);

        if initialized {
            let batch = self
                .source
                .fetch_recent(symbol, self.config.refresh_batch)
                .await?;

            let Some(state) = self.instruments.get_mut(symbol) else {
                anyhow::bail!("{symbol} is not a monitored instrument");
            };
            if state.refresh(&batch, Utc::now())? == RefreshOutcome::Invalidated {
                self.initialize_symbol(symbol).await?;
            }
        } else {
            self.initialize_symbol(symbol).await?;
        }

        let Some(state) = self.instruments.get(symbol) else {
            anyhow::bail!("{symbol} is not a monitored instrument");
        };
        let report = state.evaluate(Utc::now());

        if let Err(e) = &report.pattern {
            tracing::error!("[{}] pattern detector failed: {}", symbol, e);
        }
        if let Err(e) = &report.trend {
            tracing::error!("[{}] trend detector failed: {}", symbol, e);
        }

        Ok(report.signals().cloned().collect())
    }

    fn handle_signal(&mut self, signal: Signal) {
        tracing::warn!(
            "SIGNAL: {} on {} at ${} (candle {})",
            signal.kind.label(),
            signal.symbol,
            format_price(signal.price),
            signal.candle_time
        );

        self.journal.record(signal.clone());
        // no subscribers is fine
        let _ = self.shared_state.broadcaster.send(signal);
    }

    async fn publish_state(&self) {
        let mut statuses: Vec<InstrumentStatus> = self
            .instruments
            .values()
            .map(|state| InstrumentStatus {
                symbol: state.symbol().to_string(),
                candles: state.window().len(),
                is_initialized: state.is_initialized(),
                a_top: state.pivots().top().copied(),
                a_bottom: state.pivots().bottom().copied(),
                indicators: *state.snapshot(),
                last_update: state.last_update(),
                summary: build_summary(state, self.journal.signals_for(state.symbol()).len()),
            })
            .collect();

        // Sort by symbol for consistent ordering
        statuses.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        *self.shared_state.instruments.write().await = statuses;
        *self.shared_state.signals.write().await = self.journal.all();
    }
}

/// Time until `offset_secs` past the next hour, or past the current hour
/// when that moment is still ahead
pub fn next_cycle_delay(now: DateTime<Utc>, offset_secs: i64) -> Duration {
    let now_ms = now.timestamp_millis();
    let hour_start = now_ms - now_ms.rem_euclid(HOUR_MS);

    let mut target = hour_start + offset_secs.clamp(0, 3_599) * 1_000;
    if target <= now_ms {
        target += HOUR_MS;
    }

    Duration::from_millis((target - now_ms) as u64)
}

fn build_summary(state: &InstrumentState, signals_today: usize) -> String {
    let symbol = state.symbol();
    if !state.is_initialized() {
        return format!(
            "{symbol}: collecting {} candles before detection.",
            state.window().capacity()
        );
    }

    let pivots = match (state.pivots().top(), state.pivots().bottom()) {
        (Some(top), Some(bottom)) => format!(
            "A_top ${}, A_bottom ${}",
            format_price(top.price),
            format_price(bottom.price)
        ),
        (Some(top), None) => format!("A_top ${}", format_price(top.price)),
        (None, Some(bottom)) => format!("A_bottom ${}", format_price(bottom.price)),
        (None, None) => "no A pivots".to_string(),
    };

    let trend = match EmaStack::from_snapshot(state.snapshot()) {
        Some(stack) if stack.is_bullish() => "EMA stack bullish",
        Some(stack) if stack.is_bearish() => "EMA stack bearish",
        Some(_) => "EMA stack mixed",
        None => "EMA stack incomplete",
    };

    match signals_today {
        0 => format!("{symbol}: {pivots}; {trend}."),
        n => format!("{symbol}: {pivots}; {trend}; {n} signal(s) today."),
    }
}

fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{:.2}", price)
    } else {
        format!("{:.6}", price)
    }
}
