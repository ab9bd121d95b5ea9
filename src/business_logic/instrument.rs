use chrono::{DateTime, Utc};

use crate::business_logic::candle_window::CandleWindow;
use crate::business_logic::config::DetectionConfig;
use crate::business_logic::double_pattern::PatternDetector;
use crate::business_logic::pivot::PivotTracker;
use crate::business_logic::trend::TrendDetector;
use crate::errors::CoreError;
use crate::models::candle::Candle;
use crate::models::signal::{IndicatorSnapshot, PatternPoints, Signal, SignalKind};

/// What a refresh did to the cached window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Batch merged, pivots reconciled, snapshot recomputed
    Updated { offset: isize },
    /// Continuity check failed; window and pivots were discarded and the
    /// instrument needs a full reinitialization
    Invalidated,
}

/// Result of running both detectors once. Each side fails independently.
#[derive(Debug)]
pub struct CycleReport {
    pub pattern: Result<Option<Signal>, CoreError>,
    pub trend: Result<Option<Signal>, CoreError>,
}

impl CycleReport {
    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        [&self.pattern, &self.trend]
            .into_iter()
            .filter_map(|result| result.as_ref().ok().and_then(Option::as_ref))
    }
}

/// Everything the core keeps for one instrument: window, A pivots, latest snapshot
#[derive(Debug, Clone)]
pub struct InstrumentState {
    symbol: String,
    config: DetectionConfig,
    window: CandleWindow,
    pivots: PivotTracker,
    snapshot: IndicatorSnapshot,
    last_update: Option<DateTime<Utc>>,
}

impl InstrumentState {
    pub fn new(symbol: impl Into<String>, config: &DetectionConfig) -> Self {
        Self {
            symbol: symbol.into(),
            config: config.clone(),
            window: CandleWindow::new(config.window_capacity),
            pivots: PivotTracker::new(config.pivot_band_near, config.pivot_band_far),
            snapshot: IndicatorSnapshot::default(),
            last_update: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn window(&self) -> &CandleWindow {
        &self.window
    }

    pub fn pivots(&self) -> &PivotTracker {
        &self.pivots
    }

    pub fn snapshot(&self) -> &IndicatorSnapshot {
        &self.snapshot
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn is_initialized(&self) -> bool {
        self.window.is_full()
    }

    /// Build the window from a full fetch. A short response leaves the state untouched.
    pub fn initialize(&mut self, candles: &[Candle], now: DateTime<Utc>) -> Result<(), CoreError> {
        let mut window = CandleWindow::new(self.config.window_capacity);
        window.replace(candles);
        if !window.is_full() {
            return Err(CoreError::ShortHistory {
                expected: self.config.window_capacity,
                got: window.len(),
            });
        }

        self.window = window;
        self.pivots.initialize(self.window.candles());
        self.snapshot = IndicatorSnapshot::compute(self.window.candles(), &self.config);
        self.last_update = Some(now);

        tracing::info!(
            "[{}] initialized with {} candles (A_top: {:?}, A_bottom: {:?})",
            self.symbol,
            self.window.len(),
            self.pivots.top().map(|p| p.price),
            self.pivots.bottom().map(|p| p.price)
        );
        Ok(())
    }

    /// Merge a batch of recent candles. An empty batch leaves the state untouched.
    pub fn refresh(&mut self, batch: &[Candle], now: DateTime<Utc>) -> Result<RefreshOutcome, CoreError> {
        if batch.is_empty() {
            return Err(CoreError::EmptyBatch);
        }

        let offset = self.window.merge(batch);
        let valid = self.window.is_full()
            && self.window.validate(
                self.config.candle_spacing_ms,
                self.config.spacing_tolerance_ms,
                self.config.min_valid_spacing_ratio,
            );
        if !valid {
            tracing::warn!(
                "[{}] candle cache failed continuity check ({} candles), reinitializing",
                self.symbol,
                self.window.len()
            );
            self.reset();
            return Ok(RefreshOutcome::Invalidated);
        }

        self.pivots.reconcile(self.window.candles(), offset);
        self.snapshot = IndicatorSnapshot::compute(self.window.candles(), &self.config);
        self.last_update = Some(now);

        tracing::debug!(
            "[{}] refreshed (offset {}): {:?}",
            self.symbol,
            offset,
            self.snapshot
        );
        Ok(RefreshOutcome::Updated { offset })
    }

    /// Discard window, pivots and snapshot
    pub fn reset(&mut self) {
        if !self.window.is_empty() {
            tracing::debug!("[{}] discarding {} cached candles", self.symbol, self.window.len());
        }
        self.window.clear();
        self.pivots.invalidate();
        self.snapshot = IndicatorSnapshot::default();
    }

    /// Run the pattern and trend detectors against the current state
    pub fn evaluate(&self, now: DateTime<Utc>) -> CycleReport {
        let candles = self.window.candles();

        let pattern = PatternDetector::new(&self.config)
            .evaluate(candles, self.pivots.top(), self.pivots.bottom(), &self.snapshot)
            .map(|found| found.map(|p| self.signal(p.kind, Some(p.points), now)));

        let trend = TrendDetector::new(&self.config)
            .evaluate(&self.window.closes(), self.snapshot.atr)
            .map(|found| found.map(|kind| self.signal(kind, None, now)));

        CycleReport { pattern, trend }
    }

    fn signal(&self, kind: SignalKind, pattern: Option<PatternPoints>, now: DateTime<Utc>) -> Signal {
        let latest = self.window.latest();
        Signal {
            symbol: self.symbol.clone(),
            kind,
            price: latest.map(|c| c.close).unwrap_or_default(),
            candle_time: latest.map(|c| c.timestamp).unwrap_or_default(),
            detected_at: now,
            indicators: self.snapshot,
            pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HOUR_MS: i64 = 3_600_000;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap()
    }

    fn make_candle(i: usize, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: i as i64 * HOUR_MS,
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    fn hourly(start: usize, count: usize) -> Vec<Candle> {
        (start..start + count)
            .map(|i| make_candle(i, 101.0, 99.0, 100.0))
            .collect()
    }

    #[test]
    fn test_initialize_requires_full_history() {
        let mut state = InstrumentState::new("BTCUSDT", &DetectionConfig::default());
        let err = state.initialize(&hourly(0, 150), now()).unwrap_err();
        assert_eq!(
            err,
            CoreError::ShortHistory {
                expected: 200,
                got: 150
            }
        );
        assert!(state.window().is_empty());
        assert!(!state.is_initialized());
    }

    #[test]
    fn test_initialize_locates_pivots_and_snapshot() {
        let mut state = InstrumentState::new("BTCUSDT", &DetectionConfig::default());
        state.initialize(&hourly(0, 200), now()).unwrap();

        assert!(state.is_initialized());
        assert_eq!(state.pivots().top().unwrap().index, 166);
        assert!(state.snapshot().ema144.is_some());
        assert!(state.snapshot().atr.is_some());
        assert_eq!(state.last_update(), Some(now()));
    }

    #[test]
    fn test_empty_batch_leaves_state_untouched() {
        let mut state = InstrumentState::new("BTCUSDT", &DetectionConfig::default());
        state.initialize(&hourly(0, 200), now()).unwrap();
        let before = state.window().candles().to_vec();

        assert_eq!(state.refresh(&[], now()), Err(CoreError::EmptyBatch));
        assert_eq!(state.window().candles(), before.as_slice());
    }

    #[test]
    fn test_refresh_rolls_window_and_pivots() {
        let mut state = InstrumentState::new("BTCUSDT", &DetectionConfig::default());
        state.initialize(&hourly(0, 200), now()).unwrap();
        let a_time = state.pivots().top().unwrap().timestamp;

        let outcome = state.refresh(&hourly(198, 5), now()).unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated { offset: -3 });
        assert_eq!(state.window().len(), 200);

        let top = state.pivots().top().unwrap();
        assert_eq!(top.index, 163);
        assert_eq!(top.timestamp, a_time);
    }

    #[test]
    fn test_gap_in_refresh_invalidates_cache() {
        let mut state = InstrumentState::new("BTCUSDT", &DetectionConfig::default());
        state.initialize(&hourly(0, 200), now()).unwrap();

        // a batch far in the future, offset by half an hour, breaks continuity
        let batch: Vec<Candle> = (0..30)
            .map(|i| {
                let mut c = make_candle(400 + i, 101.0, 99.0, 100.0);
                c.timestamp += HOUR_MS / 2 * (i as i64 % 2);
                c
            })
            .collect();
        assert_eq!(state.refresh(&batch, now()).unwrap(), RefreshOutcome::Invalidated);
        assert!(state.window().is_empty());
        assert!(state.pivots().top().is_none());
        assert!(!state.is_initialized());
    }

    #[test]
    fn test_evaluate_emits_double_top_signal() {
        let mut candles: Vec<Candle> = (0..200).map(|i| make_candle(i, 105.0, 103.0, 104.0)).collect();
        // A in the band [166, 187], trough after it, B at 198 matching A
        candles[170].high = 110.0;
        candles[180].low = 100.0;
        candles[198].high = 109.5;

        let mut state = InstrumentState::new("ETHUSDT", &DetectionConfig::default());
        state.initialize(&candles, now()).unwrap();
        // pin the snapshot: stack not bullish, ATR of 2
        state.snapshot.ema21 = Some(100.0);
        state.snapshot.ema55 = Some(101.0);
        state.snapshot.ema144 = Some(102.0);
        state.snapshot.atr = Some(2.0);

        let report = state.evaluate(now());
        let signal = report.pattern.unwrap().expect("double top");
        assert_eq!(signal.kind, SignalKind::DoubleTop);
        assert_eq!(signal.symbol, "ETHUSDT");
        assert_eq!(signal.price, 104.0);
        assert_eq!(signal.candle_time, 199 * HOUR_MS);
        let points = signal.pattern.unwrap();
        assert_eq!((points.a.index, points.b.index, points.c.index), (170, 198, 180));
    }

    #[test]
    fn test_steady_climb_emits_nothing() {
        // bullish stack both now and one candle ago; trough too shallow for a double top
        let candles: Vec<Candle> = (0..200)
            .map(|i| {
                let close = 100.0 + i as f64 * 0.1;
                make_candle(i, close + 1.0, close - 1.0, close)
            })
            .collect();
        let mut state = InstrumentState::new("BTCUSDT", &DetectionConfig::default());
        state.initialize(&candles, now()).unwrap();

        let report = state.evaluate(now());
        assert!(report.pattern.as_ref().unwrap().is_none());
        assert!(report.trend.as_ref().unwrap().is_none());
        assert_eq!(report.signals().count(), 0);
    }

    #[test]
    fn test_failed_detector_does_not_hide_the_other_signal() {
        let trend = Signal {
            symbol: "BTCUSDT".to_string(),
            kind: SignalKind::UptrendOnset,
            price: 101.0,
            candle_time: 199 * HOUR_MS,
            detected_at: now(),
            indicators: IndicatorSnapshot::default(),
            pattern: None,
        };
        let report = CycleReport {
            pattern: Err(CoreError::Malformed("A pivot index 250 outside window of 200".to_string())),
            trend: Ok(Some(trend.clone())),
        };

        let signals: Vec<&Signal> = report.signals().collect();
        assert_eq!(signals, vec![&trend]);

        let report = CycleReport {
            pattern: Ok(None),
            trend: Err(CoreError::Malformed("non-finite close in window".to_string())),
        };
        assert_eq!(report.signals().count(), 0);
    }
}
