use std::collections::BTreeMap;

use crate::models::candle::Candle;

/// Bounded, time-ordered, duplicate-free candle store for one instrument
#[derive(Debug, Clone)]
pub struct CandleWindow {
    capacity: usize,
    candles: Vec<Candle>,
}

impl CandleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            candles: Vec::with_capacity(capacity),
        }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.candles.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Newest candle, possibly still forming
    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn clear(&mut self) {
        self.candles.clear();
    }

    /// Replace the whole window (initial fetch or reinitialization)
    pub fn replace(&mut self, candles: &[Candle]) {
        self.candles.clear();
        self.merge(candles);
    }

    /// Union `batch` into the window by timestamp, newer data winning, then keep
    /// only the most recent `capacity` candles.
    ///
    /// Returns the shift of the surviving candles, so that a candle at old index
    /// `i` now sits at `i + offset`: `0` when the old front survived in place,
    /// `-n` when the `n` oldest candles fell off the front. Batch candles older
    /// than the window that get evicted straight away do not move anything.
    pub fn merge(&mut self, batch: &[Candle]) -> isize {
        let old_times: Vec<i64> = self.candles.iter().map(|c| c.timestamp).collect();
        let mut by_time: BTreeMap<i64, Candle> =
            self.candles.iter().map(|c| (c.timestamp, *c)).collect();

        for candle in batch {
            if !candle.is_finite() {
                tracing::warn!("Dropping non-finite candle at {}", candle.timestamp);
                continue;
            }
            by_time.insert(candle.timestamp, *candle);
        }

        let evicted = by_time.len().saturating_sub(self.capacity);
        self.candles = by_time.into_values().skip(evicted).collect();

        let Some(front) = self.candles.first().map(|c| c.timestamp) else {
            return 0;
        };
        // first old candle still in the window, and where it landed
        match old_times.iter().position(|&t| t >= front) {
            Some(old_index) => {
                let new_index = self
                    .candles
                    .partition_point(|c| c.timestamp < old_times[old_index]);
                new_index as isize - old_index as isize
            }
            None => -(old_times.len() as isize),
        }
    }

    /// Continuity check: the share of consecutive spacings within
    /// `tolerance_ms` of `spacing_ms` must reach `min_valid_ratio`.
    /// Fewer than two candles cannot be verified and count as invalid.
    pub fn validate(&self, spacing_ms: i64, tolerance_ms: i64, min_valid_ratio: f64) -> bool {
        if self.candles.len() < 2 {
            return false;
        }

        let deltas = self.candles.len() - 1;
        let valid = self
            .candles
            .windows(2)
            .filter(|pair| {
                let delta = pair[1].timestamp - pair[0].timestamp;
                (delta - spacing_ms).abs() <= tolerance_ms
            })
            .count();

        valid as f64 / deltas as f64 >= min_valid_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HOUR_MS: i64 = 3_600_000;
    const TOLERANCE_MS: i64 = 600_000;

    fn make_candle(timestamp: i64, close: f64) -> Candle {
        Candle {
            timestamp,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    fn hourly(start: usize, count: usize) -> Vec<Candle> {
        (start..start + count)
            .map(|i| make_candle(i as i64 * HOUR_MS, 100.0 + i as f64))
            .collect()
    }

    fn assert_well_formed(window: &CandleWindow) {
        assert!(window.len() <= window.capacity());
        assert!(window
            .candles()
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp));
    }

    #[test]
    fn test_merge_into_empty_window_keeps_everything() {
        let mut window = CandleWindow::new(200);
        let offset = window.merge(&hourly(0, 50));
        assert_eq!(offset, 0);
        assert_eq!(window.len(), 50);
        assert_well_formed(&window);
    }

    #[test]
    fn test_merge_overwrites_existing_timestamp() {
        let mut window = CandleWindow::new(200);
        window.replace(&hourly(0, 10));

        let mut revised = make_candle(9 * HOUR_MS, 500.0);
        revised.volume = 99.0;
        let offset = window.merge(&[revised]);

        assert_eq!(offset, 0);
        assert_eq!(window.len(), 10);
        assert_eq!(window.latest().unwrap().close, 500.0);
        assert_eq!(window.latest().unwrap().volume, 99.0);
    }

    #[test]
    fn test_merge_full_window_evicts_oldest() {
        let mut window = CandleWindow::new(200);
        window.replace(&hourly(0, 200));

        // batch re-fetches three known candles and adds two new ones
        let offset = window.merge(&hourly(197, 5));

        assert_eq!(offset, -2);
        assert_eq!(window.len(), 200);
        assert_eq!(window.candles()[0].timestamp, 2 * HOUR_MS);
        assert_eq!(window.latest().unwrap().timestamp, 201 * HOUR_MS);
        assert_well_formed(&window);
    }

    #[test]
    fn test_merge_sorts_and_dedupes_untrusted_batch() {
        let mut window = CandleWindow::new(20);
        window.replace(&hourly(0, 10));

        let mut batch = hourly(8, 5);
        batch.reverse();
        batch.push(make_candle(11 * HOUR_MS, 1.0));
        window.merge(&batch);

        assert_eq!(window.len(), 13);
        assert_well_formed(&window);
        // last write for a timestamp wins
        assert_eq!(window.candles()[11].close, 1.0);
    }

    #[test]
    fn test_merge_drops_non_finite_candles() {
        let mut window = CandleWindow::new(20);
        window.replace(&hourly(0, 5));
        let mut bad = make_candle(5 * HOUR_MS, 1.0);
        bad.close = f64::INFINITY;

        window.merge(&[bad]);
        assert_eq!(window.len(), 5);
    }

    #[test]
    fn test_replace_trims_to_capacity() {
        let mut window = CandleWindow::new(200);
        window.replace(&hourly(0, 260));
        assert_eq!(window.len(), 200);
        assert!(window.is_full());
        assert_eq!(window.candles()[0].timestamp, 60 * HOUR_MS);
    }

    #[test]
    fn test_validate_accepts_regular_spacing() {
        let mut window = CandleWindow::new(200);
        window.replace(&hourly(0, 200));
        assert!(window.validate(HOUR_MS, TOLERANCE_MS, 0.9));
    }

    #[test]
    fn test_validate_rejects_when_three_of_twenty_gaps_are_off() {
        let mut timestamps = vec![0i64];
        for i in 0..20 {
            let step = if i < 3 { HOUR_MS + 15 * 60_000 } else { HOUR_MS };
            timestamps.push(timestamps.last().unwrap() + step);
        }
        let candles: Vec<Candle> = timestamps.iter().map(|&t| make_candle(t, 1.0)).collect();

        let mut window = CandleWindow::new(200);
        window.replace(&candles);
        assert_eq!(window.len(), 21);
        // 17 / 20 = 85%
        assert!(!window.validate(HOUR_MS, TOLERANCE_MS, 0.9));
    }

    #[test]
    fn test_validate_accepts_exactly_ninety_percent() {
        let mut timestamps = vec![0i64];
        for i in 0..20 {
            let step = if i < 2 { 2 * HOUR_MS } else { HOUR_MS };
            timestamps.push(timestamps.last().unwrap() + step);
        }
        let candles: Vec<Candle> = timestamps.iter().map(|&t| make_candle(t, 1.0)).collect();

        let mut window = CandleWindow::new(200);
        window.replace(&candles);
        assert!(window.validate(HOUR_MS, TOLERANCE_MS, 0.9));
    }

    #[test]
    fn test_validate_tolerance_edge_is_inclusive() {
        let candles = vec![make_candle(0, 1.0), make_candle(HOUR_MS + TOLERANCE_MS, 1.0)];
        let mut window = CandleWindow::new(200);
        window.replace(&candles);
        assert!(window.validate(HOUR_MS, TOLERANCE_MS, 0.9));
    }

    #[test]
    fn test_validate_rejects_tiny_window() {
        let mut window = CandleWindow::new(200);
        assert!(!window.validate(HOUR_MS, TOLERANCE_MS, 0.9));
        window.replace(&hourly(0, 1));
        assert!(!window.validate(HOUR_MS, TOLERANCE_MS, 0.9));
    }

    #[test]
    fn test_merge_ignores_candle_older_than_full_window() {
        let mut window = CandleWindow::new(200);
        window.replace(&hourly(10, 200));
        let before = window.candles().to_vec();

        // a stale candle from before the window plus a re-fetch of the newest one
        let batch = [make_candle(0, 1.0), before[199]];
        let offset = window.merge(&batch);

        assert_eq!(offset, 0);
        assert_eq!(window.candles(), before.as_slice());
    }

    #[test]
    fn test_merge_stale_candle_into_partial_window_shifts_forward() {
        let mut window = CandleWindow::new(200);
        window.replace(&hourly(10, 50));

        let offset = window.merge(&[make_candle(HOUR_MS, 1.0)]);

        assert_eq!(offset, 1);
        assert_eq!(window.len(), 51);
        assert_eq!(window.candles()[1].timestamp, 10 * HOUR_MS);
    }

    #[test]
    fn test_merge_past_entire_window_reports_full_eviction() {
        let mut window = CandleWindow::new(5);
        window.replace(&hourly(0, 5));

        let offset = window.merge(&hourly(100, 5));

        assert_eq!(offset, -5);
        assert_eq!(window.candles()[0].timestamp, 100 * HOUR_MS);
    }

    /// (hour, close) pairs in arbitrary order, with repeats and hours before the window
    fn arb_batch() -> impl Strategy<Value = Vec<(i64, f64)>> {
        prop::collection::vec((0i64..400, 1.0..1000.0_f64), 0..40)
    }

    proptest! {
        #[test]
        fn test_merge_preserves_window_invariants(initial in 0usize..260, raw in arb_batch()) {
            let mut window = CandleWindow::new(200);
            window.replace(&hourly(50, initial));
            let before = window.candles().to_vec();

            let batch: Vec<Candle> = raw
                .iter()
                .map(|&(hour, close)| make_candle(hour * HOUR_MS, close))
                .collect();
            let offset = window.merge(&batch);

            prop_assert!(window.len() <= window.capacity());
            prop_assert!(window
                .candles()
                .windows(2)
                .all(|pair| pair[0].timestamp < pair[1].timestamp));

            // last write for a timestamp wins
            for candle in window.candles() {
                if let Some(latest) = batch.iter().rev().find(|c| c.timestamp == candle.timestamp) {
                    prop_assert_eq!(candle.close, latest.close);
                }
            }

            // every surviving old candle moved by exactly `offset`
            for (old_index, old) in before.iter().enumerate() {
                if let Some(new_index) = window
                    .candles()
                    .iter()
                    .position(|c| c.timestamp == old.timestamp)
                {
                    prop_assert_eq!(new_index as isize, old_index as isize + offset);
                }
            }
        }
    }
}
