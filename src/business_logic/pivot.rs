use crate::models::candle::Candle;
use crate::models::signal::{PivotKind, PivotPoint};

/// Validity of a persisted A pivot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PivotState {
    Valid(PivotPoint),
    /// Must be recomputed before any detector reads it
    Stale,
}

impl PivotState {
    pub fn point(&self) -> Option<&PivotPoint> {
        match self {
            PivotState::Valid(point) => Some(point),
            PivotState::Stale => None,
        }
    }
}

/// Locates and maintains the A_top / A_bottom pivots across window rollovers
#[derive(Debug, Clone)]
pub struct PivotTracker {
    band_near: usize,
    band_far: usize,
    top: PivotState,
    bottom: PivotState,
}

impl PivotTracker {
    /// Band spans `[len - band_far, len - band_near]`, inclusive
    pub fn new(band_near: usize, band_far: usize) -> Self {
        Self {
            band_near,
            band_far,
            top: PivotState::Stale,
            bottom: PivotState::Stale,
        }
    }

    pub fn top(&self) -> Option<&PivotPoint> {
        self.top.point()
    }

    pub fn bottom(&self) -> Option<&PivotPoint> {
        self.bottom.point()
    }

    pub fn invalidate(&mut self) {
        self.top = PivotState::Stale;
        self.bottom = PivotState::Stale;
    }

    /// Full recompute of both pivots against `candles`
    pub fn initialize(&mut self, candles: &[Candle]) {
        self.top = self.locate(candles, PivotKind::Top);
        self.bottom = self.locate(candles, PivotKind::Bottom);
    }

    /// Shift both pivots by `offset` after a merge. A pivot that leaves
    /// `[0, len)` or no longer lines up with its candle turns stale and is
    /// recomputed against the new window before returning.
    pub fn reconcile(&mut self, candles: &[Candle], offset: isize) {
        self.top = shift(self.top, candles, offset);
        self.bottom = shift(self.bottom, candles, offset);

        if self.top == PivotState::Stale {
            self.top = self.locate(candles, PivotKind::Top);
            tracing::debug!("A_top recomputed: {:?}", self.top);
        }
        if self.bottom == PivotState::Stale {
            self.bottom = self.locate(candles, PivotKind::Bottom);
            tracing::debug!("A_bottom recomputed: {:?}", self.bottom);
        }
    }

    /// Extremum in the lookback band, first index winning ties.
    /// Stale while the window is shorter than `band_far`.
    fn locate(&self, candles: &[Candle], kind: PivotKind) -> PivotState {
        let len = candles.len();
        if len < self.band_far || self.band_near > self.band_far {
            return PivotState::Stale;
        }

        let start = len - self.band_far;
        let end = (len - self.band_near).min(len - 1);
        match extremum(candles, start, end, kind) {
            Some(point) => PivotState::Valid(point),
            None => PivotState::Stale,
        }
    }
}

fn shift(state: PivotState, candles: &[Candle], offset: isize) -> PivotState {
    let PivotState::Valid(point) = state else {
        return PivotState::Stale;
    };

    let shifted = point.index as isize + offset;
    if shifted < 0 || shifted as usize >= candles.len() {
        return PivotState::Stale;
    }

    let index = shifted as usize;
    if candles[index].timestamp != point.timestamp {
        return PivotState::Stale;
    }

    PivotState::Valid(PivotPoint { index, ..point })
}

/// Highest high (top) or lowest low (bottom) in `candles[start..=end]`,
/// first occurrence winning ties
pub fn extremum(candles: &[Candle], start: usize, end: usize, kind: PivotKind) -> Option<PivotPoint> {
    if start > end || end >= candles.len() {
        return None;
    }

    let price_of = |c: &Candle| match kind {
        PivotKind::Top => c.high,
        PivotKind::Bottom => c.low,
    };
    let better = |candidate: f64, best: f64| match kind {
        PivotKind::Top => candidate > best,
        PivotKind::Bottom => candidate < best,
    };

    let mut best = start;
    for i in start + 1..=end {
        if better(price_of(&candles[i]), price_of(&candles[best])) {
            best = i;
        }
    }

    Some(PivotPoint {
        price: price_of(&candles[best]),
        index: best,
        timestamp: candles[best].timestamp,
        kind,
    })
}
