use crate::business_logic::config::DetectionConfig;
use crate::business_logic::indicators::EmaStack;
use crate::business_logic::pivot::extremum;
use crate::errors::CoreError;
use crate::models::candle::Candle;
use crate::models::signal::{IndicatorSnapshot, PatternPoints, PivotKind, PivotPoint, SignalKind};

/// A confirmed double top or double bottom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoublePattern {
    pub kind: SignalKind,
    pub points: PatternPoints,
}

/// Double top / double bottom detector.
///
/// A is the persisted pivot, B the last fully closed candle (second to last
/// in the window, the final one may still be forming) and C the opposite
/// extremum strictly between them. Thresholds scale with ATR.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    min_candles: usize,
    peak_tolerance_atr: f64,
    min_depth_atr: f64,
}

impl PatternDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            min_candles: config.window_capacity,
            peak_tolerance_atr: config.peak_tolerance_atr,
            min_depth_atr: config.min_depth_atr,
        }
    }

    /// Double top is checked first and wins; double bottom is only looked at
    /// when the top side did not end the cycle.
    pub fn evaluate(
        &self,
        candles: &[Candle],
        a_top: Option<&PivotPoint>,
        a_bottom: Option<&PivotPoint>,
        snapshot: &IndicatorSnapshot,
    ) -> Result<Option<DoublePattern>, CoreError> {
        if candles.len() < self.min_candles || candles.len() < 2 {
            return Ok(None);
        }
        let (Some(a_top), Some(a_bottom)) = (a_top, a_bottom) else {
            return Ok(None);
        };
        let Some(stack) = EmaStack::from_snapshot(snapshot) else {
            return Ok(None);
        };
        let atr = match snapshot.atr {
            Some(atr) if atr > 0.0 => atr,
            _ => return Ok(None),
        };

        let b_index = candles.len() - 2;
        for pivot in [a_top, a_bottom] {
            if pivot.index >= candles.len() {
                return Err(CoreError::Malformed(format!(
                    "A pivot index {} outside window of {}",
                    pivot.index,
                    candles.len()
                )));
            }
        }
        let b = &candles[b_index];
        if !b.is_finite() {
            return Err(CoreError::Malformed(format!(
                "closed candle at {} has non-finite prices",
                b.timestamp
            )));
        }

        // Double top
        if (a_top.price - b.high).abs() <= self.peak_tolerance_atr * atr {
            if a_top.index >= b_index {
                return Ok(None);
            }

            if let Some(c) = extremum(candles, a_top.index + 1, b_index - 1, PivotKind::Bottom) {
                let depth = self.min_depth_atr * atr;
                let deep_enough = a_top.price - c.price >= depth && b.high - c.price >= depth;
                if deep_enough && !stack.is_bullish() {
                    let b_point = closed_pivot(b, b_index, PivotKind::Top);
                    return Ok(Some(DoublePattern {
                        kind: SignalKind::DoubleTop,
                        points: PatternPoints {
                            a: *a_top,
                            b: b_point,
                            c,
                        },
                    }));
                }
            }
        }

        // Double bottom
        if (a_bottom.price - b.low).abs() <= self.peak_tolerance_atr * atr {
            if a_bottom.index >= b_index {
                return Ok(None);
            }

            if let Some(c) = extremum(candles, a_bottom.index + 1, b_index - 1, PivotKind::Top) {
                let depth = self.min_depth_atr * atr;
                let deep_enough = c.price - a_bottom.price >= depth && c.price - b.low >= depth;
                if deep_enough && !stack.is_bearish() {
                    let b_point = closed_pivot(b, b_index, PivotKind::Bottom);
                    return Ok(Some(DoublePattern {
                        kind: SignalKind::DoubleBottom,
                        points: PatternPoints {
                            a: *a_bottom,
                            b: b_point,
                            c,
                        },
                    }));
                }
            }
        }

        Ok(None)
    }
}

fn closed_pivot(candle: &Candle, index: usize, kind: PivotKind) -> PivotPoint {
    PivotPoint {
        price: match kind {
            PivotKind::Top => candle.high,
            PivotKind::Bottom => candle.low,
        },
        index,
        timestamp: candle.timestamp,
        kind,
    }
}
