use std::iter::FusedIterator;

use crate::business_logic::config::DetectionConfig;
use crate::models::candle::Candle;
use crate::models::signal::IndicatorSnapshot;

/// Final EMA value of `series`.
///
/// Seeded with the simple average of the first `period` values, then
/// `ema = value * k + ema * (1 - k)` with `k = 2 / (period + 1)`.
/// Returns `None` when the series is shorter than `period`.
pub fn ema(series: &[f64], period: usize) -> Option<f64> {
    if period == 0 || series.len() < period {
        return None;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = series[..period].iter().sum::<f64>() / period as f64;
    let value = series[period..]
        .iter()
        .fold(seed, |prev, &value| value * k + prev * (1.0 - k));
    Some(value)
}

/// Full EMA series, one value per input from index `period - 1` onward.
/// Empty when the series is shorter than `period`.
pub fn ema_series(series: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || series.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut values = Vec::with_capacity(series.len() - period + 1);
    let mut prev = series[..period].iter().sum::<f64>() / period as f64;
    values.push(prev);
    for &value in &series[period..] {
        prev = value * k + prev * (1.0 - k);
        values.push(prev);
    }
    values
}

/// True range of `candle` against the previous close
fn true_range(candle: &Candle, prev_close: f64) -> f64 {
    let hl = candle.high - candle.low;
    let hpc = (candle.high - prev_close).abs();
    let lpc = (candle.low - prev_close).abs();
    hl.max(hpc).max(lpc)
}

/// Average True Range: simple mean of the latest `period` true ranges
/// (no Wilder smoothing). Falls back to every available true range when
/// fewer than `period` exist. `None` below two candles.
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < 2 {
        return None;
    }

    let ranges: Vec<f64> = candles
        .windows(2)
        .map(|pair| true_range(&pair[1], pair[0].close))
        .collect();
    let tail = &ranges[ranges.len().saturating_sub(period)..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    /// `line - signal`, aligned to the trailing range covered by `signal`
    pub histogram: Vec<f64>,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_series = ema_series(closes, fast);
    let slow_series = ema_series(closes, slow);
    let overlap = fast_series.len().min(slow_series.len());
    if overlap == 0 {
        return Macd::default();
    }

    let fast_tail = &fast_series[fast_series.len() - overlap..];
    let slow_tail = &slow_series[slow_series.len() - overlap..];
    let line: Vec<f64> = fast_tail
        .iter()
        .zip(slow_tail)
        .map(|(f, s)| f - s)
        .collect();

    let signal_series = ema_series(&line, signal);
    let offset = line.len() - signal_series.len();
    let histogram = signal_series
        .iter()
        .zip(&line[offset..])
        .map(|(s, m)| m - s)
        .collect();

    Macd {
        line,
        signal: signal_series,
        histogram,
    }
}

/// Lazy RSI over a close series.
///
/// Yields `closes.len() - period` values (nothing when there are not enough
/// closes), in input order. Consumed once; build a new one to start over.
#[derive(Debug, Clone)]
pub struct Rsi<'a> {
    closes: &'a [f64],
    period: usize,
    /// Index of the close whose delta feeds the next value
    cursor: usize,
    avg_gain: f64,
    avg_loss: f64,
}

pub fn rsi(closes: &[f64], period: usize) -> Rsi<'_> {
    Rsi {
        closes,
        period,
        cursor: 0,
        avg_gain: 0.0,
        avg_loss: 0.0,
    }
}

impl Rsi<'_> {
    fn delta(&self, i: usize) -> (f64, f64) {
        let change = self.closes[i] - self.closes[i - 1];
        if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        }
    }

    fn value(&self) -> f64 {
        if self.avg_loss == 0.0 {
            100.0
        } else {
            let rs = self.avg_gain / self.avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        }
    }
}

impl Iterator for Rsi<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.period == 0 || self.closes.len() <= self.period {
            return None;
        }

        if self.cursor == 0 {
            // Seed: simple mean of the first `period` gains/losses
            let (gains, losses) = (1..=self.period).fold((0.0, 0.0), |(g, l), i| {
                let (gain, loss) = self.delta(i);
                (g + gain, l + loss)
            });
            self.avg_gain = gains / self.period as f64;
            self.avg_loss = losses / self.period as f64;
            self.cursor = self.period + 1;
            return Some(self.value());
        }

        if self.cursor >= self.closes.len() {
            return None;
        }

        let (gain, loss) = self.delta(self.cursor);
        let p = self.period as f64;
        self.avg_gain = (self.avg_gain * (p - 1.0) + gain) / p;
        self.avg_loss = (self.avg_loss * (p - 1.0) + loss) / p;
        self.cursor += 1;
        Some(self.value())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.period == 0 || self.closes.len() <= self.period {
            0
        } else if self.cursor == 0 {
            self.closes.len() - self.period
        } else {
            self.closes.len() - self.cursor
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Rsi<'_> {}

impl FusedIterator for Rsi<'_> {}

/// EMA21 / EMA55 / EMA144 at one point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaStack {
    pub fast: f64,
    pub mid: f64,
    pub slow: f64,
}

impl EmaStack {
    pub fn compute(closes: &[f64], config: &DetectionConfig) -> Option<Self> {
        Some(Self {
            fast: ema(closes, config.ema_fast)?,
            mid: ema(closes, config.ema_mid)?,
            slow: ema(closes, config.ema_slow)?,
        })
    }

    pub fn from_snapshot(snapshot: &IndicatorSnapshot) -> Option<Self> {
        Some(Self {
            fast: snapshot.ema21?,
            mid: snapshot.ema55?,
            slow: snapshot.ema144?,
        })
    }

    /// fast > mid > slow
    pub fn is_bullish(&self) -> bool {
        self.fast > self.mid && self.mid > self.slow
    }

    /// fast < mid < slow
    pub fn is_bearish(&self) -> bool {
        self.fast < self.mid && self.mid < self.slow
    }

    /// Distance between the highest and lowest member
    pub fn span(&self) -> f64 {
        let max = self.fast.max(self.mid).max(self.slow);
        let min = self.fast.min(self.mid).min(self.slow);
        max - min
    }
}

/// Average EMA-stack span over the trailing lookback, in units of `atr`.
///
/// Position `i` (0 = newest) evaluates the stack on `closes` truncated by `i`
/// candles; positions without enough history are skipped. Returns 1.0
/// (not converged) below the slow EMA period or when no position yields a ratio.
pub fn ema_convergence_ratio(closes: &[f64], atr: f64, config: &DetectionConfig) -> f64 {
    if closes.len() < config.ema_slow || atr <= 0.0 {
        return 1.0;
    }

    let ratios: Vec<f64> = (0..config.convergence_lookback)
        .filter_map(|i| {
            let end = closes.len().checked_sub(i)?;
            EmaStack::compute(&closes[..end], config)
        })
        .map(|stack| stack.span() / atr)
        .collect();

    if ratios.is_empty() {
        return 1.0;
    }
    ratios.iter().sum::<f64>() / ratios.len() as f64
}

impl IndicatorSnapshot {
    /// Recompute every snapshot value from the full window
    pub fn compute(candles: &[Candle], config: &DetectionConfig) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        Self {
            ema21: ema(&closes, config.ema_fast),
            ema55: ema(&closes, config.ema_mid),
            ema144: ema(&closes, config.ema_slow),
            atr: atr(candles, config.atr_period),
        }
    }
}
