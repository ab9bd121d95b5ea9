use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Parameters for the candle cache, indicators and detectors
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Candles kept per instrument
    pub window_capacity: usize,
    /// Most recent candles fetched each refresh cycle
    pub refresh_batch: usize,
    /// Near edge of the A-pivot band, counted back from the newest candle
    pub pivot_band_near: usize,
    /// Far edge of the A-pivot band, counted back from the newest candle
    pub pivot_band_far: usize,
    /// ATR window (simple average of true ranges)
    pub atr_period: usize,
    pub ema_fast: usize,
    pub ema_mid: usize,
    pub ema_slow: usize,
    /// Max |A - B| in ATR units
    pub peak_tolerance_atr: f64,
    /// Min distance from A and B to C in ATR units
    pub min_depth_atr: f64,
    /// Trend onset requires an average EMA span below this many ATRs
    pub convergence_threshold: f64,
    /// Candle positions averaged by the convergence ratio
    pub convergence_lookback: usize,
    /// Nominal spacing between consecutive candles (ms)
    pub candle_spacing_ms: i64,
    /// Allowed deviation from the nominal spacing (ms)
    pub spacing_tolerance_ms: i64,
    /// Share of spacings that must be nominal for the window to stay valid
    pub min_valid_spacing_ratio: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_capacity: 200,
            refresh_batch: 5,
            pivot_band_near: 13,
            pivot_band_far: 34,
            atr_period: 14,
            ema_fast: 21,
            ema_mid: 55,
            ema_slow: 144,
            peak_tolerance_atr: 0.8,
            min_depth_atr: 2.3,
            convergence_threshold: 0.5,
            convergence_lookback: 21,
            candle_spacing_ms: 3_600_000,
            spacing_tolerance_ms: 600_000,
            min_valid_spacing_ratio: 0.9,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
        }
    }
}

const DEFAULT_SYMBOLS: [&str; 10] = [
    "BTCUSDT", "ETHUSDT", "XRPUSDT", "ADAUSDT", "DOTUSDT", "BNBUSDT", "SOLUSDT", "AVAXUSDT",
    "LINKUSDT", "DOGEUSDT",
];

/// Process-level settings, read from the environment at startup
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub symbols: Vec<String>,
    pub binance_api_url: String,
    /// Candle interval requested from the exchange
    pub interval: String,
    pub request_timeout: Duration,
    /// Pause between instruments to stay under exchange rate limits
    pub request_interval: Duration,
    /// Seconds past the hour at which each scan starts
    pub cycle_offset_secs: i64,
    pub log_dir: String,
    pub data_dir: String,
    pub log_level: String,
    pub bind_addr: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            binance_api_url: "https://api.binance.com".to_string(),
            interval: "1h".to_string(),
            request_timeout: Duration::from_secs(10),
            request_interval: Duration::from_secs(3),
            cycle_offset_secs: 5,
            log_dir: "logs".to_string(),
            data_dir: "data".to_string(),
            log_level: "info".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let symbols = match lookup("SYMBOLS") {
            Some(raw) => parse_symbols(&raw),
            None => defaults.symbols,
        };
        if symbols.is_empty() {
            anyhow::bail!("SYMBOLS must name at least one instrument");
        }

        Ok(Self {
            symbols,
            binance_api_url: lookup("BINANCE_API_URL").unwrap_or(defaults.binance_api_url),
            interval: defaults.interval,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            request_interval: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_INTERVAL_SECS",
                defaults.request_interval.as_secs(),
            )?),
            cycle_offset_secs: parse_or(&lookup, "CYCLE_OFFSET_SECS", defaults.cycle_offset_secs)?,
            log_dir: lookup("LOG_DIR").unwrap_or(defaults.log_dir),
            data_dir: lookup("DATA_DIR").unwrap_or(defaults.data_dir),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
