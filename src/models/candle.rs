use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Candle {
    /// Candle open time (epoch ms, exchange-native)
    pub timestamp: i64,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume
    pub volume: f64,
}

impl Candle {
    /// True when every price and volume field is a finite number
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// Raw Binance kline row.
///
/// `[open_time, open, high, low, close, volume, close_time, quote_volume, trades,
/// taker_base, taker_quote, ignore]`, prices encoded as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceKline(
    pub i64,
    #[serde(deserialize_with = "deserialize_string_to_f64")] pub f64,
    #[serde(deserialize_with = "deserialize_string_to_f64")] pub f64,
    #[serde(deserialize_with = "deserialize_string_to_f64")] pub f64,
    #[serde(deserialize_with = "deserialize_string_to_f64")] pub f64,
    #[serde(deserialize_with = "deserialize_string_to_f64")] pub f64,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

impl From<BinanceKline> for Candle {
    fn from(kline: BinanceKline) -> Self {
        Self {
            timestamp: kline.0,
            open: kline.1,
            high: kline.2,
            low: kline.3,
            close: kline.4,
            volume: kline.5,
        }
    }
}

fn deserialize_string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}
