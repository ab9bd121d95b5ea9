use crate::business_logic::config::DetectionConfig;
use crate::business_logic::indicators::{ema_convergence_ratio, EmaStack};
use crate::errors::CoreError;
use crate::models::signal::SignalKind;

/// Fires on the candle where the EMA stack first lines up, provided the
/// stack was compressed (convergence ratio below threshold) going in
#[derive(Debug, Clone)]
pub struct TrendDetector {
    config: DetectionConfig,
}

impl TrendDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn evaluate(&self, closes: &[f64], atr: Option<f64>) -> Result<Option<SignalKind>, CoreError> {
        if closes.len() < self.config.ema_slow {
            return Ok(None);
        }
        if closes.iter().any(|c| !c.is_finite()) {
            return Err(CoreError::Malformed("non-finite close in window".to_string()));
        }

        let Some(current) = EmaStack::compute(closes, &self.config) else {
            return Ok(None);
        };
        let Some(previous) = EmaStack::compute(&closes[..closes.len() - 1], &self.config) else {
            return Ok(None);
        };

        let ratio = ema_convergence_ratio(closes, atr.unwrap_or(0.0), &self.config);
        let converged = ratio < self.config.convergence_threshold;
        tracing::debug!(
            "EMA stack {:.4}/{:.4}/{:.4}, convergence ratio {:.3}",
            current.fast,
            current.mid,
            current.slow,
            ratio
        );

        if current.is_bullish() && !previous.is_bullish() && converged {
            return Ok(Some(SignalKind::UptrendOnset));
        }
        if current.is_bearish() && !previous.is_bearish() && converged {
            return Ok(Some(SignalKind::DowntrendOnset));
        }
        Ok(None)
    }
}
