use std::sync::Arc;

use crate::business_logic::config::DetectionConfig;
use crate::services::binance::BinanceClient;
use crate::services::signal_state::SharedSignalState;

#[derive(Clone)]
pub struct AppState {
    pub signal_state: SharedSignalState,
    pub binance: Arc<BinanceClient>,
    pub detection: Arc<DetectionConfig>,
}
