use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::models::signal::Signal;
use crate::models::status::InstrumentStatus;

/// What the monitor publishes for HTTP readers. The monitor is the only writer.
#[derive(Debug)]
pub struct SignalStateInner {
    pub instruments: RwLock<Vec<InstrumentStatus>>,
    /// Signals emitted during the current UTC day
    pub signals: RwLock<Vec<Signal>>,
    pub broadcaster: broadcast::Sender<Signal>,
}

impl SignalStateInner {
    pub fn new(capacity: usize) -> Self {
        let (broadcaster, _receiver) = broadcast::channel(capacity);
        Self {
            instruments: RwLock::new(Vec::new()),
            signals: RwLock::new(Vec::new()),
            broadcaster,
        }
    }
}

pub type SharedSignalState = Arc<SignalStateInner>;
