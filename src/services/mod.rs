pub mod binance;
pub mod chart;
pub mod monitor;
pub mod signal_journal;
pub mod signal_state;
