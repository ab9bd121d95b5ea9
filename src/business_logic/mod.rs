pub mod candle_window;
pub mod config;
pub mod double_pattern;
pub mod indicators;
pub mod instrument;
pub mod pivot;
pub mod trend;
