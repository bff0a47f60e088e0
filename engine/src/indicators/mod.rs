// Technical indicators module
pub mod ema;
pub mod engine;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use ema::Ema;
pub use engine::IndicatorEngine;
pub use macd::Macd;
pub use rsi::Rsi;
pub use sma::Sma;

use serde_json::Value;

// Common trait for all indicators
pub trait IndicatorCalculator: Send + Sync {
    fn name(&self) -> &str;
    fn parameters(&self) -> Value; // Parameters used for this indicator instance
    /// One output per input close; `None` where the indicator is undefined (insufficient history).
    fn calculate(&self, closes: &[f64]) -> Vec<Option<f64>>;
}
