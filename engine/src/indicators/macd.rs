// Moving Average Convergence Divergence (MACD) line
use super::{Ema, IndicatorCalculator};
use serde_json::Value;

pub struct Macd {
    name: String,
    fast: Ema,
    slow: Ema,
    fast_span: usize,
    slow_span: usize,
}

impl Macd {
    pub fn new(fast_span: usize, slow_span: usize) -> Self {
        Self {
            name: "MACD".to_string(),
            fast: Ema::new(fast_span),
            slow: Ema::new(slow_span),
            fast_span,
            slow_span,
        }
    }
}

impl IndicatorCalculator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "fast": self.fast_span, "slow": self.slow_span })
    }

    fn calculate(&self, closes: &[f64]) -> Vec<Option<f64>> {
        if self.fast_span == 0 || self.slow_span == 0 {
            return vec![None; closes.len()];
        }
        let fast = self.fast.series(closes);
        let slow = self.slow.series(closes);
        fast.iter().zip(&slow).map(|(f, s)| Some(f - s)).collect()
    }
}
