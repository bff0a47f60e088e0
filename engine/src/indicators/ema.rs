// Exponential Moving Average (EMA) indicator implementation
use super::IndicatorCalculator;
use serde_json::Value;

/// EMA with smoothing factor `2 / (span + 1)`, seeded by the first close and
/// without bias adjustment, so it is defined from the very first row.
pub struct Ema {
    name: String,
    span: usize,
}

impl Ema {
    pub fn new(span: usize) -> Self {
        Self {
            name: format!("EMA_{}", span),
            span,
        }
    }

    pub fn alpha(&self) -> f64 {
        2.0 / (self.span as f64 + 1.0)
    }

    /// Raw EMA series, one value per close.
    pub fn series(&self, closes: &[f64]) -> Vec<f64> {
        let alpha = self.alpha();
        let mut results = Vec::with_capacity(closes.len());
        let mut previous = match closes.first() {
            Some(first) => *first,
            None => return results,
        };
        results.push(previous);
        for close in &closes[1..] {
            previous = alpha * close + (1.0 - alpha) * previous;
            results.push(previous);
        }
        results
    }
}

impl IndicatorCalculator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "span": self.span, "alpha": self.alpha() })
    }

    fn calculate(&self, closes: &[f64]) -> Vec<Option<f64>> {
        if self.span == 0 {
            return vec![None; closes.len()];
        }
        self.series(closes).into_iter().map(Some).collect()
    }
}
