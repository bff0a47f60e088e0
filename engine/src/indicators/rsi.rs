// Relative Strength Index (RSI) indicator implementation
use super::IndicatorCalculator;
use serde_json::Value;

/// RSI over a trailing window of `period` close-to-close deltas, using plain
/// (unsmoothed) averages of gains and losses. A window with no losses is 100.
pub struct Rsi {
    name: String,
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("RSI_{}", period),
            period,
        }
    }

    fn from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0; // no losses in the window
        }
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

impl IndicatorCalculator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "period": self.period })
    }

    fn calculate(&self, closes: &[f64]) -> Vec<Option<f64>> {
        if self.period == 0 || closes.len() <= self.period {
            return vec![None; closes.len()];
        }

        // deltas[i] is the change into close i+1
        let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

        let mut results = vec![None; self.period]; // first `period` rows lack a full window of deltas

        let mut gains = 0.0;
        let mut losses = 0.0;
        for &delta in &deltas[..self.period] {
            if delta > 0.0 {
                gains += delta;
            } else {
                losses -= delta; // losses are positive values
            }
        }
        let n = self.period as f64;
        results.push(Some(Self::from_averages(gains / n, losses / n)));

        // Slide the window one delta at a time
        for i in self.period..deltas.len() {
            let incoming = deltas[i];
            let outgoing = deltas[i - self.period];
            if incoming > 0.0 {
                gains += incoming;
            } else {
                losses -= incoming;
            }
            if outgoing > 0.0 {
                gains -= outgoing;
            } else {
                losses += outgoing;
            }
            // Running sums can drift slightly below zero
            gains = gains.max(0.0);
            losses = losses.max(0.0);
            results.push(Some(Self::from_averages(gains / n, losses / n)));
        }
        results
    }
}
