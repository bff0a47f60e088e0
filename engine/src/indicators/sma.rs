// Simple Moving Average (SMA) indicator implementation
use super::IndicatorCalculator;
use serde_json::Value;

pub struct Sma {
    name: String,
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("MA_{}", period),
            period,
        }
    }
}

impl IndicatorCalculator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "period": self.period })
    }

    fn calculate(&self, closes: &[f64]) -> Vec<Option<f64>> {
        if self.period == 0 || closes.len() < self.period {
            return vec![None; closes.len()];
        }

        let mut results = vec![None; self.period - 1]; // window not yet filled

        // Calculate sum for the first window
        let mut sum: f64 = closes.iter().take(self.period).sum();
        results.push(Some(sum / self.period as f64));

        // Slide the window
        for i in self.period..closes.len() {
            sum = sum - closes[i - self.period] + closes[i];
            results.push(Some(sum / self.period as f64));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_option_vec_eq(a: &[Option<f64>], b: &[Option<f64>]) {
        assert_eq!(a.len(), b.len(), "Vectors differ in length");
        for (i, (val_a, val_b)) in a.iter().zip(b.iter()).enumerate() {
            match (val_a, val_b) {
                (None, None) => {}
                (Some(x), Some(y)) => assert!((x - y).abs() < 1e-9, "Mismatch at index {}: {} != {}", i, x, y),
                _ => panic!("Mismatch at index {}: {:?} != {:?}", i, val_a, val_b),
            }
        }
    }

    #[test]
    fn test_sma_calculation() {
        let results = Sma::new(3).calculate(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        // expected: -, -, (1+2+3)/3=2.0, (2+3+4)/3=3.0, (3+4+5)/3=4.0
        assert_option_vec_eq(&results, &[None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_sma_insufficient_data() {
        let results = Sma::new(3).calculate(&[1.0, 2.0]);
        assert_option_vec_eq(&results, &[None, None]);
    }

    #[test]
    fn test_sma_period_one() {
        // SMA(1) is just the close price
        let results = Sma::new(1).calculate(&[1.0, 2.0, 3.0]);
        assert_option_vec_eq(&results, &[Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_sma_empty_and_zero_period() {
        assert!(Sma::new(3).calculate(&[]).is_empty());
        assert_eq!(Sma::new(0).calculate(&[1.0, 2.0]), vec![None, None]);
    }

    #[test]
    fn test_sma_name_matches_column() {
        assert_eq!(Sma::new(7).name(), "MA_7");
        assert_eq!(Sma::new(30).parameters()["period"], 30);
    }
}
