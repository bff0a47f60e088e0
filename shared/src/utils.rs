// Numeric helpers shared by the engine stages and the forecast report.

/// Mean absolute error between paired predictions and actuals.
/// Returns `None` when the slices are empty or differ in length.
pub fn mean_absolute_error(predicted: &[f64], actual: &[f64]) -> Option<f64> {
    if predicted.is_empty() || predicted.len() != actual.len() {
        return None;
    }
    let total: f64 = predicted.iter().zip(actual).map(|(p, a)| (p - a).abs()).sum();
    Some(total / predicted.len() as f64)
}

/// Mean squared error between paired predictions and actuals.
pub fn mean_squared_error(predicted: &[f64], actual: &[f64]) -> Option<f64> {
    if predicted.is_empty() || predicted.len() != actual.len() {
        return None;
    }
    let total: f64 = predicted.iter().zip(actual).map(|(p, a)| (p - a).powi(2)).sum();
    Some(total / predicted.len() as f64)
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
