//! Sample statistics and floating-point near-equality.

/// Arithmetic mean, `None` for an empty sample.
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population standard deviation, `None` for an empty sample.
pub fn std_dev(samples: &[f64]) -> Option<f64> {
    let mu = mean(samples)?;
    let variance = samples.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / samples.len() as f64;
    Some(variance.sqrt())
}

/// Whether `x` and `y` are equal up to floating-point noise.
///
/// Values within machine epsilon of each other are equal. When either
/// operand is (nearly) zero the absolute difference must be below `epsilon`;
/// otherwise the relative difference must be.
pub fn nearly_eq(x: f64, y: f64, epsilon: f64) -> bool {
    if x == y {
        return true;
    }
    let diff = (x - y).abs();
    if diff <= f64::EPSILON {
        return true;
    }
    if x.abs() < f64::EPSILON || y.abs() < f64::EPSILON {
        return diff < epsilon;
    }
    diff / (x.abs() + y.abs()).min(f64::MAX) < epsilon
}
