//! Small numeric helpers shared by the fundamentals crates.

/// Mean of the finite values in `data`, `None` when there are none.
pub fn mean(data: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    Some(finite.iter().sum::<f64>() / finite.len() as f64)
}

/// Compound annual growth rate in percent over `periods` compounding periods.
///
/// Only defined for strictly positive, finite endpoints.
pub fn cagr_percent(start: f64, end: f64, periods: usize) -> Option<f64> {
    if periods == 0 || !start.is_finite() || !end.is_finite() || start <= 0.0 || end <= 0.0 {
        return None;
    }
    let rate = ((end / start).powf(1.0 / periods as f64) - 1.0) * 100.0;
    rate.is_finite().then_some(rate)
}

/// Closed interval used to bound derived values
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}
