//! Single-field streaming moments

use super::summary::FieldSummary;

/// Running state for one numeric field.
///
/// Count, mean and the central-moment sums `M2`..`M4` are updated together by
/// [`update`](Self::update) and are always mutually consistent. Every observed
/// value is also retained so quantiles stay exact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    m3: f64,
    m4: f64,
    min: Option<f64>,
    max: Option<f64>,
    values: Vec<f64>,
}

impl FieldAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation into the running moments.
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let n = self.count as f64;

        let delta = x - self.mean;
        let delta_n = delta / n;
        let delta_n2 = delta_n * delta_n;
        let term1 = delta * delta_n * (n - 1.0);

        // M4 reads the old M2/M3 and M3 reads the old M2, so the order matters.
        self.mean += delta_n;
        self.m4 += term1 * delta_n2 * (n * n - 3.0 * n + 3.0) + 6.0 * delta_n2 * self.m2
            - 4.0 * delta_n * self.m3;
        self.m3 += term1 * delta_n * (n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term1;

        self.min = Some(match self.min {
            Some(min) if min <= x => min,
            _ => x,
        });
        self.max = Some(match self.max {
            Some(max) if max >= x => max,
            _ => x,
        });

        self.values.push(x);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// Second, third and fourth central-moment sums.
    pub fn moments(&self) -> (f64, f64, f64) {
        (self.m2, self.m3, self.m4)
    }

    /// Retained observations, in arrival order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Sample variance, zero until it is defined.
    pub fn variance(&self) -> f64 {
        if self.count > 1 && self.m2 != 0.0 { self.m2 / (self.count - 1) as f64 } else { 0.0 }
    }

    pub fn skewness(&self) -> f64 {
        if self.count > 2 && self.m2 != 0.0 {
            (self.count as f64).sqrt() * self.m3 / self.m2.powf(1.5)
        } else {
            0.0
        }
    }

    /// Excess kurtosis.
    pub fn kurtosis(&self) -> f64 {
        if self.count > 3 && self.m2 != 0.0 {
            self.count as f64 * self.m4 / (self.m2 * self.m2) - 3.0
        } else {
            0.0
        }
    }

    /// Project the current state into a summary. Read-only.
    pub fn summarize(&self) -> FieldSummary {
        let variance = self.variance();

        let (median, p25, p75) = if self.values.is_empty() {
            (None, None, None)
        } else {
            let mut sorted = self.values.clone();
            sorted.sort_by(f64::total_cmp);
            (quantile(&sorted, 0.5), quantile(&sorted, 0.25), quantile(&sorted, 0.75))
        };

        FieldSummary {
            count: self.count,
            mean: self.mean,
            variance,
            std: variance.sqrt(),
            min: self.min,
            max: self.max,
            median,
            p25,
            p75,
            skewness: self.skewness(),
            kurtosis: self.kurtosis(),
        }
    }
}

/// Linear-interpolation quantile of an ascending slice.
///
/// The rank is `q * (n - 1)`; fractional ranks interpolate between the two
/// neighbouring values. Returns `None` for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = q.clamp(0.0, 1.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    let low = sorted[lower];
    let high = sorted[upper.min(last)];
    Some(low + (high - low) * fraction)
}
