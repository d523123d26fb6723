//! Defines the fixed-length grid snapshot produced by the grid parser and the
//! sentinel band that separates physical measurements from "missing" codes.

use serde::{Deserialize, Serialize};

/// The closed band of values the upstream feed uses for real measurements.
///
/// Anything outside `[low, high]` (and any non-finite value) is a sentinel code
/// such as `-999` ("missing") or `2049` ("no data") and is normalized to `None`.
///
/// # Examples
///
/// ```
/// use fusion_weather::SentinelBand;
///
/// let band = SentinelBand::default();
/// assert_eq!(band.normalize(Some(-999.0)), None);
/// assert_eq!(band.normalize(Some(15.5)), Some(15.5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentinelBand {
    /// Smallest value still considered a measurement (inclusive).
    pub low: f64,
    /// Largest value still considered a measurement (inclusive).
    pub high: f64,
}

impl Default for SentinelBand {
    fn default() -> Self {
        Self {
            low: -900.0,
            high: 2000.0,
        }
    }
}

impl SentinelBand {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Returns `true` when `value` is a real measurement.
    pub fn is_valid(&self, value: f64) -> bool {
        value.is_finite() && value >= self.low && value <= self.high
    }

    /// Maps a raw value to the missing marker if it falls outside the band.
    /// Already-missing values stay missing, so applying this twice is a no-op.
    pub fn normalize(&self, value: Option<f64>) -> Option<f64> {
        value.filter(|v| self.is_valid(*v))
    }
}

/// One scalar per grid index for a single (instant, variable) pair.
///
/// Position `i` in [`GridSnapshot::values`] *is* grid index `i`; the parser
/// guarantees the length equals the expected grid count, so the snapshot can be
/// joined to coordinates and regions by position alone.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    values: Vec<Option<f64>>,
}

impl GridSnapshot {
    /// Builds a snapshot from raw values, applying sentinel normalization once.
    pub fn from_raw(raw: Vec<f64>, band: &SentinelBand) -> Self {
        let values = raw.into_iter().map(|v| band.normalize(Some(v))).collect();
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<f64>> {
        self.values
    }

    /// Number of grid cells carrying the missing marker.
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Re-applies a sentinel band. Idempotent for the band used at parse time.
    pub fn normalized(self, band: &SentinelBand) -> Self {
        let values = self.values.into_iter().map(|v| band.normalize(v)).collect();
        Self { values }
    }
}
