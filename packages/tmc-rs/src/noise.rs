use serde::{Deserialize, Serialize};

use crate::error::{Result, TmcError};

/// Residual noise of a corrected sequence, raw and calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseReport {
    /// Standard deviation of the sequence, uV.
    pub std_dev_uv: f64,
    /// The same figure converted through the calibration coefficient, mK.
    pub noise_mk: f64,
}

/// Computes residual statistics with a fixed uV-per-mK calibration.
#[derive(Debug, Clone, Copy)]
pub struct NoiseMetric {
    uv_per_mk: f64,
}

impl NoiseMetric {
    pub fn new(uv_per_mk: f64) -> Result<Self> {
        if !uv_per_mk.is_finite() || uv_per_mk <= 0.0 {
            return Err(TmcError::ConfigurationError(format!(
                "uV-per-mK calibration must be positive, got {}",
                uv_per_mk
            )));
        }
        Ok(Self { uv_per_mk })
    }

    pub fn uv_per_mk(&self) -> f64 {
        self.uv_per_mk
    }

    /// Population standard deviation plus its millikelvin equivalent.
    pub fn measure(&self, data: &[f64]) -> Result<NoiseReport> {
        if data.is_empty() {
            return Err(TmcError::EmptySeriesError(
                "cannot compute noise of an empty sequence".to_string(),
            ));
        }
        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let variance = data.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        Ok(NoiseReport {
            std_dev_uv: std_dev,
            noise_mk: std_dev / self.uv_per_mk,
        })
    }
}
