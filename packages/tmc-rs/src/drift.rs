use crate::error::Result;
use crate::smoothing::WindowAverager;

/// Slow instrumental drift extracted from the baseline channel.
///
/// `values` is the causal long-window average of the baseline referenced
/// to its final sample, so the track ends at exactly zero and corrections
/// downstream are reported relative to the end-of-run baseline.
#[derive(Debug, Clone)]
pub struct OffsetTrack {
    values: Vec<f64>,
    terminal: f64,
}

impl OffsetTrack {
    /// Normalized drift curve; the last element is 0.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// End-of-run baseline level removed during normalization, uV.
    pub fn terminal(&self) -> f64 {
        self.terminal
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Derives an offset track from the resampled baseline channel.
///
/// The baseline carries no signal of interest, so its causal average over a
/// window much longer than the correction timescale isolates the drift. The
/// averager must be causal: the track is subtracted back onto the same
/// indices, and a centered window would leak future samples into the
/// correction.
#[derive(Debug, Clone, Copy)]
pub struct DriftEstimator {
    averager: WindowAverager,
}

impl DriftEstimator {
    pub fn new(window: usize) -> Result<Self> {
        Ok(Self {
            averager: WindowAverager::causal(window)?,
        })
    }

    pub fn window(&self) -> usize {
        self.averager.window()
    }

    pub fn estimate(&self, baseline: &[f64]) -> Result<OffsetTrack> {
        let track = self.averager.smooth(baseline)?;
        let terminal = track[track.len() - 1];
        let values = track.iter().map(|v| v - terminal).collect();
        Ok(OffsetTrack { values, terminal })
    }
}
