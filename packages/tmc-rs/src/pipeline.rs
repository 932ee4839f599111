use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::cascade::{CascadeInputs, CompensationCascade, CorrectionStage};
use crate::drift::DriftEstimator;
use crate::error::{Result, TmcError};
use crate::interp::Interpolator;
use crate::noise::NoiseMetric;
use crate::profiling::StageTimings;
use crate::smoothing::WindowAverager;
use crate::types::{
    ChannelId, ChannelSet, CorrectionRequest, CorrectionResult, QueryGrid, TimeSeries,
};

/// Drives the full correction pipeline for one request.
///
/// Stages run strictly in order (grid, resample, drift, cascade, smooth,
/// noise) and every stage's output is immutable once produced. Only the
/// per-channel resampling fans out across threads; results are collected
/// before anything consumes them.
pub struct CorrectionRunner {
    request: CorrectionRequest,
}

impl CorrectionRunner {
    pub fn new(request: CorrectionRequest) -> Result<Self> {
        request.validate()?;
        Ok(Self { request })
    }

    pub fn request(&self) -> &CorrectionRequest {
        &self.request
    }

    pub fn run(&self, channels: &ChannelSet) -> Result<CorrectionResult> {
        let req = &self.request;
        let mut timings = StageTimings::new();

        let target = channels.require(ChannelId::TargetVoltage)?;
        let grid = QueryGrid::from_series(target, req.grid_trim)?;
        log::info!(
            "query grid: {} timestamps ({} trimmed per end)",
            grid.len(),
            req.grid_trim
        );

        let needed = req.required_channels();
        let resampled =
            timings.time("resample", || resample_channels(channels, &needed, &grid))?;

        let offset = if req.stages.contains(&CorrectionStage::OffsetRemoval) {
            let baseline = resampled_channel(&resampled, ChannelId::Baseline)?;
            let estimator = DriftEstimator::new(req.drift_window)?;
            let track = timings.time("drift", || estimator.estimate(baseline))?;
            log::info!(
                "drift track: {:.3} uV start offset, {:.3} uV end-of-run baseline",
                track.values().first().copied().unwrap_or(0.0),
                track.terminal()
            );
            Some(track)
        } else {
            None
        };

        let cascade = CompensationCascade::new(
            req.stages.clone(),
            req.correction_model,
            req.temperature_correction,
        )?;
        let temperature = req
            .temperature_correction
            .and_then(|tc| resampled.get(&tc.source))
            .map(|v| v.as_slice());
        let inputs = CascadeInputs {
            target: resampled_channel(&resampled, ChannelId::TargetVoltage)?,
            current: resampled
                .get(&ChannelId::ExcitationCurrent)
                .map(|v| v.as_slice()),
            temperature,
            offset: offset.as_ref(),
        };
        let corrected = timings.time("cascade", || cascade.apply(&inputs))?;

        let averager = WindowAverager::centered(req.smoothing_window)?;
        let mut smoothed = timings.time("smooth", || averager.smooth(&corrected))?;
        // reference the smoothed product to its own mean before reporting
        let mean = smoothed.iter().sum::<f64>() / smoothed.len() as f64;
        for v in &mut smoothed {
            *v -= mean;
        }

        let metric = NoiseMetric::new(req.uv_per_mk)?;
        let noise_corrected = metric.measure(&corrected)?;
        let noise_smoothed = metric.measure(&smoothed)?;
        log::info!(
            "residual noise: {:.4} uV RMS ({:.4} mK); smoothed {:.4} uV RMS ({:.4} mK)",
            noise_corrected.std_dev_uv,
            noise_corrected.noise_mk,
            noise_smoothed.std_dev_uv,
            noise_smoothed.noise_mk
        );

        let corrected = TimeSeries::new(grid.timestamps().to_vec(), corrected)?;
        let smoothed = TimeSeries::new(grid.timestamps().to_vec(), smoothed)?;
        timings.flush_to_disk();

        Ok(CorrectionResult::new(
            corrected,
            smoothed,
            offset.map(|track| track.values().to_vec()),
            noise_corrected,
            noise_smoothed,
            req.clone(),
        ))
    }
}

/// Resample the needed channels onto the shared grid, one worker per
/// channel. Each channel is independent; the join collects everything
/// before any consumer runs.
fn resample_channels(
    channels: &ChannelSet,
    ids: &[ChannelId],
    grid: &QueryGrid,
) -> Result<BTreeMap<ChannelId, Vec<f64>>> {
    let resampled: Vec<(ChannelId, Result<Vec<f64>>)> = ids
        .par_iter()
        .map(|id| {
            let values = channels.require(*id).and_then(|series| {
                let interp = Interpolator::new(series)?;
                interp.resample(grid)
            });
            (*id, values)
        })
        .collect();

    let mut out = BTreeMap::new();
    for (id, values) in resampled {
        out.insert(id, values?);
    }
    Ok(out)
}

fn resampled_channel(map: &BTreeMap<ChannelId, Vec<f64>>, id: ChannelId) -> Result<&[f64]> {
    map.get(&id)
        .map(|v| v.as_slice())
        .ok_or_else(|| TmcError::IngestionError(format!("channel '{}' was not resampled", id)))
}
