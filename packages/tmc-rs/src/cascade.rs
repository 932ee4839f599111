use serde::{Deserialize, Serialize};

use crate::drift::OffsetTrack;
use crate::error::{Result, TmcError};
use crate::types::{CorrectionModel, TemperatureCorrection};

/// Named subtractive corrections. Which stages run, and in what order, is
/// configuration; the canonical order is the physically meaningful one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStage {
    /// Subtract the drift track from the target and current signals, and
    /// reference the target to the end-of-run baseline level.
    OffsetRemoval,
    /// Subtract the modeled dynamic-resistance voltage of the excitation
    /// current from the target signal.
    CurrentCorrection,
    /// Subtract a scaled, mean-normalized temperature track from the
    /// target signal.
    TemperatureCorrection,
}

impl CorrectionStage {
    /// Offset removal first, then current correction. Current correction
    /// consumes the offset-corrected current channel, so swapping these
    /// changes the result whenever drift is nonzero.
    pub fn canonical_order() -> Vec<CorrectionStage> {
        vec![
            CorrectionStage::OffsetRemoval,
            CorrectionStage::CurrentCorrection,
        ]
    }
}

/// Resampled inputs shared by the cascade stages. All slices live on the
/// same query grid.
#[derive(Debug, Clone, Copy)]
pub struct CascadeInputs<'a> {
    /// Raw resampled target signal, uV.
    pub target: &'a [f64],
    /// Raw resampled excitation current, uV-equivalent.
    pub current: Option<&'a [f64]>,
    /// Resampled temperature channel for the optional temperature stage.
    pub temperature: Option<&'a [f64]>,
    /// Drift track from the baseline channel.
    pub offset: Option<&'a OffsetTrack>,
}

/// Ordered sequence of subtractive corrections on the target channel.
///
/// Each stage consumes the previous stage's output; no stage re-reads the
/// raw, un-offset-corrected channels.
#[derive(Debug, Clone)]
pub struct CompensationCascade {
    stages: Vec<CorrectionStage>,
    model: Option<CorrectionModel>,
    temperature: Option<TemperatureCorrection>,
}

impl CompensationCascade {
    pub fn new(
        stages: Vec<CorrectionStage>,
        model: Option<CorrectionModel>,
        temperature: Option<TemperatureCorrection>,
    ) -> Result<Self> {
        for (i, stage) in stages.iter().enumerate() {
            if stages[..i].contains(stage) {
                return Err(TmcError::ConfigurationError(format!(
                    "cascade stage '{:?}' listed twice",
                    stage
                )));
            }
        }
        if stages.contains(&CorrectionStage::CurrentCorrection) {
            match &model {
                Some(m) => m.validate()?,
                None => {
                    return Err(TmcError::ConfigurationError(
                        "current correction requested without a correction model".to_string(),
                    ))
                }
            }
        }
        if stages.contains(&CorrectionStage::TemperatureCorrection) && temperature.is_none() {
            return Err(TmcError::ConfigurationError(
                "temperature correction requested without scale/source settings".to_string(),
            ));
        }
        Ok(Self {
            stages,
            model,
            temperature,
        })
    }

    /// Canonical cascade: offset removal followed by current correction.
    pub fn canonical(model: CorrectionModel) -> Result<Self> {
        Self::new(CorrectionStage::canonical_order(), Some(model), None)
    }

    pub fn stages(&self) -> &[CorrectionStage] {
        &self.stages
    }

    /// Run every stage in order and return the corrected target sequence.
    pub fn apply(&self, inputs: &CascadeInputs<'_>) -> Result<Vec<f64>> {
        if inputs.target.is_empty() {
            return Err(TmcError::EmptySeriesError(
                "cascade input target is empty".to_string(),
            ));
        }
        let mut target = inputs.target.to_vec();
        let mut current = inputs.current.map(|c| c.to_vec());

        for stage in &self.stages {
            match stage {
                CorrectionStage::OffsetRemoval => {
                    let offset = inputs.offset.ok_or_else(|| {
                        TmcError::ConfigurationError(
                            "offset removal requires a drift track".to_string(),
                        )
                    })?;
                    check_grid_len("drift track", offset.len(), target.len())?;
                    for (t, o) in target.iter_mut().zip(offset.values()) {
                        *t -= o + offset.terminal();
                    }
                    if let Some(cur) = current.as_mut() {
                        check_grid_len("current channel", cur.len(), offset.len())?;
                        for (c, o) in cur.iter_mut().zip(offset.values()) {
                            *c -= o;
                        }
                    }
                }
                CorrectionStage::CurrentCorrection => {
                    let model = self.model.as_ref().ok_or_else(|| {
                        TmcError::ConfigurationError(
                            "current correction requested without a correction model"
                                .to_string(),
                        )
                    })?;
                    let cur = current.as_deref().ok_or_else(|| {
                        TmcError::ConfigurationError(
                            "current correction requires the excitation-current channel"
                                .to_string(),
                        )
                    })?;
                    check_grid_len("current channel", cur.len(), target.len())?;
                    let rd = model.dynamic_resistance();
                    log::debug!(
                        "dynamic resistance {:.1} ohm at {:.1} K",
                        rd,
                        model.setpoint_temp
                    );
                    for (t, c) in target.iter_mut().zip(cur) {
                        *t -= c / model.nominal_resistance * rd;
                    }
                }
                CorrectionStage::TemperatureCorrection => {
                    let settings = self.temperature.as_ref().ok_or_else(|| {
                        TmcError::ConfigurationError(
                            "temperature correction requested without scale/source settings"
                                .to_string(),
                        )
                    })?;
                    let temp = inputs.temperature.ok_or_else(|| {
                        TmcError::ConfigurationError(format!(
                            "temperature correction requires the '{}' channel",
                            settings.source
                        ))
                    })?;
                    check_grid_len("temperature channel", temp.len(), target.len())?;
                    let track = mean_sub_norm(temp);
                    for (t, m) in target.iter_mut().zip(track) {
                        *t -= settings.scale * m;
                    }
                }
            }
            log::debug!("applied cascade stage {:?}", stage);
        }

        Ok(target)
    }
}

fn check_grid_len(what: &str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(TmcError::ConfigurationError(format!(
            "{} has {} samples but the query grid has {}",
            what, got, expected
        )));
    }
    Ok(())
}

/// Subtract the mean, then scale by the peak positive deviation. A flat
/// input has no deviation to normalize by and maps to all zeros.
fn mean_sub_norm(data: &[f64]) -> Vec<f64> {
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let centered: Vec<f64> = data.iter().map(|v| v - mean).collect();
    let peak = centered.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if peak == 0.0 {
        return vec![0.0; data.len()];
    }
    centered.into_iter().map(|v| v / peak).collect()
}
