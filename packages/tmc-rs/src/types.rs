use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cascade::CorrectionStage;
use crate::error::{Result, TmcError};
use crate::noise::NoiseReport;

/// Microvolts of sensor signal per millikelvin of temperature change.
pub const DEFAULT_UV_PER_MK: f64 = 2.5;

/// Sense resistance relating the current channel's voltage-equivalent
/// representation to amperes, in ohms.
pub const DEFAULT_NOMINAL_RESISTANCE: f64 = 10_000.0;

/// Nominal operating temperature of the sensing element, in kelvin.
pub const DEFAULT_SETPOINT_TEMP: f64 = 180.0;

/// Slope of the linear resistance-vs-temperature law, in ohms per kelvin.
pub const DEFAULT_RESISTANCE_SLOPE: f64 = 7.47;

/// Intercept of the linear resistance-vs-temperature law, in ohms.
pub const DEFAULT_RESISTANCE_INTERCEPT: f64 = -42.0;

/// Drift-estimation window, in samples. Much longer than the correction
/// timescale so the causal average isolates only the slow component.
pub const DEFAULT_DRIFT_WINDOW: usize = 2000;

/// Final smoothing window, in samples (one minute at the nominal 3 s
/// readout cadence).
pub const DEFAULT_SMOOTHING_WINDOW: usize = 20;

/// Samples dropped from each end of the target channel before building
/// the query grid.
pub const DEFAULT_GRID_TRIM: usize = 10;

/// Channel kinds produced by the TMC readout.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    /// 2N2222 sense-transistor voltage (the signal of interest).
    TargetVoltage,
    /// Excitation test current driven through the sensing element.
    ExcitationCurrent,
    /// ADC baseline; carries instrumental drift only.
    Baseline,
    /// ADC die temperature.
    AdcTemp,
    /// Readout board temperature.
    BoardTemp,
}

impl ChannelId {
    pub const ALL: [ChannelId; 5] = [
        ChannelId::TargetVoltage,
        ChannelId::ExcitationCurrent,
        ChannelId::Baseline,
        ChannelId::AdcTemp,
        ChannelId::BoardTemp,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "target_voltage" => Some(Self::TargetVoltage),
            "excitation_current" => Some(Self::ExcitationCurrent),
            "baseline" => Some(Self::Baseline),
            "adc_temp" => Some(Self::AdcTemp),
            "board_temp" => Some(Self::BoardTemp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TargetVoltage => "target_voltage",
            Self::ExcitationCurrent => "excitation_current",
            Self::Baseline => "baseline",
            Self::AdcTemp => "adc_temp",
            Self::BoardTemp => "board_temp",
        }
    }

    /// Physical unit of the values as logged.
    pub fn raw_unit(&self) -> &'static str {
        match self {
            Self::TargetVoltage | Self::Baseline => "V",
            Self::ExcitationCurrent => "A",
            Self::AdcTemp => "degC",
            Self::BoardTemp => "K",
        }
    }

    /// Physical unit after conversion to analysis units.
    pub fn analysis_unit(&self) -> &'static str {
        match self {
            Self::TargetVoltage | Self::Baseline | Self::ExcitationCurrent => "uV",
            Self::AdcTemp | Self::BoardTemp => "degC",
        }
    }

    /// Convert a raw logged value into analysis units: volts to microvolts
    /// for the voltage channels, amperes to the microvolt-equivalent across
    /// the nominal sense resistance for the current channel, kelvin to
    /// degrees Celsius for the board temperature.
    pub fn to_analysis_units(&self, value: f64) -> f64 {
        match self {
            Self::TargetVoltage | Self::Baseline => value * 1.0e6,
            Self::ExcitationCurrent => value * 1.0e4,
            Self::BoardTemp => value - 273.0,
            Self::AdcTemp => value,
        }
    }

    pub fn is_temperature(&self) -> bool {
        matches!(self, Self::AdcTemp | Self::BoardTemp)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::TargetVoltage => "2N2222 sense-transistor voltage; the channel being corrected",
            Self::ExcitationCurrent => "excitation test current through the sensing element",
            Self::Baseline => "ADC baseline used to track instrumental drift",
            Self::AdcTemp => "ADC die temperature",
            Self::BoardTemp => "readout board temperature",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, timestamped scalar samples for one channel.
///
/// Timestamps are seconds since the Unix epoch and strictly increasing.
/// Immutable once built; every pipeline stage produces new sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    timestamps: Vec<f64>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series, rejecting non-monotonic timestamps and non-finite
    /// values outright.
    pub fn new(timestamps: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(TmcError::IngestionError(format!(
                "timestamp/value length mismatch: {} vs {}",
                timestamps.len(),
                values.len()
            )));
        }
        if timestamps.iter().any(|t| !t.is_finite()) {
            return Err(TmcError::IngestionError(
                "non-finite timestamp".to_string(),
            ));
        }
        if timestamps.windows(2).any(|w| w[1] <= w[0]) {
            return Err(TmcError::IngestionError(
                "timestamps must be strictly increasing".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(TmcError::IngestionError(
                "non-finite sample value".to_string(),
            ));
        }
        Ok(Self { timestamps, values })
    }

    /// Build a series from (timestamp, value) pairs, dropping duplicate or
    /// out-of-order timestamps and non-finite samples. Returns the series
    /// and the number of dropped pairs; fails when nothing usable remains.
    pub fn from_samples(samples: Vec<(f64, f64)>) -> Result<(Self, usize)> {
        let mut timestamps = Vec::with_capacity(samples.len());
        let mut values = Vec::with_capacity(samples.len());
        let mut dropped = 0usize;
        for (t, v) in samples {
            if !t.is_finite() || !v.is_finite() {
                dropped += 1;
                continue;
            }
            if let Some(&last) = timestamps.last() {
                if t <= last {
                    dropped += 1;
                    continue;
                }
            }
            timestamps.push(t);
            values.push(v);
        }
        if timestamps.is_empty() {
            return Err(TmcError::IngestionError(
                "no usable samples".to_string(),
            ));
        }
        Ok((Self { timestamps, values }, dropped))
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_timestamp(&self) -> Option<f64> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.timestamps.last().copied()
    }
}

/// Read-only mapping from channel kind to its ingested series.
#[derive(Debug, Clone, Default)]
pub struct ChannelSet {
    channels: BTreeMap<ChannelId, TimeSeries>,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a channel, replacing (and returning) any previous series for
    /// the same kind.
    pub fn insert(&mut self, id: ChannelId, series: TimeSeries) -> Option<TimeSeries> {
        self.channels.insert(id, series)
    }

    pub fn get(&self, id: ChannelId) -> Option<&TimeSeries> {
        self.channels.get(&id)
    }

    pub fn require(&self, id: ChannelId) -> Result<&TimeSeries> {
        self.channels.get(&id).ok_or_else(|| {
            TmcError::IngestionError(format!("channel '{}' was not loaded", id))
        })
    }

    pub fn contains(&self, id: ChannelId) -> bool {
        self.channels.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &TimeSeries)> {
        self.channels.iter().map(|(id, s)| (*id, s))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Query timestamps shared by every interpolation in a run.
///
/// Derived from the target channel's timestamps with a symmetric trim that
/// keeps queries away from the interpolation boundaries of the slower
/// auxiliary channels.
#[derive(Debug, Clone)]
pub struct QueryGrid {
    timestamps: Vec<f64>,
}

impl QueryGrid {
    pub fn from_series(series: &TimeSeries, trim: usize) -> Result<Self> {
        let n = series.len();
        if n <= 2 * trim {
            return Err(TmcError::ConfigurationError(format!(
                "grid trim of {} samples per end leaves nothing of a {}-sample series",
                trim, n
            )));
        }
        Ok(Self {
            timestamps: series.timestamps()[trim..n - trim].to_vec(),
        })
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Optional ingestion time restriction. A sample at time t is kept when
/// start < t < stop; unset bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Option<f64>,
    pub stop: Option<f64>,
}

impl TimeWindow {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start: Option<f64>, stop: Option<f64>) -> Result<Self> {
        let window = Self { start, stop };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(stop)) = (self.start, self.stop) {
            if start >= stop {
                return Err(TmcError::ConfigurationError(format!(
                    "window start {} is not before stop {}",
                    start, stop
                )));
            }
        }
        Ok(())
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start.map_or(true, |s| t > s) && self.stop.map_or(true, |e| t < e)
    }
}

/// Dynamic-resistance compensation parameters. Supplied as configuration,
/// never fitted from data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionModel {
    /// Setpoint temperature Tk at which the resistance law is evaluated, K.
    pub setpoint_temp: f64,
    /// Slope a of Rd = a*Tk + b, ohm/K.
    pub resistance_slope: f64,
    /// Intercept b of Rd = a*Tk + b, ohm.
    pub resistance_intercept: f64,
    /// Sense resistance converting the current channel back to amperes, ohm.
    #[serde(default = "default_nominal_resistance")]
    pub nominal_resistance: f64,
}

impl Default for CorrectionModel {
    fn default() -> Self {
        Self {
            setpoint_temp: DEFAULT_SETPOINT_TEMP,
            resistance_slope: DEFAULT_RESISTANCE_SLOPE,
            resistance_intercept: DEFAULT_RESISTANCE_INTERCEPT,
            nominal_resistance: DEFAULT_NOMINAL_RESISTANCE,
        }
    }
}

impl CorrectionModel {
    /// Dynamic resistance Rd at the setpoint temperature.
    pub fn dynamic_resistance(&self) -> f64 {
        self.resistance_slope * self.setpoint_temp + self.resistance_intercept
    }

    pub fn validate(&self) -> Result<()> {
        if !self.nominal_resistance.is_finite() || self.nominal_resistance <= 0.0 {
            return Err(TmcError::ConfigurationError(format!(
                "nominal resistance must be positive, got {}",
                self.nominal_resistance
            )));
        }
        Ok(())
    }
}

/// Empirical temperature-coupling correction. The scale factor is measured
/// per hardware unit and supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureCorrection {
    /// Which temperature channel to subtract.
    pub source: ChannelId,
    /// Multiplier applied to the mean-normalized temperature track.
    pub scale: f64,
}

/// Complete configuration for one correction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRequest {
    #[serde(default)]
    pub time_window: TimeWindow,
    /// Final smoothing length, samples.
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
    /// Drift-estimation length, samples.
    #[serde(default = "default_drift_window")]
    pub drift_window: usize,
    /// Samples dropped from each end of the target channel before building
    /// the query grid.
    #[serde(default = "default_grid_trim")]
    pub grid_trim: usize,
    #[serde(default = "default_correction_model")]
    pub correction_model: Option<CorrectionModel>,
    /// Cascade stages, applied in order.
    #[serde(default = "default_stages")]
    pub stages: Vec<CorrectionStage>,
    #[serde(default)]
    pub temperature_correction: Option<TemperatureCorrection>,
    /// Calibration coefficient for the noise metric, uV per mK.
    #[serde(default = "default_uv_per_mk")]
    pub uv_per_mk: f64,
}

fn default_nominal_resistance() -> f64 {
    DEFAULT_NOMINAL_RESISTANCE
}

fn default_smoothing_window() -> usize {
    DEFAULT_SMOOTHING_WINDOW
}

fn default_drift_window() -> usize {
    DEFAULT_DRIFT_WINDOW
}

fn default_grid_trim() -> usize {
    DEFAULT_GRID_TRIM
}

fn default_correction_model() -> Option<CorrectionModel> {
    Some(CorrectionModel::default())
}

fn default_stages() -> Vec<CorrectionStage> {
    CorrectionStage::canonical_order()
}

fn default_uv_per_mk() -> f64 {
    DEFAULT_UV_PER_MK
}

impl Default for CorrectionRequest {
    fn default() -> Self {
        Self {
            time_window: TimeWindow::default(),
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            drift_window: DEFAULT_DRIFT_WINDOW,
            grid_trim: DEFAULT_GRID_TRIM,
            correction_model: Some(CorrectionModel::default()),
            stages: CorrectionStage::canonical_order(),
            temperature_correction: None,
            uv_per_mk: DEFAULT_UV_PER_MK,
        }
    }
}

impl CorrectionRequest {
    pub fn validate(&self) -> Result<()> {
        self.time_window.validate()?;
        if self.smoothing_window == 0 {
            return Err(TmcError::ConfigurationError(
                "smoothing window must be at least 1 sample".to_string(),
            ));
        }
        if self.drift_window == 0 {
            return Err(TmcError::ConfigurationError(
                "drift window must be at least 1 sample".to_string(),
            ));
        }
        if !self.uv_per_mk.is_finite() || self.uv_per_mk <= 0.0 {
            return Err(TmcError::ConfigurationError(format!(
                "uV-per-mK calibration must be positive, got {}",
                self.uv_per_mk
            )));
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if self.stages[..i].contains(stage) {
                return Err(TmcError::ConfigurationError(format!(
                    "cascade stage '{:?}' listed twice",
                    stage
                )));
            }
        }
        if self.stages.contains(&CorrectionStage::CurrentCorrection) {
            match &self.correction_model {
                Some(model) => model.validate()?,
                None => {
                    return Err(TmcError::ConfigurationError(
                        "current correction requested without a correction model".to_string(),
                    ))
                }
            }
        }
        if self.stages.contains(&CorrectionStage::TemperatureCorrection) {
            match &self.temperature_correction {
                Some(tc) if tc.source.is_temperature() => {}
                Some(tc) => {
                    return Err(TmcError::ConfigurationError(format!(
                        "'{}' is not a temperature channel",
                        tc.source
                    )))
                }
                None => {
                    return Err(TmcError::ConfigurationError(
                        "temperature correction requested without scale/source settings"
                            .to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Channels the configured stages will consume.
    pub fn required_channels(&self) -> Vec<ChannelId> {
        let mut ids = vec![ChannelId::TargetVoltage];
        if self.stages.contains(&CorrectionStage::OffsetRemoval) {
            ids.push(ChannelId::Baseline);
        }
        if self.stages.contains(&CorrectionStage::CurrentCorrection) {
            ids.push(ChannelId::ExcitationCurrent);
        }
        if self.stages.contains(&CorrectionStage::TemperatureCorrection) {
            if let Some(tc) = &self.temperature_correction {
                if !ids.contains(&tc.source) {
                    ids.push(tc.source);
                }
            }
        }
        ids
    }
}

/// Output of one correction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionResult {
    pub id: String,
    /// Fully corrected target signal on the query grid, uV.
    pub corrected: TimeSeries,
    /// Smoothed, mean-centered version of the corrected signal, uV.
    pub smoothed: TimeSeries,
    /// Normalized drift track subtracted during offset removal, when that
    /// stage ran.
    pub offset_track: Option<Vec<f64>>,
    pub noise_corrected: NoiseReport,
    pub noise_smoothed: NoiseReport,
    pub request: CorrectionRequest,
    pub created_at: String,
}

impl CorrectionResult {
    pub fn new(
        corrected: TimeSeries,
        smoothed: TimeSeries,
        offset_track: Option<Vec<f64>>,
        noise_corrected: NoiseReport,
        noise_smoothed: NoiseReport,
        request: CorrectionRequest,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            corrected,
            smoothed,
            offset_track,
            noise_corrected,
            noise_smoothed,
            request,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_lookup_roundtrip() {
        for id in ChannelId::ALL {
            assert_eq!(ChannelId::from_str(id.as_str()), Some(id));
        }
        assert!(ChannelId::from_str("bogus").is_none());
    }

    #[test]
    fn test_analysis_unit_conversion() {
        assert_eq!(ChannelId::TargetVoltage.to_analysis_units(150.0e-6), 150.0);
        assert_eq!(ChannelId::Baseline.to_analysis_units(100.0e-6), 100.0);
        assert_eq!(ChannelId::ExcitationCurrent.to_analysis_units(0.01), 100.0);
        assert_eq!(ChannelId::BoardTemp.to_analysis_units(298.0), 25.0);
        assert_eq!(ChannelId::AdcTemp.to_analysis_units(25.0), 25.0);
    }

    #[test]
    fn test_series_rejects_out_of_order() {
        let result = TimeSeries::new(vec![0.0, 2.0, 1.0], vec![1.0, 2.0, 3.0]);
        assert!(result.is_err());
        let result = TimeSeries::new(vec![0.0, 1.0, 1.0], vec![1.0, 2.0, 3.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_series_rejects_non_finite() {
        let result = TimeSeries::new(vec![0.0, 1.0], vec![1.0, f64::NAN]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_samples_drops_bad_pairs() {
        let samples = vec![
            (0.0, 1.0),
            (1.0, 2.0),
            (1.0, 2.5),       // duplicate timestamp
            (0.5, 3.0),       // out of order
            (2.0, f64::NAN),  // non-finite
            (3.0, 4.0),
        ];
        let (series, dropped) = TimeSeries::from_samples(samples).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(dropped, 3);
        assert_eq!(series.values(), &[1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_from_samples_keeps_first_usable() {
        let samples = vec![(1.0, f64::INFINITY), (1.0, 2.0), (0.5, 3.0)];
        // first pair is dropped for the value, the second survives, the
        // third is out of order; one usable sample remains
        let (series, dropped) = TimeSeries::from_samples(samples).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(dropped, 2);

        assert!(TimeSeries::from_samples(vec![(f64::NAN, 0.0)]).is_err());
    }

    #[test]
    fn test_window_is_strict_on_both_bounds() {
        let window = TimeWindow::new(Some(10.0), Some(20.0)).unwrap();
        assert!(!window.contains(10.0));
        assert!(window.contains(10.5));
        assert!(window.contains(19.5));
        assert!(!window.contains(20.0));
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        assert!(TimeWindow::new(Some(20.0), Some(10.0)).is_err());
        assert!(TimeWindow::new(Some(10.0), Some(10.0)).is_err());
        assert!(TimeWindow::new(Some(10.0), None).is_ok());
    }

    #[test]
    fn test_grid_trim() {
        let series =
            TimeSeries::new((0..30).map(|i| i as f64).collect(), vec![0.0; 30]).unwrap();
        let grid = QueryGrid::from_series(&series, 10).unwrap();
        assert_eq!(grid.len(), 10);
        assert_eq!(grid.timestamps()[0], 10.0);
        assert_eq!(grid.timestamps()[9], 19.0);

        assert!(QueryGrid::from_series(&series, 15).is_err());
    }

    #[test]
    fn test_dynamic_resistance_law() {
        let model = CorrectionModel::default();
        assert!((model.dynamic_resistance() - 1302.6).abs() < 1e-9);
    }

    #[test]
    fn test_request_validation() {
        let mut request = CorrectionRequest::default();
        assert!(request.validate().is_ok());

        request.smoothing_window = 0;
        assert!(request.validate().is_err());
        request.smoothing_window = DEFAULT_SMOOTHING_WINDOW;

        request.correction_model = None;
        assert!(request.validate().is_err());

        request.stages = vec![CorrectionStage::OffsetRemoval];
        assert!(request.validate().is_ok());

        request.stages = vec![
            CorrectionStage::OffsetRemoval,
            CorrectionStage::OffsetRemoval,
        ];
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_request_temperature_validation() {
        let mut request = CorrectionRequest {
            stages: vec![CorrectionStage::TemperatureCorrection],
            correction_model: None,
            ..Default::default()
        };
        assert!(request.validate().is_err());

        request.temperature_correction = Some(TemperatureCorrection {
            source: ChannelId::Baseline,
            scale: 0.5,
        });
        assert!(request.validate().is_err());

        request.temperature_correction = Some(TemperatureCorrection {
            source: ChannelId::AdcTemp,
            scale: 0.5,
        });
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_required_channels() {
        let request = CorrectionRequest::default();
        let ids = request.required_channels();
        assert!(ids.contains(&ChannelId::TargetVoltage));
        assert!(ids.contains(&ChannelId::Baseline));
        assert!(ids.contains(&ChannelId::ExcitationCurrent));
        assert!(!ids.contains(&ChannelId::AdcTemp));
    }

    #[test]
    fn test_request_json_roundtrip() {
        let request = CorrectionRequest::default();
        let json = serde_json::to_string(&request).unwrap();
        let back: CorrectionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.smoothing_window, request.smoothing_window);
        assert_eq!(back.stages, request.stages);

        // sparse config files pick up defaults
        let sparse: CorrectionRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(sparse.drift_window, DEFAULT_DRIFT_WINDOW);
        assert!(sparse.correction_model.is_some());
    }
}
