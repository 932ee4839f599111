use tmc_rs::{
    parse_timestamp, ChannelId, CorrectionModel, CorrectionRequest, CorrectionStage,
    TemperatureCorrection, TimeWindow,
};

use crate::cli::RunArgs;

/// Build the analysis time window from the CLI's date strings.
pub fn build_window(tstart: &Option<String>, tstop: &Option<String>) -> Result<TimeWindow, String> {
    let start = tstart
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(|e| e.to_string())?;
    let stop = tstop
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(|e| e.to_string())?;
    TimeWindow::new(start, stop).map_err(|e| e.to_string())
}

/// Build a CorrectionRequest from the run flags.
pub fn build_request(args: &RunArgs) -> Result<CorrectionRequest, String> {
    if let Some(config_path) = &args.config {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("cannot read config '{}': {}", config_path, e))?;
        let request: CorrectionRequest = serde_json::from_str(&content)
            .map_err(|e| format!("bad config '{}': {}", config_path, e))?;
        request.validate().map_err(|e| e.to_string())?;
        return Ok(request);
    }

    let time_window = build_window(&args.tstart, &args.tstop)?;

    let mut stages = vec![CorrectionStage::OffsetRemoval];
    if !args.no_current_correction {
        stages.push(CorrectionStage::CurrentCorrection);
    }

    let temperature_correction = match args.temp_scale {
        Some(scale) => {
            let source = ChannelId::from_str(&args.temp_source).ok_or_else(|| {
                format!(
                    "unknown channel '{}' (expected adc_temp or board_temp)",
                    args.temp_source
                )
            })?;
            stages.push(CorrectionStage::TemperatureCorrection);
            Some(TemperatureCorrection { source, scale })
        }
        None => None,
    };

    let request = CorrectionRequest {
        time_window,
        smoothing_window: args.smooth_window,
        drift_window: args.drift_window,
        grid_trim: args.trim,
        correction_model: Some(CorrectionModel {
            setpoint_temp: args.setpoint,
            resistance_slope: args.r_slope,
            resistance_intercept: args.r_intercept,
            nominal_resistance: args.nominal_resistance,
        }),
        stages,
        temperature_correction,
        uv_per_mk: args.uv_per_mk,
    };
    request.validate().map_err(|e| e.to_string())?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> RunArgs {
        RunArgs {
            file_list: None,
            data_dir: None,
            config: None,
            tstart: None,
            tstop: None,
            smooth_window: tmc_rs::DEFAULT_SMOOTHING_WINDOW,
            drift_window: tmc_rs::DEFAULT_DRIFT_WINDOW,
            trim: tmc_rs::DEFAULT_GRID_TRIM,
            setpoint: tmc_rs::DEFAULT_SETPOINT_TEMP,
            r_slope: tmc_rs::DEFAULT_RESISTANCE_SLOPE,
            r_intercept: tmc_rs::DEFAULT_RESISTANCE_INTERCEPT,
            nominal_resistance: tmc_rs::DEFAULT_NOMINAL_RESISTANCE,
            no_current_correction: false,
            temp_scale: None,
            temp_source: "adc_temp".to_string(),
            uv_per_mk: tmc_rs::DEFAULT_UV_PER_MK,
            output: None,
            compact: false,
            quiet: false,
        }
    }

    #[test]
    fn test_build_request_defaults() {
        let request = build_request(&make_args()).unwrap();
        assert_eq!(
            request.stages,
            vec![
                CorrectionStage::OffsetRemoval,
                CorrectionStage::CurrentCorrection
            ]
        );
        let model = request.correction_model.unwrap();
        assert!((model.dynamic_resistance() - 1302.6).abs() < 1e-9);
    }

    #[test]
    fn test_build_request_without_current_correction() {
        let mut args = make_args();
        args.no_current_correction = true;
        let request = build_request(&args).unwrap();
        assert_eq!(request.stages, vec![CorrectionStage::OffsetRemoval]);
    }

    #[test]
    fn test_build_request_with_temperature() {
        let mut args = make_args();
        args.temp_scale = Some(0.5);
        args.temp_source = "board_temp".to_string();
        let request = build_request(&args).unwrap();
        assert!(request
            .stages
            .contains(&CorrectionStage::TemperatureCorrection));
        let tc = request.temperature_correction.unwrap();
        assert_eq!(tc.source, ChannelId::BoardTemp);
        assert_eq!(tc.scale, 0.5);
    }

    #[test]
    fn test_build_request_bad_temp_source() {
        let mut args = make_args();
        args.temp_scale = Some(0.5);
        args.temp_source = "baseline".to_string();
        // the channel exists but is not a temperature channel
        assert!(build_request(&args).is_err());

        args.temp_source = "nonsense".to_string();
        assert!(build_request(&args).is_err());
    }

    #[test]
    fn test_build_window_parses_dates() {
        let window = build_window(
            &Some("2016/03/10-13:00:00".to_string()),
            &Some("2016/03/10-14:00:00".to_string()),
        )
        .unwrap();
        let start = window.start.unwrap();
        let stop = window.stop.unwrap();
        assert_eq!(stop - start, 3600.0);
    }

    #[test]
    fn test_build_window_rejects_inverted() {
        let result = build_window(
            &Some("2016/03/10-14:00:00".to_string()),
            &Some("2016/03/10-13:00:00".to_string()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_build_window_rejects_garbage() {
        let result = build_window(&Some("yesterday".to_string()), &None);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_request_zero_window_rejected() {
        let mut args = make_args();
        args.smooth_window = 0;
        assert!(build_request(&args).is_err());
    }
}
