use std::path::Path;

use tmc_rs::{CorrectionRunner, LogManifest};

use crate::cli::RunArgs;
use crate::exit_codes;
use crate::output;
use crate::params;

pub fn execute(args: RunArgs) -> i32 {
    let manifest = match (&args.file_list, &args.data_dir) {
        (Some(list), None) => LogManifest::from_list_file(Path::new(list)),
        (None, Some(dir)) => LogManifest::discover(Path::new(dir)),
        (None, None) => {
            eprintln!("Error: one of --file-list or --data-dir is required");
            return exit_codes::INPUT_ERROR;
        }
        (Some(_), Some(_)) => unreachable!("clap rejects --file-list with --data-dir"),
    };
    let manifest = match manifest {
        Ok(m) if !m.is_empty() => m,
        Ok(_) => {
            eprintln!("Error: no recognized channel logs found");
            return exit_codes::INPUT_ERROR;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let request = match params::build_request(&args) {
        Ok(r) => r,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if !args.quiet {
        eprintln!("Correcting {} channel log(s)...", manifest.len());
        eprintln!(
            "  Windows: smoothing={}, drift={}, trim={}",
            request.smoothing_window, request.drift_window, request.grid_trim
        );
        eprintln!("  Stages: {:?}", request.stages);
    }

    let channels = match manifest.load(&request.time_window) {
        Ok(set) => set,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let runner = match CorrectionRunner::new(request) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    match runner.run(&channels) {
        Ok(result) => match output::to_json(&result, args.compact) {
            Ok(json) => {
                if let Err(e) = output::write_output(&json, args.output.as_deref()) {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
                if !args.quiet {
                    eprintln!(
                        "Residual noise: {:.4} uV RMS ({:.4} mK)",
                        result.noise_smoothed.std_dev_uv, result.noise_smoothed.noise_mk
                    );
                    if let Some(ref path) = args.output {
                        eprintln!("Results written to {}", path);
                    }
                }
                exit_codes::SUCCESS
            }
            Err(e) => {
                eprintln!("Error serializing result: {}", e);
                exit_codes::EXECUTION_ERROR
            }
        },
        Err(e) => {
            eprintln!("Correction failed: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}
