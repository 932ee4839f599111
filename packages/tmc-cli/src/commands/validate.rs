use std::path::Path;

use serde::Serialize;
use tmc_rs::{classify_log, read_channel_log, ReadoutAddress, TimeWindow};

use crate::cli::ValidateArgs;
use crate::exit_codes;
use crate::output;

#[derive(Serialize)]
struct ValidateOutput {
    file: String,
    exists: bool,
    channel: Option<String>,
    samples: Option<usize>,
    first_timestamp: Option<String>,
    last_timestamp: Option<String>,
    error: Option<String>,
}

fn format_stamp(t: f64) -> String {
    chrono::DateTime::from_timestamp(t as i64, 0)
        .map(|dt| dt.format("%Y/%m/%d-%H:%M:%S").to_string())
        .unwrap_or_else(|| format!("{}", t))
}

pub fn execute(args: ValidateArgs) -> i32 {
    let path = Path::new(&args.file);
    let exists = path.is_file();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let channel = classify_log(name);

    let mut result = ValidateOutput {
        file: args.file.clone(),
        exists,
        channel: channel.map(|id| id.as_str().to_string()),
        samples: None,
        first_timestamp: None,
        last_timestamp: None,
        error: None,
    };

    if !exists {
        result.error = Some(format!("File not found: {}", args.file));
    } else {
        match channel {
            None => {
                result.error = Some(format!(
                    "Unrecognized log name '{}'. Expected one of: 2N2222, TestCurrent, \
                     ADCBaseline, ADCTemps, BoardTemps",
                    name
                ));
            }
            Some(id) => {
                let column = args.column.unwrap_or_else(|| {
                    ReadoutAddress::from_log_name(name)
                        .map(|addr| addr.column_for(id))
                        .unwrap_or(0)
                });
                match read_channel_log(path, id, column, &TimeWindow::all()) {
                    Ok(series) => {
                        result.samples = Some(series.len());
                        result.first_timestamp = series.first_timestamp().map(format_stamp);
                        result.last_timestamp = series.last_timestamp().map(format_stamp);
                    }
                    Err(e) => result.error = Some(e.to_string()),
                }
            }
        }
    }

    let ok = result.error.is_none();

    if args.json {
        match output::to_json(&result, false) {
            Ok(json) => {
                if let Err(e) = output::write_output(&json, None) {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else if ok {
        println!("{}: OK", args.file);
        if let Some(channel) = &result.channel {
            println!("  channel: {}", channel);
        }
        if let Some(samples) = result.samples {
            println!("  samples: {}", samples);
        }
        if let (Some(first), Some(last)) = (&result.first_timestamp, &result.last_timestamp) {
            println!("  span:    {} .. {}", first, last);
        }
    } else if let Some(error) = &result.error {
        eprintln!("{}: {}", args.file, error);
    }

    if ok {
        exit_codes::SUCCESS
    } else {
        exit_codes::INPUT_ERROR
    }
}
