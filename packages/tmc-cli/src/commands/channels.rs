use serde::Serialize;
use tmc_rs::ChannelId;

use crate::cli::ChannelsArgs;
use crate::exit_codes;
use crate::output;

#[derive(Serialize)]
struct ChannelInfo {
    name: &'static str,
    raw_unit: &'static str,
    analysis_unit: &'static str,
    description: &'static str,
}

pub fn execute(args: ChannelsArgs) -> i32 {
    let channels: Vec<ChannelInfo> = ChannelId::ALL
        .iter()
        .map(|id| ChannelInfo {
            name: id.as_str(),
            raw_unit: id.raw_unit(),
            analysis_unit: id.analysis_unit(),
            description: id.description(),
        })
        .collect();

    if args.json {
        match output::to_json(&channels, false) {
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
    } else {
        println!(
            "{:<20} {:<9} {:<14} DESCRIPTION",
            "NAME", "RAW UNIT", "ANALYSIS UNIT"
        );
        for info in &channels {
            println!(
                "{:<20} {:<9} {:<14} {}",
                info.name, info.raw_unit, info.analysis_unit, info.description
            );
        }
    }

    exit_codes::SUCCESS
}
