use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tmc",
    version,
    about = "TMC thermometry signal-correction tool",
    long_about = "Correct TMC readout logs for drift, excitation-current pickup and\n\
                  temperature coupling, and report the residual noise."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the correction pipeline over a set of channel logs
    Run(RunArgs),
    /// List the recognized channel kinds
    Channels(ChannelsArgs),
    /// Validate a channel log file
    Validate(ValidateArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// File list with one log path per line ('#' comments allowed)
    #[arg(long, conflicts_with = "data_dir")]
    pub file_list: Option<String>,

    /// Directory to scan for channel logs by name
    #[arg(long)]
    pub data_dir: Option<String>,

    /// JSON file holding a full correction request; other tuning flags
    /// are ignored when given
    #[arg(long)]
    pub config: Option<String>,

    /// Start of the analysis window, YYYY/MM/DD-hh:mm:ss
    #[arg(long)]
    pub tstart: Option<String>,

    /// End of the analysis window, YYYY/MM/DD-hh:mm:ss
    #[arg(long)]
    pub tstop: Option<String>,

    /// Final smoothing window in samples
    #[arg(long, default_value_t = tmc_rs::DEFAULT_SMOOTHING_WINDOW)]
    pub smooth_window: usize,

    /// Drift-estimation window in samples
    #[arg(long, default_value_t = tmc_rs::DEFAULT_DRIFT_WINDOW)]
    pub drift_window: usize,

    /// Samples trimmed from each end of the target channel before
    /// building the query grid
    #[arg(long, default_value_t = tmc_rs::DEFAULT_GRID_TRIM)]
    pub trim: usize,

    /// Sensor setpoint temperature in kelvin
    #[arg(long, default_value_t = tmc_rs::DEFAULT_SETPOINT_TEMP)]
    pub setpoint: f64,

    /// Slope of the resistance-vs-temperature law, ohm per kelvin
    #[arg(long, default_value_t = tmc_rs::DEFAULT_RESISTANCE_SLOPE)]
    pub r_slope: f64,

    /// Intercept of the resistance-vs-temperature law, ohm
    #[arg(long, default_value_t = tmc_rs::DEFAULT_RESISTANCE_INTERCEPT)]
    pub r_intercept: f64,

    /// Sense resistance converting the current channel to amperes, ohm
    #[arg(long, default_value_t = tmc_rs::DEFAULT_NOMINAL_RESISTANCE)]
    pub nominal_resistance: f64,

    /// Skip the dynamic-resistance current correction
    #[arg(long, default_value_t = false)]
    pub no_current_correction: bool,

    /// Enable temperature correction with this scale factor
    #[arg(long)]
    pub temp_scale: Option<f64>,

    /// Temperature channel for the correction (adc_temp or board_temp)
    #[arg(long, default_value = "adc_temp")]
    pub temp_source: String,

    /// Noise calibration in microvolts per millikelvin
    #[arg(long, default_value_t = tmc_rs::DEFAULT_UV_PER_MK)]
    pub uv_per_mk: f64,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct ChannelsArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Channel log file to probe
    #[arg(long)]
    pub file: String,

    /// Column to read (default: decoded from the log name, else 0)
    #[arg(long)]
    pub column: Option<usize>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
