//! Delimited TMC log ingestion.
//!
//! The acquisition software writes one file per readout quantity, named by
//! kind (`2N2222`, `TestCurrent`, `ADCBaseline`, `ADCTemps`, `BoardTemps`).
//! Each line is a timestamp, a tab, and whitespace-separated values; the
//! target log has one value, the auxiliary logs one column per ADC or per
//! board.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{Result, TmcError};
use crate::types::{ChannelId, ChannelSet, TimeSeries, TimeWindow};

/// Timestamp format used by the TMC logger, e.g. `2016/03/10-13:10:22`.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y/%m/%d-%H:%M:%S";

/// Parse a log timestamp into seconds since the Unix epoch.
pub fn parse_timestamp(s: &str) -> Result<f64> {
    NaiveDateTime::parse_from_str(s.trim(), LOG_TIMESTAMP_FORMAT)
        .map(|dt| dt.and_utc().timestamp() as f64)
        .map_err(|_| {
            TmcError::IngestionError(format!(
                "bad timestamp '{}' (expected YYYY/MM/DD-hh:mm:ss)",
                s.trim()
            ))
        })
}

/// Classify a log file by the kind marker in its name.
pub fn classify_log(file_name: &str) -> Option<ChannelId> {
    if file_name.contains("2N2222") {
        Some(ChannelId::TargetVoltage)
    } else if file_name.contains("TestCurrent") {
        Some(ChannelId::ExcitationCurrent)
    } else if file_name.contains("ADCBaseline") {
        Some(ChannelId::Baseline)
    } else if file_name.contains("ADCTemps") {
        Some(ChannelId::AdcTemp)
    } else if file_name.contains("BoardTemps") {
        Some(ChannelId::BoardTemp)
    } else {
        None
    }
}

/// Readout indices decoded from the target log's system channel number.
///
/// The acquisition software names the target log `<prefix>-<sch>_2N2222...`
/// where sch = 6 * adc + channel; boards carry three ADCs each. The
/// auxiliary logs put one column per ADC (or per board), so the address
/// picks the column to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadoutAddress {
    pub channel: usize,
    pub adc: usize,
    pub board: usize,
}

impl ReadoutAddress {
    pub fn from_system_channel(sch: usize) -> Self {
        let adc = sch / 6;
        Self {
            channel: sch % 6,
            adc,
            board: adc / 3,
        }
    }

    /// Decode the system channel number between '-' and '_' in a target
    /// log name.
    pub fn from_log_name(name: &str) -> Result<Self> {
        let sch = name
            .split('-')
            .nth(1)
            .and_then(|s| s.split('_').next())
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| {
                TmcError::IngestionError(format!(
                    "cannot decode a system channel number from '{}'",
                    name
                ))
            })?;
        Ok(Self::from_system_channel(sch))
    }

    /// Column of the given channel's log holding this address's data.
    pub fn column_for(&self, id: ChannelId) -> usize {
        match id {
            ChannelId::TargetVoltage => 0,
            ChannelId::BoardTemp => self.board,
            ChannelId::ExcitationCurrent | ChannelId::Baseline | ChannelId::AdcTemp => self.adc,
        }
    }
}

/// Read one channel log into a TimeSeries in analysis units.
///
/// Samples outside the time window are skipped; duplicate or out-of-order
/// timestamps and non-finite values are dropped with a warning. A file that
/// yields no samples at all is an ingestion error.
pub fn read_channel_log(
    path: &Path,
    id: ChannelId,
    column: usize,
    window: &TimeWindow,
) -> Result<TimeSeries> {
    window.validate()?;
    if !path.is_file() {
        return Err(TmcError::IngestionError(format!(
            "log file not found: {}",
            path.display()
        )));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut samples = Vec::new();
    let mut outside_window = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (stamp, payload) = line.split_once('\t').ok_or_else(|| {
            TmcError::IngestionError(format!(
                "{}:{}: expected '<timestamp><TAB><values>'",
                path.display(),
                lineno + 1
            ))
        })?;
        let t = parse_timestamp(stamp).map_err(|_| {
            TmcError::IngestionError(format!(
                "{}:{}: bad timestamp '{}'",
                path.display(),
                lineno + 1,
                stamp
            ))
        })?;
        if !window.contains(t) {
            outside_window += 1;
            continue;
        }
        let raw = payload
            .split_whitespace()
            .nth(column)
            .ok_or_else(|| {
                TmcError::IngestionError(format!(
                    "{}:{}: no value column {}",
                    path.display(),
                    lineno + 1,
                    column
                ))
            })?
            .parse::<f64>()
            .map_err(|e| {
                TmcError::IngestionError(format!(
                    "{}:{}: bad value in column {}: {}",
                    path.display(),
                    lineno + 1,
                    column,
                    e
                ))
            })?;
        samples.push((t, id.to_analysis_units(raw)));
    }

    if samples.is_empty() {
        return Err(TmcError::IngestionError(format!(
            "'{}' yielded no samples inside the requested window",
            path.display()
        )));
    }
    let (series, dropped) = TimeSeries::from_samples(samples)?;
    if dropped > 0 {
        log::warn!(
            "{}: dropped {} out-of-order or non-finite samples",
            path.display(),
            dropped
        );
    }
    log::debug!(
        "{}: {} samples kept, {} outside window",
        path.display(),
        series.len(),
        outside_window
    );
    Ok(series)
}

/// Channel logs resolved for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct LogManifest {
    entries: Vec<(ChannelId, PathBuf)>,
    address: ReadoutAddress,
}

impl LogManifest {
    /// Classify a set of log paths. The readout address is decoded from
    /// the target log's name; without a target log (or a decodable name)
    /// the auxiliary logs fall back to their first column.
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        let mut entries = Vec::new();
        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            match classify_log(&name) {
                Some(id) => entries.push((id, path)),
                None => log::debug!("ignoring unrecognized log '{}'", path.display()),
            }
        }

        let address = entries
            .iter()
            .find(|(id, _)| *id == ChannelId::TargetVoltage)
            .and_then(|(_, path)| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                match ReadoutAddress::from_log_name(name) {
                    Ok(addr) => Some(addr),
                    Err(e) => {
                        log::warn!("{}; using column 0 for auxiliary logs", e);
                        None
                    }
                }
            })
            .unwrap_or_default();

        LogManifest { entries, address }
    }

    /// Read a file list: one path per line, '#' comments and blanks skipped.
    pub fn from_list_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TmcError::IngestionError(format!("cannot read file list '{}': {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let paths = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| {
                let p = PathBuf::from(l);
                if p.is_relative() {
                    base.join(p)
                } else {
                    p
                }
            })
            .collect();
        Ok(Self::from_paths(paths))
    }

    /// Discover channel logs in a directory by the acquisition software's
    /// naming scheme.
    pub fn discover(dir: &Path) -> Result<Self> {
        let pattern = dir.join("*").to_string_lossy().into_owned();
        let mut paths = Vec::new();
        for entry in glob::glob(&pattern).map_err(|e| {
            TmcError::IngestionError(format!("bad glob pattern '{}': {}", pattern, e))
        })? {
            match entry {
                Ok(p) if p.is_file() => paths.push(p),
                Ok(_) => {}
                Err(e) => log::warn!("skipping unreadable directory entry: {}", e),
            }
        }
        Ok(Self::from_paths(paths))
    }

    pub fn entries(&self) -> &[(ChannelId, PathBuf)] {
        &self.entries
    }

    pub fn address(&self) -> ReadoutAddress {
        self.address
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Load every classified channel, filtered to the window.
    pub fn load(&self, window: &TimeWindow) -> Result<ChannelSet> {
        if self.entries.is_empty() {
            return Err(TmcError::IngestionError(
                "no recognized channel logs to load".to_string(),
            ));
        }
        let mut set = ChannelSet::new();
        for (id, path) in &self.entries {
            let column = self.address.column_for(*id);
            let series = read_channel_log(path, *id, column, window)?;
            log::info!(
                "loaded '{}' from {} ({} samples)",
                id,
                path.display(),
                series.len()
            );
            if set.insert(*id, series).is_some() {
                log::warn!("duplicate '{}' log; keeping {}", id, path.display());
            }
        }
        Ok(set)
    }
}
