use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// Wall-clock timings of the pipeline stages of one run.
#[derive(Debug, Default)]
pub struct StageTimings {
    entries: Vec<(String, f64)>,
}

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a closure and record how long it took under the given label.
    pub fn time<T>(&mut self, label: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        let ms = start.elapsed().as_secs_f64() * 1000.0;
        log::debug!("{}: {:.3} ms", label, ms);
        self.entries.push((label.to_string(), ms));
        out
    }

    /// Recorded (label, milliseconds) pairs, in execution order.
    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn total_ms(&self) -> f64 {
        self.entries.iter().map(|(_, ms)| ms).sum()
    }

    /// Append this run's timings to the shared profile log. Best effort;
    /// a failure is only worth a warning.
    pub fn flush_to_disk(&self) {
        if self.entries.is_empty() {
            return;
        }
        if let Err(e) = self.append_to(&profile_log_path()) {
            log::warn!("failed to write profile log: {}", e);
        }
    }

    fn append_to(&self, path: &PathBuf) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let stamp = chrono::Utc::now().to_rfc3339();
        for (label, ms) in &self.entries {
            writeln!(file, "{} | {} | {:.3}ms", stamp, label, ms)?;
        }
        Ok(())
    }
}

fn profile_log_path() -> PathBuf {
    let app_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tmc");
    std::fs::create_dir_all(&app_dir).ok();
    app_dir.join("stage_timings.log")
}
