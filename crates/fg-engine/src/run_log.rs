//! Record-oriented run logging.
//!
//! Every call has a no-op default so sinks implement only what they record.

use chrono::Utc;
use fg_types::{OptimizationResult, OptimizationSettings};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

fn join_parameters(parameters: &[Decimal]) -> String {
    parameters
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Sink for the per-run record stream.
pub trait RunLog: Send {
    fn log_settings(&mut self, _preset: &str, _settings: &OptimizationSettings) {}

    fn log_iteration(&mut self, _iteration: u64) {}

    fn log_parameters(&mut self, _parameters: &[Decimal], _elapsed: Duration) {}

    fn log_function_value(&mut self, _parameters: &[Decimal], _value: f64, _elapsed: Duration) {}

    fn log_current_best(
        &mut self,
        _parameters: &[Decimal],
        _value: f64,
        _total: Duration,
        _since_improvement: u64,
    ) {
    }

    fn log_result(&mut self, _result: &OptimizationResult, _total: Duration, _settings: &OptimizationSettings) {}
}

impl RunLog for Vec<Box<dyn RunLog>> {
    fn log_settings(&mut self, preset: &str, settings: &OptimizationSettings) {
        self.iter_mut().for_each(|log| log.log_settings(preset, settings));
    }

    fn log_iteration(&mut self, iteration: u64) {
        self.iter_mut().for_each(|log| log.log_iteration(iteration));
    }

    fn log_parameters(&mut self, parameters: &[Decimal], elapsed: Duration) {
        self.iter_mut().for_each(|log| log.log_parameters(parameters, elapsed));
    }

    fn log_function_value(&mut self, parameters: &[Decimal], value: f64, elapsed: Duration) {
        self.iter_mut()
            .for_each(|log| log.log_function_value(parameters, value, elapsed));
    }

    fn log_current_best(&mut self, parameters: &[Decimal], value: f64, total: Duration, since_improvement: u64) {
        self.iter_mut()
            .for_each(|log| log.log_current_best(parameters, value, total, since_improvement));
    }

    fn log_result(&mut self, result: &OptimizationResult, total: Duration, settings: &OptimizationSettings) {
        self.iter_mut().for_each(|log| log.log_result(result, total, settings));
    }
}

/// Forwards records to `tracing` at debug level, results at info.
#[derive(Debug, Default)]
pub struct TracingRunLog;

impl RunLog for TracingRunLog {
    fn log_settings(&mut self, preset: &str, settings: &OptimizationSettings) {
        info!(
            preset,
            direction = ?settings.direction,
            max_iterations = ?settings.max_iterations,
            max_iterations_no_progress = ?settings.max_iterations_no_progress,
            max_duration = ?settings.max_duration,
            "run settings"
        );
    }

    fn log_iteration(&mut self, iteration: u64) {
        debug!(iteration, "iteration started");
    }

    fn log_parameters(&mut self, parameters: &[Decimal], elapsed: Duration) {
        debug!(parameters = %join_parameters(parameters), elapsed_ms = elapsed.as_millis() as u64, "parameters");
    }

    fn log_function_value(&mut self, _parameters: &[Decimal], value: f64, elapsed: Duration) {
        debug!(value, elapsed_ms = elapsed.as_millis() as u64, "function value");
    }

    fn log_current_best(&mut self, parameters: &[Decimal], value: f64, total: Duration, since_improvement: u64) {
        debug!(
            best = value,
            parameters = %join_parameters(parameters),
            total_ms = total.as_millis() as u64,
            since_improvement,
            "current best"
        );
    }

    fn log_result(&mut self, result: &OptimizationResult, total: Duration, _settings: &OptimizationSettings) {
        info!(
            result_type = ?result.result_type(),
            value = result.value(),
            iterations = result.iterations(),
            total_s = total.as_secs_f64(),
            "run result"
        );
    }
}

/// Appends `document<TAB>parameters<TAB>value` lines for every evaluation,
/// framed by a settings header and a result footer.
pub struct FileRunLog {
    path: PathBuf,
    document_name: String,
    writer: BufWriter<File>,
}

impl FileRunLog {
    pub fn create(path: impl Into<PathBuf>, document_name: impl Into<String>) -> io::Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        info!("Run log opened at {}", path.display());
        Ok(Self {
            path,
            document_name: document_name.into(),
            writer: BufWriter::new(file),
        })
    }

    /// `<document dir>/<name>.txt`, with `_<run>` appended to the name when requested.
    pub fn path_for(document_path: &Path, log_name: &str, run: Option<usize>) -> PathBuf {
        let dir = document_path.parent().unwrap_or_else(|| Path::new(""));
        let name = match run {
            Some(run) => format!("{log_name}_{run}.txt"),
            None => format!("{log_name}.txt"),
        };
        dir.join(name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.writer, "{line}") {
            warn!("Failed to write run log {}: {}", self.path.display(), e);
        }
    }
}

impl RunLog for FileRunLog {
    fn log_settings(&mut self, preset: &str, settings: &OptimizationSettings) {
        self.write_line(&format!("# {} preset={}", Utc::now().to_rfc3339(), preset));
        match serde_json::to_string(settings) {
            Ok(json) => self.write_line(&format!("# settings {json}")),
            Err(e) => warn!("Failed to serialize settings for run log: {}", e),
        }
    }

    fn log_function_value(&mut self, parameters: &[Decimal], value: f64, _elapsed: Duration) {
        let line = format!("{}\t{}\t{}", self.document_name, join_parameters(parameters), value);
        self.write_line(&line);
    }

    fn log_result(&mut self, result: &OptimizationResult, total: Duration, settings: &OptimizationSettings) {
        for line in result.summary(settings).lines() {
            self.write_line(&format!("# {line}"));
        }
        self.write_line(&format!("# Total time: {:.3} s", total.as_secs_f64()));
        if let Err(e) = self.writer.flush() {
            warn!("Failed to flush run log {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for FileRunLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
