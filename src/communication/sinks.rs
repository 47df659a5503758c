// communication/sinks.rs

use crate::error::SinkError;
use crate::shared_data::{CongestionAlert, TelemetryRecord};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Downstream store for sampled telemetry. Best effort: the simulation logs
/// a failure and moves on.
pub trait TelemetrySink: Send {
    fn accept(&mut self, record: &TelemetryRecord) -> Result<(), SinkError>;
}

/// Downstream store for congestion alerts. Resolving alerts is the sink's
/// business, not the simulator's.
pub trait AlertSink: Send {
    fn accept(&mut self, alert: &CongestionAlert) -> Result<(), SinkError>;
}

/// Appends a record to a CSV file, writing the header only for a new file.
fn log_to_csv<T: Serialize>(path: &Path, record: &T) -> Result<(), SinkError> {
    let file_exists = path.exists();
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    Ok(())
}

/// Sink that appends every record to a CSV file.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TelemetrySink for CsvSink {
    fn accept(&mut self, record: &TelemetryRecord) -> Result<(), SinkError> {
        log_to_csv(&self.path, record)
    }
}

impl AlertSink for CsvSink {
    fn accept(&mut self, alert: &CongestionAlert) -> Result<(), SinkError> {
        log_to_csv(&self.path, alert)
    }
}

/// Sink that only writes to the log. Used when no file is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn accept(&mut self, record: &TelemetryRecord) -> Result<(), SinkError> {
        log::info!(
            "Sample: {} on {} at ({:.6}, {:.6}) {:.2} km/h [{}]",
            record.vehicle_id,
            record.road_name,
            record.latitude,
            record.longitude,
            record.speed,
            record.congestion_level
        );
        Ok(())
    }
}

impl AlertSink for LogSink {
    fn accept(&mut self, alert: &CongestionAlert) -> Result<(), SinkError> {
        log::info!(
            "Congestion alert {}: {} ({}) severity {} avg {:.2} km/h over {} vehicles",
            alert.alert_id,
            alert.road_name,
            alert.road_id,
            alert.severity,
            alert.avg_speed,
            alert.vehicle_count
        );
        Ok(())
    }
}
