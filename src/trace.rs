//! Fading trace records and CSV output

use std::path::Path;

use csv::WriterBuilder;
use serde::Serialize;

use crate::channel::ChannelType;
use crate::FadingError;

/// One reported fading value. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FadingTraceRecord {
    pub time_s: f64,
    pub channel: ChannelType,
    pub elevation_deg: f64,
    pub velocity_mps: f64,
    pub set: usize,
    pub state: usize,
    /// Gain in dB, or linear when the engine reports linear values
    pub value: f64,
}

pub const TRACE_HEADER: [&str; 7] = [
    "time_s",
    "channel",
    "elevation_deg",
    "velocity_mps",
    "set",
    "state",
    "value",
];

pub fn write_trace_csv(path: &Path, records: &[FadingTraceRecord]) -> Result<(), FadingError> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;

    wtr.write_record(TRACE_HEADER)?;
    for record in records {
        wtr.serialize(record)?;
    }

    wtr.flush()?;
    Ok(())
}
