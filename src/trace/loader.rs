//! CSV trace loader.
//!
//! Power analyzer exports carry many columns; only the value and timestamp
//! columns are read. Rows are streamed so the file is never held as text.

use crate::error::{Error, Result};
use crate::trace::types::{Trace, TraceColumns};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Load a trace from a CSV file with a header row.
pub fn load_trace(path: impl AsRef<Path>, columns: &TraceColumns) -> Result<Trace> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let trace = read_trace(file, columns).map_err(|e| match e {
        Error::MalformedTrace(reason) => {
            Error::MalformedTrace(format!("{}: {reason}", path.display()))
        }
        other => other,
    })?;
    debug!(path = %path.display(), samples = trace.len(), "loaded trace");
    Ok(trace)
}

/// Read a trace from any CSV source with a header row.
pub fn read_trace<R: Read>(reader: R, columns: &TraceColumns) -> Result<Trace> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let find = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::MalformedTrace(format!("missing column '{name}'")))
    };
    let value_idx = find(&columns.value)?;
    let time_idx = find(&columns.timestamp)?;

    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    let mut record = csv::StringRecord::new();
    let mut row = 0usize;

    while reader.read_record(&mut record)? {
        row += 1;
        timestamps.push(parse_field(&record, time_idx, &columns.timestamp, row)?);
        values.push(parse_field(&record, value_idx, &columns.value, row)?);
    }

    if values.is_empty() {
        return Err(Error::MalformedTrace("trace has no samples".to_string()));
    }
    Trace::new(timestamps, values)
}

fn parse_field(record: &csv::StringRecord, idx: usize, name: &str, row: usize) -> Result<f64> {
    let raw = record
        .get(idx)
        .ok_or_else(|| Error::MalformedTrace(format!("row {row}: missing '{name}' field")))?;
    raw.parse::<f64>()
        .map_err(|e| Error::MalformedTrace(format!("row {row}: invalid '{name}' value '{raw}': {e}")))
}
