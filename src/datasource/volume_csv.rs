//! Parsing monthly volume uploads.
//!
//! Expected layout is a header row followed by one row per month:
//!
//! ```text
//! year,month,units
//! 2024,1,1200
//! 2024,2,1350.5
//! ```

use crate::domain::{Decimal, TimePoint, ValidationError, VolumePoint};
use crate::engine::sorted_series;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("csv parse error on line {line}: {message}")]
    Csv { line: u64, message: String },
    #[error("line {line}: month must be between 1 and 12, got {month}")]
    Month { line: u64, month: u32 },
    #[error("line {line}: invalid units {value:?}")]
    Units { line: u64, value: String },
    #[error("no volume rows")]
    Empty,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Parse a CSV body into a validated series, sorted by month.
///
/// # Errors
/// Fails on malformed rows, months out of range, unparseable or negative
/// units, and months listed twice.
pub fn parse_volume_csv(csv_bytes: &[u8]) -> Result<Vec<VolumePoint>, ImportError> {
    #[derive(Debug, serde::Deserialize)]
    struct Row {
        year: i32,
        month: u32,
        units: String,
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(csv_bytes);

    let mut points = Vec::new();
    for record in reader.deserialize::<Row>() {
        let row = record.map_err(|e| ImportError::Csv {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;
        let line = points.len() as u64 + 2;

        let time = TimePoint::new(row.year, row.month).map_err(|_| ImportError::Month {
            line,
            month: row.month,
        })?;
        let units = Decimal::from_str_canonical(&row.units).map_err(|_| ImportError::Units {
            line,
            value: row.units.clone(),
        })?;
        points.push(VolumePoint::new(time, units));
    }

    if points.is_empty() {
        return Err(ImportError::Empty);
    }

    Ok(sorted_series(&points, "csv volumes")?)
}
