use anyhow::Result;
use chrono::Utc;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

use crate::model::{MergedRow, MERGED_COLUMNS};

/// Writes the rows under a header line, replacing any existing file.
/// The header is written even when there are no rows.
pub fn save_to_csv<P: AsRef<Path>>(data: &[MergedRow], file_path: P) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(file_path)?;

    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
    wtr.write_record(MERGED_COLUMNS)?;

    for row in data {
        wtr.serialize(row)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn generate_filename(year: i32) -> String {
    let now = Utc::now();
    format!("btc_jpy_{}_{}.csv", year, now.format("%Y%m%d_%H%M%S"))
}
