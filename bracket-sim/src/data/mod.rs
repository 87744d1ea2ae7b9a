pub mod loader;
pub mod source;
pub mod synthetic;

pub use loader::{load_csv, load_json};
pub use source::{BarRange, CsvDirectorySource, InMemorySource, MarketDataSource, Timeframe};
pub use synthetic::{generate_synthetic_bars, SyntheticSource};

use std::path::Path;

use common::{Bar, BarSeries, Result, SimError};

/// Load bars from file, detecting format from extension
pub fn load_file(path: &Path) -> Result<Vec<Bar>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        _ => Err(SimError::DataLoadError(format!(
            "Unsupported file format: {}",
            ext
        ))),
    }
}

/// Load a file as a validated series named after its file stem
pub fn load_series(path: &Path) -> Result<BarSeries> {
    let instrument = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.split('_').next())
        .unwrap_or("UNKNOWN")
        .to_string();
    BarSeries::new(instrument, load_file(path)?)
}
