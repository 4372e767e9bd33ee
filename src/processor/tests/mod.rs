//! Integration tests for the processor module
//!
//! Tests the complete aggregation pipeline over zip archives built in
//! temporary folders.

pub mod determinism;

use crate::config::CtdConfig;
use crate::processor::OutputPaths;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// WOCE exchange cast: two good rows, one flagged bad, one with a fill value
pub const WOCE_CAST: &str = "CTD,20001231WHPSIODFM
#  WOCE hydrographic programme
NUMBER_HEADERS = 5
EXPOCODE = 31WTTUNES_3
LATITUDE = -20.5000
LONGITUDE = 165.2500
CTDPRS,CTDPRS_FLAG_W,CTDTMP,CTDTMP_FLAG_W,CTDSAL,CTDSAL_FLAG_W
DBAR,,ITS-90,,PSS-78,
2.0,2,25.1234,2,35.1000,2
4.0,2,25.1200,2,35.1010,4
6.0,2,-999.0000,9,35.1020,2
8.0,2,25.1100,2,35.1030,2
END_DATA
";

/// Regional cast: three header/comment lines, two valid rows, one malformed
pub const REGIONAL_CAST: &str = "# Regional CTD survey, R/V Example
# Instrument: SBE 911plus
Latitude,Longitude,Depth [m],Temperature [degC],Salinity [PSU]
48.5,-4.75,5.0,12.10,35.10
48.5,-4.75,10.0,11.95,35.12
48.5,-4.75,15.0,11.90
";

/// Nutrient table with no recognisable CTD columns
pub const NUTRIENT_TABLE: &str = "Station,Oxygen,Nitrate
A1,250.1,12.0
";

pub fn write_zip(path: &Path, members: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in members {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

pub fn outputs(root: &Path) -> OutputPaths {
    OutputPaths {
        processed_folder: root.join("processed_data"),
        aggregated_csv: root.join("aggregated.csv"),
        final_csv: root.join("Train_data.csv"),
    }
}

pub fn quiet_config() -> CtdConfig {
    CtdConfig::default().without_progress()
}

/// Data rows of a CSV, header excluded
pub fn data_rows(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}

pub fn header_row(path: &Path) -> String {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}
