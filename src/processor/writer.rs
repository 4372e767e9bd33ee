//! CSV writing module for CTD datasets
//!
//! Serializes canonical records through a polars `DataFrame` into CSV with
//! fixed-point numerics, and writes the provenance sidecar describing how a
//! dataset was produced.

use crate::constants::PROVENANCE_SUFFIX;
use crate::error::{CtdError, Result};
use crate::features::SoundSpeedFormula;
use crate::models::{CanonicalColumn, CanonicalRecord};
use crate::schema::SourceLayout;

use polars::prelude::{Column, CsvWriter, DataFrame, SerWriter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes canonical records to CSV
#[derive(Debug, Clone, Copy)]
pub struct CsvOutputWriter {
    float_precision: usize,
}

impl CsvOutputWriter {
    pub fn new(float_precision: usize) -> Self {
        Self { float_precision }
    }

    /// Build a frame holding the requested columns in order
    pub fn to_dataframe(records: &[CanonicalRecord], columns: &[CanonicalColumn]) -> Result<DataFrame> {
        let numeric = |value: fn(&CanonicalRecord) -> f64| -> Vec<f64> {
            records.iter().map(value).collect()
        };

        let frame_columns = columns
            .iter()
            .map(|column| {
                let name = column.name().into();
                match column {
                    CanonicalColumn::Latitude => Column::new(name, numeric(|r| r.latitude)),
                    CanonicalColumn::Longitude => Column::new(name, numeric(|r| r.longitude)),
                    CanonicalColumn::DepthM => Column::new(name, numeric(|r| r.depth_m)),
                    CanonicalColumn::PressureDbar => Column::new(name, numeric(|r| r.pressure_dbar)),
                    CanonicalColumn::TemperatureC => Column::new(name, numeric(|r| r.temperature_c)),
                    CanonicalColumn::SalinityPsu => Column::new(name, numeric(|r| r.salinity_psu)),
                    CanonicalColumn::SoundSpeedMps => Column::new(name, numeric(|r| r.sound_speed_mps)),
                    CanonicalColumn::SourceId => Column::new(
                        name,
                        records.iter().map(|r| &*r.source_id).collect::<Vec<&str>>(),
                    ),
                }
            })
            .collect();

        Ok(DataFrame::new(frame_columns)?)
    }

    /// Write records to `path`, replacing any previous file.
    ///
    /// An empty record set still produces the header row.
    pub fn write_csv(
        &self,
        records: &[CanonicalRecord],
        columns: &[CanonicalColumn],
        path: &Path,
    ) -> Result<usize> {
        let mut df = Self::to_dataframe(records, columns)?;

        ensure_parent(path)?;
        let mut file = File::create(path).map_err(|e| CtdError::output_write(path, e))?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_float_scientific(Some(false))
            .with_float_precision(Some(self.float_precision))
            .finish(&mut df)
            .map_err(|e| CtdError::output_write(path, e))?;

        debug!("Wrote {} rows to {}", df.height(), path.display());
        Ok(df.height())
    }

    /// Write the provenance sidecar next to a CSV
    pub fn write_provenance(&self, provenance: &Provenance, csv_path: &Path) -> Result<PathBuf> {
        let path = provenance_path(csv_path);
        let json = serde_json::to_string_pretty(provenance)?;

        ensure_parent(&path)?;
        fs::write(&path, json + "\n").map_err(|e| CtdError::output_write(&path, e))?;

        debug!("Wrote provenance to {}", path.display());
        Ok(path)
    }
}

/// `<csv>.provenance.json`
pub fn provenance_path(csv_path: &Path) -> PathBuf {
    let mut name = csv_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(PROVENANCE_SUFFIX);
    csv_path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| CtdError::output_write(path, e))
        }
        _ => Ok(()),
    }
}

/// How a dataset was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub generator: String,
    pub version: String,
    pub sound_speed_formula: SoundSpeedFormula,
    pub temperature_scale: String,
    pub salinity_scale: String,
    pub columns: Vec<CanonicalColumn>,
    pub records: usize,
    pub archives: Vec<String>,
    pub layouts: BTreeSet<SourceLayout>,
}

impl Provenance {
    pub fn new(formula: SoundSpeedFormula, columns: &[CanonicalColumn]) -> Self {
        Self {
            generator: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            sound_speed_formula: formula,
            temperature_scale: "ITS-90".to_string(),
            salinity_scale: "PSS-78".to_string(),
            columns: columns.to_vec(),
            records: 0,
            archives: Vec::new(),
            layouts: BTreeSet::new(),
        }
    }

    pub fn with_records(mut self, records: usize) -> Self {
        self.records = records;
        self
    }

    pub fn with_archives(mut self, archives: Vec<String>, layouts: BTreeSet<SourceLayout>) -> Self {
        self.archives = archives;
        self.layouts = layouts;
        self
    }
}
