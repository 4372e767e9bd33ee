//! Core data structures for CTD extraction and aggregation.
//!
//! Defines the record types that flow through the pipeline (raw lines,
//! raw records, normalized and canonical records), the canonical column
//! set, and the statistics returned at the end of a run.

use crate::features::SoundSpeedFormula;
use crate::schema::SourceLayout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// One line of member text with its provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLine<'a> {
    pub member: &'a str,
    /// 1-based line number within the member
    pub number: usize,
    pub text: &'a str,
}

/// A typed field of a raw data row
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Number(f64),
    Text(String),
    Empty,
}

impl Field {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Field::Number(value) => Some(*value),
            _ => None,
        }
    }
}

/// A data row in its source layout
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub fields: Vec<Field>,
    pub member: Arc<str>,
    pub line_number: usize,
}

impl RawRecord {
    /// Numeric value at a column position, if the field holds one
    pub fn number(&self, index: usize) -> Option<f64> {
        self.fields.get(index).and_then(Field::as_number)
    }
}

/// A record mapped onto the canonical schema, before derived features
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub depth_m: f64,
    pub pressure_dbar: f64,
    pub temperature_c: f64,
    pub salinity_psu: f64,
    pub source_id: Arc<str>,
}

/// A fully enriched row of the output dataset
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub depth_m: f64,
    pub pressure_dbar: f64,
    pub temperature_c: f64,
    pub salinity_psu: f64,
    pub sound_speed_mps: f64,
    pub source_id: Arc<str>,
}

/// Columns of the canonical output schema, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalColumn {
    Latitude,
    Longitude,
    DepthM,
    PressureDbar,
    TemperatureC,
    SalinityPsu,
    SoundSpeedMps,
    SourceId,
}

impl CanonicalColumn {
    pub const ALL: [CanonicalColumn; 8] = [
        CanonicalColumn::Latitude,
        CanonicalColumn::Longitude,
        CanonicalColumn::DepthM,
        CanonicalColumn::PressureDbar,
        CanonicalColumn::TemperatureC,
        CanonicalColumn::SalinityPsu,
        CanonicalColumn::SoundSpeedMps,
        CanonicalColumn::SourceId,
    ];

    /// Header name written to CSV
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalColumn::Latitude => "latitude",
            CanonicalColumn::Longitude => "longitude",
            CanonicalColumn::DepthM => "depth_m",
            CanonicalColumn::PressureDbar => "pressure_dbar",
            CanonicalColumn::TemperatureC => "temperature_c",
            CanonicalColumn::SalinityPsu => "salinity_psu",
            CanonicalColumn::SoundSpeedMps => "sound_speed_mps",
            CanonicalColumn::SourceId => "source_id",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|column| column.name() == name)
    }

    /// Columns used for the training file: every numeric column
    pub fn training_columns() -> Vec<CanonicalColumn> {
        Self::ALL
            .into_iter()
            .filter(|column| *column != CanonicalColumn::SourceId)
            .collect()
    }
}

impl fmt::Display for CanonicalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a row was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Line failed the row shape check
    Malformed,
    /// A bound column held no value
    MissingField(&'static str),
    /// A bound column held a fill sentinel
    FillValue(&'static str),
    /// A WOCE quality flag marked the measurement bad
    BadQualityFlag(&'static str),
    /// A value fell outside its valid range
    OutOfRange(&'static str),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Malformed => write!(f, "malformed row"),
            RejectReason::MissingField(field) => write!(f, "missing {}", field),
            RejectReason::FillValue(field) => write!(f, "fill value in {}", field),
            RejectReason::BadQualityFlag(field) => write!(f, "bad quality flag on {}", field),
            RejectReason::OutOfRange(field) => write!(f, "{} out of range", field),
        }
    }
}

/// Tally of rejected rows by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    pub malformed: usize,
    pub missing_field: usize,
    pub fill_value: usize,
    pub bad_quality_flag: usize,
    pub out_of_range: usize,
}

impl RejectionCounts {
    pub fn record(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::Malformed => self.malformed += 1,
            RejectReason::MissingField(_) => self.missing_field += 1,
            RejectReason::FillValue(_) => self.fill_value += 1,
            RejectReason::BadQualityFlag(_) => self.bad_quality_flag += 1,
            RejectReason::OutOfRange(_) => self.out_of_range += 1,
        }
    }

    pub fn merge(&mut self, other: &RejectionCounts) {
        self.malformed += other.malformed;
        self.missing_field += other.missing_field;
        self.fill_value += other.fill_value;
        self.bad_quality_flag += other.bad_quality_flag;
        self.out_of_range += other.out_of_range;
    }

    pub fn total(&self) -> usize {
        self.malformed + self.missing_field + self.fill_value + self.bad_quality_flag + self.out_of_range
    }
}

/// Outcome of one processed archive
#[derive(Debug, Clone, Default)]
pub struct ArchiveStats {
    pub archive_id: String,
    pub members_read: usize,
    pub members_ignored: usize,
    pub accepted: usize,
    pub rejected: RejectionCounts,
    pub layouts: BTreeSet<SourceLayout>,
    pub processed_csv: PathBuf,
}

/// An archive that was left out of the dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArchive {
    pub archive_id: String,
    pub reason: String,
}

/// Run-level summary returned by the aggregator
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub archives: Vec<ArchiveStats>,
    pub skipped: Vec<SkippedArchive>,
    pub records_accepted: usize,
    pub rejected: RejectionCounts,
    pub aggregated_csv: PathBuf,
    pub final_csv: PathBuf,
    pub formula: SoundSpeedFormula,
    pub processing_time_ms: u128,
}

impl RunSummary {
    pub fn archives_processed(&self) -> usize {
        self.archives.len()
    }

    pub fn archives_skipped(&self) -> usize {
        self.skipped.len()
    }

    pub fn records_rejected(&self) -> usize {
        self.rejected.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_column_order() {
        let names: Vec<&str> = CanonicalColumn::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "latitude",
                "longitude",
                "depth_m",
                "pressure_dbar",
                "temperature_c",
                "salinity_psu",
                "sound_speed_mps",
                "source_id"
            ]
        );
    }

    #[test]
    fn test_training_columns_drop_source_id() {
        let columns = CanonicalColumn::training_columns();
        assert_eq!(columns.len(), 7);
        assert!(!columns.contains(&CanonicalColumn::SourceId));
        assert_eq!(columns.last(), Some(&CanonicalColumn::SoundSpeedMps));
    }

    #[test]
    fn test_column_name_round_trip() {
        assert_eq!(
            CanonicalColumn::from_name("salinity_psu"),
            Some(CanonicalColumn::SalinityPsu)
        );
        assert_eq!(CanonicalColumn::from_name("salinity"), None);
    }

    #[test]
    fn test_rejection_counts() {
        let mut counts = RejectionCounts::default();
        counts.record(RejectReason::Malformed);
        counts.record(RejectReason::OutOfRange("temperature_c"));
        counts.record(RejectReason::OutOfRange("salinity_psu"));

        let mut other = RejectionCounts::default();
        other.record(RejectReason::FillValue("pressure_dbar"));
        counts.merge(&other);

        assert_eq!(counts.malformed, 1);
        assert_eq!(counts.out_of_range, 2);
        assert_eq!(counts.fill_value, 1);
        assert_eq!(counts.total(), 4);
    }
}
