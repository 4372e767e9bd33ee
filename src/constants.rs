//! Application constants for the CTD processor
//!
//! Column aliases, source-format markers, fill values and the physical
//! constants used by the seawater conversions.

// =============================================================================
// Archive and Output Naming
// =============================================================================

/// File extension of source archives (matched case-insensitively)
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Default glob for archive members that hold CTD casts
pub const DEFAULT_MEMBER_PATTERN: &str = "*.csv";

/// Suffix appended to the archive id for intermediate per-archive files
pub const PROCESSED_FILE_SUFFIX: &str = "_processed";

/// Suffix appended to an output CSV path for its provenance sidecar
pub const PROVENANCE_SUFFIX: &str = ".provenance.json";

/// Default output locations
pub const DEFAULT_PROCESSED_FOLDER: &str = "processed_data";
pub const DEFAULT_AGGREGATED_CSV: &str = "aggregated.csv";
pub const DEFAULT_FINAL_CSV: &str = "Train_data.csv";

/// Decimal places written for every numeric CSV field
pub const DEFAULT_FLOAT_PRECISION: usize = 4;

// =============================================================================
// Source Format Markers
// =============================================================================

/// Leading characters that mark a documentation or comment line
pub const COMMENT_MARKERS: &[char] = &['#', '*', '!', '%'];

/// Keywords that open a header-only line in exchange-format files
pub const HEADER_KEYWORDS: &[&str] = &["CTD", "BOTTLE", "NUMBER_HEADERS", "END_DATA"];

/// End of the data section in WOCE exchange files
pub const END_DATA_MARKER: &str = "END_DATA";

/// Sentinel values that stand for "no measurement" across CTD sources
pub const FILL_VALUES: &[f64] = &[-999.0, -9999.0, 9999.0, 99999.0];

/// WOCE quality flags that disqualify a measurement
pub mod woce_flags {
    /// Bad measurement
    pub const BAD: i64 = 4;

    /// Not reported / not sampled
    pub const NOT_SAMPLED: i64 = 9;

    pub const REJECTED: &[i64] = &[BAD, NOT_SAMPLED];

    /// Suffix of a WOCE flag column, e.g. `CTDTMP_FLAG_W`
    pub const COLUMN_SUFFIX: &str = "_FLAG_W";
}

// =============================================================================
// Column Aliases
// =============================================================================

/// Upper-cased header names recognised for each physical quantity
pub mod aliases {
    pub const PRESSURE: &[&str] = &["CTDPRS", "PRES", "PRESSURE", "PRS"];
    pub const DEPTH: &[&str] = &["DEPTH", "DEPTH_M", "DEPSM"];
    pub const TEMPERATURE: &[&str] = &["CTDTMP", "TEMP", "TEMPERATURE", "T090C", "TEMP_C"];
    pub const SALINITY: &[&str] = &["CTDSAL", "SALINITY", "SAL", "PSAL", "SAL00"];
    pub const CONDUCTIVITY: &[&str] = &["CONDUCTIVITY", "COND", "CTDCOND", "C0SM"];
    pub const LATITUDE: &[&str] = &["LATITUDE", "LAT"];
    pub const LONGITUDE: &[&str] = &["LONGITUDE", "LON", "LONG"];

    /// Columns holding free text in regional cast files
    pub const TEXT_COLUMNS: &[&str] = &["STATION", "STNNBR", "CAST", "CASTNO", "DATE", "TIME", "ID", "CRUISE"];
}

/// Canonical WOCE exchange column names
pub mod woce_columns {
    pub const PRESSURE: &str = "CTDPRS";
    pub const TEMPERATURE: &str = "CTDTMP";
    pub const SALINITY: &str = "CTDSAL";
}

// =============================================================================
// Seawater Constants
// =============================================================================

/// Conductivity of standard seawater C(35, 15, 0) in mS/cm
pub const STANDARD_CONDUCTIVITY_MS_CM: f64 = 42.914;

/// IPTS-68 to ITS-90 temperature scale factor
pub const T68_FACTOR: f64 = 1.00024;

// =============================================================================
// Validity Ranges
// =============================================================================

pub mod ranges {
    pub const DEPTH_MIN_M: f64 = 0.0;
    pub const DEPTH_MAX_M: f64 = 12_000.0;
    pub const TEMPERATURE_MIN_C: f64 = -2.0;
    pub const TEMPERATURE_MAX_C: f64 = 40.0;
    pub const SALINITY_MIN_PSU: f64 = 0.0;
    pub const SALINITY_MAX_PSU: f64 = 45.0;
    pub const LATITUDE_MAX: f64 = 90.0;
    pub const LONGITUDE_MAX: f64 = 180.0;
}

/// Check if a value is one of the source fill sentinels
pub fn is_fill_value(value: f64) -> bool {
    FILL_VALUES.iter().any(|fill| (value - fill).abs() < 1e-9)
}

/// Check if an upper-cased header name matches one of the given aliases
pub fn matches_alias(name: &str, candidates: &[&str]) -> bool {
    candidates.iter().any(|alias| *alias == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_values() {
        assert!(is_fill_value(-999.0));
        assert!(is_fill_value(-9999.0));
        assert!(is_fill_value(99999.0));
        assert!(!is_fill_value(-999.5));
        assert!(!is_fill_value(0.0));
    }

    #[test]
    fn test_alias_matching() {
        assert!(matches_alias("CTDTMP", aliases::TEMPERATURE));
        assert!(matches_alias("DEPTH", aliases::DEPTH));
        assert!(!matches_alias("ctdtmp", aliases::TEMPERATURE));
        assert!(!matches_alias("CTDOXY", aliases::SALINITY));
    }
}
