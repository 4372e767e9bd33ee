//! CTD cast header sniffing and metadata extraction.
//!
//! Locates the column header line of a cast file by content, collects
//! `KEY = value` and `# Key: value` metadata that precedes it (cast
//! position in particular), and finds the optional units line and the
//! `END_DATA` marker that bound the data section.

use crate::constants::{COMMENT_MARKERS, END_DATA_MARKER, aliases, matches_alias};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// `KEY = value` or `Key: value`
static METADATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9_ ]*?)\s*[=:]\s*(.*?)[\s,]*$").expect("valid metadata pattern")
});

/// `NAME [unit]` or `NAME (unit)`
static COLUMN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\[\(]+?)\s*(?:[\[\(]\s*([^\]\)]*?)\s*[\]\)])?$").expect("valid column pattern")
});

/// `DD MM.mm H`, `DD° MM.mm' H` or `DD.dd H`
static DEGREES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d+(?:\.\d+)?)(?:[°\s]+(\d+(?:\.\d+)?)'?)?\s*([NSEWnsew])$")
        .expect("valid coordinate pattern")
});

/// One column of the header line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    /// Upper-cased name with spaces folded to underscores
    pub name: String,
    /// Upper-cased unit from brackets or the units line
    pub unit: Option<String>,
}

/// Header facts needed to read the data section of a cast file
#[derive(Debug, Clone, PartialEq)]
pub struct CastHeader {
    pub metadata: BTreeMap<String, String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub columns: Vec<ColumnHeader>,
    /// 0-based index of the column header line
    pub column_line: usize,
    /// 0-based index of the units line, when present
    pub units_line: Option<usize>,
    /// 0-based index of the `END_DATA` line, when present
    pub end_line: Option<usize>,
}

impl CastHeader {
    /// Position of the first column whose name is one of the aliases
    pub fn find_column(&self, candidates: &[&str]) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| matches_alias(&column.name, candidates))
    }

    /// Position of a column with exactly this name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// Check if a line opens with one of the comment markers
pub fn is_comment_line(line: &str) -> bool {
    line.trim_start().starts_with(COMMENT_MARKERS)
}

/// Split a CSV line into trimmed tokens, tolerating one trailing comma
pub fn split_tokens(line: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = line.split(',').map(str::trim).collect();
    if tokens.len() > 1 && tokens.last().is_some_and(|t| t.is_empty()) {
        tokens.pop();
    }
    tokens
}

/// Parse a finite decimal number
pub fn parse_number(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Locate and parse the header of a cast file.
///
/// Returns `None` when no line looks like a CTD column header.
pub fn sniff_cast_header(text: &str) -> Option<CastHeader> {
    let lines: Vec<&str> = text.lines().collect();

    let column_line = lines.iter().position(|line| looks_like_column_header(line))?;
    let mut columns: Vec<ColumnHeader> = split_tokens(lines[column_line])
        .into_iter()
        .map(parse_column_header)
        .collect();

    let units_line = lines
        .get(column_line + 1)
        .filter(|line| looks_like_units_line(line, columns.len()))
        .map(|_| column_line + 1);

    if let Some(index) = units_line {
        for (column, unit) in columns.iter_mut().zip(split_tokens(lines[index])) {
            if column.unit.is_none() && !unit.is_empty() {
                column.unit = Some(unit.to_ascii_uppercase());
            }
        }
    }

    let end_line = lines
        .iter()
        .enumerate()
        .skip(column_line + 1)
        .find(|(_, line)| line.trim().to_ascii_uppercase().starts_with(END_DATA_MARKER))
        .map(|(index, _)| index);

    let metadata = parse_preamble(&lines[..column_line]);
    let latitude = coordinate(&metadata, aliases::LATITUDE);
    let longitude = coordinate(&metadata, aliases::LONGITUDE);

    debug!(
        "Sniffed cast header: {} columns at line {}, units_line={:?}, end_line={:?}",
        columns.len(),
        column_line + 1,
        units_line.map(|i| i + 1),
        end_line.map(|i| i + 1)
    );

    Some(CastHeader {
        metadata,
        latitude,
        longitude,
        columns,
        column_line,
        units_line,
        end_line,
    })
}

fn looks_like_column_header(line: &str) -> bool {
    if line.trim().is_empty() || is_comment_line(line) || line.contains('=') {
        return false;
    }

    let tokens = split_tokens(line);
    if tokens.len() < 2 || tokens.iter().any(|t| parse_number(t).is_some()) {
        return false;
    }

    let names: Vec<String> = tokens.iter().map(|t| parse_column_header(t).name).collect();
    let has = |candidates: &[&str]| names.iter().any(|name| matches_alias(name, candidates));

    has(aliases::TEMPERATURE) && (has(aliases::PRESSURE) || has(aliases::DEPTH))
}

fn looks_like_units_line(line: &str, width: usize) -> bool {
    if is_comment_line(line) {
        return false;
    }
    // Units lines keep empty cells for flag columns, trailing one included
    let tokens: Vec<&str> = line.split(',').map(str::trim).collect();
    tokens.len() == width
        && tokens.iter().any(|t| !t.is_empty())
        && tokens
            .iter()
            .all(|t| t.is_empty() || parse_number(t).is_none())
}

fn parse_column_header(token: &str) -> ColumnHeader {
    let normalize = |s: &str| s.trim().to_ascii_uppercase().replace(' ', "_");
    match COLUMN_RE.captures(token.trim()) {
        Some(caps) => ColumnHeader {
            name: normalize(&caps[1]),
            unit: caps
                .get(2)
                .map(|unit| unit.as_str().trim().to_ascii_uppercase())
                .filter(|unit| !unit.is_empty()),
        },
        None => ColumnHeader {
            name: normalize(token),
            unit: None,
        },
    }
}

fn parse_preamble(lines: &[&str]) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    for line in lines {
        let content = line.trim().trim_start_matches(COMMENT_MARKERS).trim();
        if content.is_empty() {
            continue;
        }
        if let Some(caps) = METADATA_RE.captures(content) {
            let key = caps[1].trim().to_ascii_uppercase().replace(' ', "_");
            let value = caps[2].trim().to_string();
            // First occurrence wins
            metadata.entry(key).or_insert(value);
        }
    }

    metadata
}

fn coordinate(metadata: &BTreeMap<String, String>, keys: &[&str]) -> Option<f64> {
    let (key, value) = keys
        .iter()
        .find_map(|key| metadata.get(*key).map(|value| (*key, value)))?;

    let parsed = parse_coordinate(value);
    if parsed.is_none() {
        warn!("Could not parse {} value: {}", key, value);
    }
    parsed
}

/// Parse decimal degrees or degree/minute/hemisphere notation
pub fn parse_coordinate(value: &str) -> Option<f64> {
    let value = value.trim().trim_end_matches(',').trim();
    if let Some(decimal) = parse_number(value) {
        return Some(decimal);
    }

    let caps = DEGREES_RE.captures(value)?;
    let degrees: f64 = caps[1].parse().ok()?;
    let minutes: f64 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0.0,
    };
    let magnitude = degrees.abs() + minutes / 60.0;
    let negative = degrees < 0.0 || matches!(&caps[3], "S" | "s" | "W" | "w");

    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WOCE_CAST: &str = "CTD,20001231WHPSIODFM
#  Original data from the WOCE hydrographic programme
NUMBER_HEADERS = 6
EXPOCODE = 31WTTUNES_3
STNNBR = 12
LATITUDE = -20.5000
LONGITUDE = 165.2500
CTDPRS,CTDPRS_FLAG_W,CTDTMP,CTDTMP_FLAG_W,CTDSAL,CTDSAL_FLAG_W
DBAR,,ITS-90,,PSS-78,
2.0,2,25.1234,2,35.1000,2
4.0,2,25.1200,2,35.1010,2
END_DATA
";

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate("-20.5000"), Some(-20.5));
        assert_eq!(parse_coordinate("165.25,"), Some(165.25));
        assert_eq!(parse_coordinate("20 30.0 S"), Some(-20.5));
        assert_eq!(parse_coordinate("45° 15.0' W"), Some(-45.25));
        assert_eq!(parse_coordinate("12.5 N"), Some(12.5));
        assert_eq!(parse_coordinate("somewhere"), None);
    }

    #[test]
    fn test_split_tokens() {
        assert_eq!(split_tokens(" 1.0, 2.0 ,3.0"), vec!["1.0", "2.0", "3.0"]);
        assert_eq!(split_tokens("1.0,2.0,"), vec!["1.0", "2.0"]);
        assert_eq!(split_tokens("1.0,,3.0"), vec!["1.0", "", "3.0"]);
    }

    #[test]
    fn test_parse_number_rejects_non_finite() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_woce_header_sniffing() {
        let header = sniff_cast_header(WOCE_CAST).unwrap();

        assert_eq!(header.column_line, 7);
        assert_eq!(header.units_line, Some(8));
        assert_eq!(header.end_line, Some(11));
        assert_eq!(header.latitude, Some(-20.5));
        assert_eq!(header.longitude, Some(165.25));
        assert_eq!(header.metadata.get("EXPOCODE").unwrap(), "31WTTUNES_3");
        assert_eq!(header.width(), 6);
        assert_eq!(header.column_index("CTDTMP"), Some(2));
        assert_eq!(header.columns[2].unit.as_deref(), Some("ITS-90"));
        assert_eq!(header.columns[1].unit, None);
    }

    #[test]
    fn test_regional_header_with_bracket_units() {
        let text = "# Regional CTD survey
# Latitude: 48 30.0 N
# Longitude: 4 45.0 W
Station,Depth [m],Temperature [degC],Conductivity (S/m)
A1,5.0,12.10,3.912
";
        let header = sniff_cast_header(text).unwrap();

        assert_eq!(header.column_line, 3);
        assert_eq!(header.units_line, None);
        assert_eq!(header.end_line, None);
        assert_eq!(header.latitude, Some(48.5));
        assert_eq!(header.longitude, Some(-4.75));
        assert_eq!(header.columns[1].name, "DEPTH");
        assert_eq!(header.columns[1].unit.as_deref(), Some("M"));
        assert_eq!(header.columns[3].name, "CONDUCTIVITY");
        assert_eq!(header.columns[3].unit.as_deref(), Some("S/M"));
        assert_eq!(header.find_column(aliases::CONDUCTIVITY), Some(3));
    }

    #[test]
    fn test_no_header_found() {
        assert!(sniff_cast_header("").is_none());
        assert!(sniff_cast_header("# just notes\nfoo,bar,baz\n1,2,3\n").is_none());
        // Commented-out header is not a header
        assert!(sniff_cast_header("# CTDPRS,CTDTMP,CTDSAL\n1,2,3\n").is_none());
    }

    #[test]
    fn test_numeric_line_after_header_is_not_units() {
        let text = "DEPTH,TEMPERATURE,SALINITY\n1.0,10.0,35.0\n";
        let header = sniff_cast_header(text).unwrap();
        assert_eq!(header.units_line, None);
    }
}
