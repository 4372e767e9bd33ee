//! Source layouts and mapping onto the canonical schema.
//!
//! Every member is bound to one of a closed set of [`SourceLayout`]s, either
//! pinned by archive id or found by trying each layout against the sniffed
//! header. Binding a layout yields a [`RowPlan`]: the row shape the
//! extractor accepts plus the column positions and unit scales the
//! [`SchemaNormalizer`] needs.

use crate::config::{CtdConfig, ValidRanges};
use crate::constants::{T68_FACTOR, aliases, is_fill_value, matches_alias, woce_columns, woce_flags};
use crate::error::{CtdError, Result};
use crate::extractor::{FieldKind, RowShape};
use crate::header::{CastHeader, sniff_cast_header};
use crate::models::{NormalizedRecord, RawRecord, RejectReason};
use crate::seawater::{depth_from_pressure, pressure_from_depth, salinity_from_conductivity};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Known source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceLayout {
    /// WOCE hydrographic exchange CSV (`CTDPRS`, `CTDTMP`, `CTDSAL`)
    WoceExchange,
    /// Regional casts carrying practical salinity
    RegionalSalinity,
    /// Regional casts carrying conductivity instead of salinity
    RegionalConductivity,
}

impl SourceLayout {
    /// Resolution order for unpinned archives
    pub const ALL: [SourceLayout; 3] = [
        SourceLayout::WoceExchange,
        SourceLayout::RegionalSalinity,
        SourceLayout::RegionalConductivity,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SourceLayout::WoceExchange => "woce-exchange",
            SourceLayout::RegionalSalinity => "regional-salinity",
            SourceLayout::RegionalConductivity => "regional-conductivity",
        }
    }

    /// Bind this layout to a sniffed header
    pub fn plan(&self, header: &CastHeader) -> std::result::Result<RowPlan, String> {
        let binding = match self {
            SourceLayout::WoceExchange => bind_woce(header)?,
            SourceLayout::RegionalSalinity => bind_regional(header, SalinityKind::Practical)?,
            SourceLayout::RegionalConductivity => bind_regional(header, SalinityKind::Conductivity)?,
        };

        // Exchange files always carry a units line after the column names
        let data_start = match self {
            SourceLayout::WoceExchange => header.column_line + 2,
            _ => header.units_line.unwrap_or(header.column_line) + 1,
        };

        Ok(RowPlan {
            layout: *self,
            binding,
            shape: RowShape {
                kinds: row_kinds(header),
                data_start,
                data_end: header.end_line,
            },
        })
    }
}

impl fmt::Display for SourceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SourceLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|layout| layout.id() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown layout '{}' (expected one of: {})",
                    s.trim(),
                    Self::ALL.map(|layout| layout.id()).join(", ")
                )
            })
    }
}

/// A source column with the factor converting it to canonical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundColumn {
    pub index: usize,
    pub scale: f64,
    /// Position of the WOCE quality flag column, if any
    pub flag: Option<usize>,
}

/// Where a cast position comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coordinate {
    Column(BoundColumn),
    Header(f64),
}

/// How salinity is obtained
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SalinitySource {
    Practical(BoundColumn),
    /// Conductivity in mS/cm, converted with PSS-78
    Conductivity(BoundColumn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SalinityKind {
    Practical,
    Conductivity,
}

/// Column positions of the canonical quantities in one source layout
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBinding {
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    pub pressure: Option<BoundColumn>,
    pub depth: Option<BoundColumn>,
    pub temperature: BoundColumn,
    pub salinity: SalinitySource,
}

/// Everything needed to read one member's data rows
#[derive(Debug, Clone, PartialEq)]
pub struct RowPlan {
    pub layout: SourceLayout,
    pub binding: ColumnBinding,
    pub shape: RowShape,
}

fn bind_woce(header: &CastHeader) -> std::result::Result<ColumnBinding, String> {
    let exact = |name: &str| {
        header
            .column_index(name)
            .ok_or_else(|| format!("missing {} column", name))
    };

    let pressure = exact(woce_columns::PRESSURE)?;
    let temperature = exact(woce_columns::TEMPERATURE)?;
    let salinity = exact(woce_columns::SALINITY)?;

    let latitude = header.latitude.ok_or("no LATITUDE in header")?;
    let longitude = header.longitude.ok_or("no LONGITUDE in header")?;

    Ok(ColumnBinding {
        latitude: Coordinate::Header(latitude),
        longitude: Coordinate::Header(longitude),
        pressure: Some(bind(header, pressure, pressure_scale)?),
        depth: None,
        temperature: bind(header, temperature, temperature_scale)?,
        salinity: SalinitySource::Practical(bind(header, salinity, salinity_scale)?),
    })
}

fn bind_regional(header: &CastHeader, kind: SalinityKind) -> std::result::Result<ColumnBinding, String> {
    let temperature = header
        .find_column(aliases::TEMPERATURE)
        .ok_or("missing temperature column")?;

    let pressure = header
        .find_column(aliases::PRESSURE)
        .map(|index| bind(header, index, pressure_scale))
        .transpose()?;
    let depth = header
        .find_column(aliases::DEPTH)
        .map(|index| bind(header, index, depth_scale))
        .transpose()?;
    if pressure.is_none() && depth.is_none() {
        return Err("missing depth or pressure column".to_string());
    }

    let salinity = match kind {
        SalinityKind::Practical => {
            let index = header
                .find_column(aliases::SALINITY)
                .ok_or("missing salinity column")?;
            SalinitySource::Practical(bind(header, index, salinity_scale)?)
        }
        SalinityKind::Conductivity => {
            let index = header
                .find_column(aliases::CONDUCTIVITY)
                .ok_or("missing conductivity column")?;
            SalinitySource::Conductivity(bind(header, index, conductivity_scale)?)
        }
    };

    Ok(ColumnBinding {
        latitude: position(header, aliases::LATITUDE, header.latitude, "latitude")?,
        longitude: position(header, aliases::LONGITUDE, header.longitude, "longitude")?,
        pressure,
        depth,
        temperature: bind(header, temperature, temperature_scale)?,
        salinity,
    })
}

fn position(
    header: &CastHeader,
    candidates: &[&str],
    from_header: Option<f64>,
    name: &str,
) -> std::result::Result<Coordinate, String> {
    match header.find_column(candidates) {
        Some(index) => Ok(Coordinate::Column(BoundColumn {
            index,
            scale: 1.0,
            flag: None,
        })),
        None => from_header
            .map(Coordinate::Header)
            .ok_or_else(|| format!("no {} column or header value", name)),
    }
}

fn bind(
    header: &CastHeader,
    index: usize,
    scale_for: fn(Option<&str>) -> Option<f64>,
) -> std::result::Result<BoundColumn, String> {
    let column = &header.columns[index];
    let scale = scale_for(column.unit.as_deref())
        .ok_or_else(|| format!("unsupported unit '{}' for {}", column.unit.as_deref().unwrap_or(""), column.name))?;
    let flag = header.column_index(&format!("{}{}", column.name, woce_flags::COLUMN_SUFFIX));

    Ok(BoundColumn { index, scale, flag })
}

fn row_kinds(header: &CastHeader) -> Vec<FieldKind> {
    header
        .columns
        .iter()
        .map(|column| {
            if matches_alias(&column.name, aliases::TEXT_COLUMNS) {
                FieldKind::Text
            } else {
                FieldKind::OptionalNumber
            }
        })
        .collect()
}

fn temperature_scale(unit: Option<&str>) -> Option<f64> {
    match unit {
        None | Some("ITS-90" | "ITS90" | "DEGC" | "DEG_C" | "DEG C" | "C" | "°C") => Some(1.0),
        Some("IPTS-68" | "IPTS68" | "ITS-68") => Some(1.0 / T68_FACTOR),
        _ => None,
    }
}

fn pressure_scale(unit: Option<&str>) -> Option<f64> {
    match unit {
        None | Some("DBAR" | "DECIBAR" | "DB") => Some(1.0),
        Some("BAR") => Some(10.0),
        Some("KPA") => Some(0.1),
        _ => None,
    }
}

fn depth_scale(unit: Option<&str>) -> Option<f64> {
    match unit {
        None | Some("M" | "METERS" | "METRES") => Some(1.0),
        _ => None,
    }
}

fn salinity_scale(unit: Option<&str>) -> Option<f64> {
    match unit {
        None | Some("PSS-78" | "PSS78" | "PSU" | "PSS") => Some(1.0),
        _ => None,
    }
}

fn conductivity_scale(unit: Option<&str>) -> Option<f64> {
    match unit {
        None | Some("MS/CM") => Some(1.0),
        Some("S/M") => Some(10.0),
        _ => None,
    }
}

/// Resolves the layout of each member
#[derive(Debug, Clone)]
pub struct LayoutRegistry {
    pins: Vec<(Pattern, SourceLayout)>,
    require_pinned: bool,
}

impl LayoutRegistry {
    pub fn from_config(config: &CtdConfig) -> Result<Self> {
        let pins = config
            .layout_pins
            .iter()
            .map(|pin| {
                Pattern::new(&pin.archive_pattern)
                    .map(|pattern| (pattern, pin.layout))
                    .map_err(|e| CtdError::Configuration {
                        message: format!("invalid archive pattern '{}': {}", pin.archive_pattern, e),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            pins,
            require_pinned: config.require_pinned_layout,
        })
    }

    /// Layout pinned to an archive id, first matching pin wins
    pub fn pinned_layout(&self, archive_id: &str) -> Option<SourceLayout> {
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        self.pins
            .iter()
            .find(|(pattern, _)| pattern.matches_with(archive_id, options))
            .map(|(_, layout)| *layout)
    }

    /// Sniff a member's header and bind it to a layout
    pub fn plan_member(&self, archive_id: &str, member: &str, text: &str) -> Result<RowPlan> {
        let header = sniff_cast_header(text)
            .ok_or_else(|| CtdError::unknown_layout(archive_id, member, "no CTD column header found"))?;
        self.resolve(archive_id, member, &header)
    }

    /// Bind a sniffed header to the pinned layout, or the first layout that fits
    pub fn resolve(&self, archive_id: &str, member: &str, header: &CastHeader) -> Result<RowPlan> {
        if let Some(layout) = self.pinned_layout(archive_id) {
            return layout
                .plan(header)
                .map_err(|reason| CtdError::unknown_layout(archive_id, member, format!("{}: {}", layout, reason)));
        }

        if self.require_pinned {
            return Err(CtdError::unknown_layout(
                archive_id,
                member,
                "archive has no layout pin",
            ));
        }

        let mut reasons = Vec::new();
        for layout in SourceLayout::ALL {
            match layout.plan(header) {
                Ok(plan) => {
                    debug!("{}/{} resolved as {}", archive_id, member, layout);
                    return Ok(plan);
                }
                Err(reason) => reasons.push(format!("{}: {}", layout, reason)),
            }
        }

        Err(CtdError::unknown_layout(archive_id, member, reasons.join("; ")))
    }
}

/// Maps raw rows to normalized records under a row plan
#[derive(Debug, Clone, Copy)]
pub struct SchemaNormalizer {
    ranges: ValidRanges,
    reject_flagged: bool,
}

impl SchemaNormalizer {
    pub fn new(ranges: ValidRanges, reject_flagged: bool) -> Self {
        Self {
            ranges,
            reject_flagged,
        }
    }

    pub fn from_config(config: &CtdConfig) -> Self {
        Self::new(config.ranges, config.reject_flagged)
    }

    /// Normalize one row. Rows are rejected, never defaulted or clamped.
    pub fn normalize(
        &self,
        plan: &RowPlan,
        record: &RawRecord,
        source_id: &Arc<str>,
    ) -> std::result::Result<NormalizedRecord, RejectReason> {
        let binding = &plan.binding;

        let latitude = self.coordinate(binding.latitude, record, "latitude")?;
        let longitude = self.coordinate(binding.longitude, record, "longitude")?;
        let temperature_c = self.read(record, &binding.temperature, "temperature_c")?;

        let pressure = binding
            .pressure
            .map(|column| self.read(record, &column, "pressure_dbar"));
        let depth = binding
            .depth
            .map(|column| self.read(record, &column, "depth_m"));

        // An empty or fill cell on one vertical column is derived from the
        // other; a flagged value still rejects the row
        use RejectReason::{FillValue, MissingField};
        let (pressure_dbar, depth_m) = match (pressure, depth) {
            (Some(Ok(pressure)), Some(Ok(depth))) => (pressure, depth),
            (Some(Ok(pressure)), None | Some(Err(MissingField(_) | FillValue(_)))) => {
                (pressure, depth_from_pressure(pressure, latitude))
            }
            (None | Some(Err(MissingField(_) | FillValue(_))), Some(Ok(depth))) => {
                (pressure_from_depth(depth, latitude), depth)
            }
            (Some(Err(reason)), _) | (_, Some(Err(reason))) => return Err(reason),
            (None, None) => return Err(MissingField("depth_m")),
        };

        let salinity_psu = match binding.salinity {
            SalinitySource::Practical(column) => self.read(record, &column, "salinity_psu")?,
            SalinitySource::Conductivity(column) => {
                let conductivity = self.read(record, &column, "conductivity")?;
                if conductivity < 0.0 {
                    return Err(RejectReason::OutOfRange("conductivity"));
                }
                salinity_from_conductivity(conductivity, temperature_c, pressure_dbar.max(0.0))
            }
        };

        let ranges = &self.ranges;
        for (name, value, bounds) in [
            ("latitude", latitude, ranges.latitude),
            ("longitude", longitude, ranges.longitude),
            ("depth_m", depth_m, ranges.depth_m),
            ("temperature_c", temperature_c, ranges.temperature_c),
            ("salinity_psu", salinity_psu, ranges.salinity_psu),
        ] {
            if !bounds.contains(value) {
                return Err(RejectReason::OutOfRange(name));
            }
        }
        if pressure_dbar.is_nan() || pressure_dbar < 0.0 {
            return Err(RejectReason::OutOfRange("pressure_dbar"));
        }

        Ok(NormalizedRecord {
            latitude,
            longitude,
            depth_m,
            pressure_dbar,
            temperature_c,
            salinity_psu,
            source_id: Arc::clone(source_id),
        })
    }

    fn coordinate(
        &self,
        coordinate: Coordinate,
        record: &RawRecord,
        field: &'static str,
    ) -> std::result::Result<f64, RejectReason> {
        match coordinate {
            Coordinate::Header(value) => Ok(value),
            Coordinate::Column(column) => self.read(record, &column, field),
        }
    }

    fn read(
        &self,
        record: &RawRecord,
        column: &BoundColumn,
        field: &'static str,
    ) -> std::result::Result<f64, RejectReason> {
        let raw = record.number(column.index).ok_or(RejectReason::MissingField(field))?;
        if is_fill_value(raw) {
            return Err(RejectReason::FillValue(field));
        }

        if self.reject_flagged {
            if let Some(flag) = column.flag.and_then(|index| record.number(index)) {
                if woce_flags::REJECTED.contains(&(flag as i64)) {
                    return Err(RejectReason::BadQualityFlag(field));
                }
            }
        }

        Ok(raw * column.scale)
    }
}
