//! Configuration management and validation.
//!
//! Provides the run configuration for archive walking, layout dispatch,
//! record validation and CSV output.

use crate::constants::{
    DEFAULT_FLOAT_PRECISION, DEFAULT_MEMBER_PATTERN, PROCESSED_FILE_SUFFIX, ranges,
};
use crate::error::{CtdError, Result};
use crate::features::SoundSpeedFormula;
use crate::models::CanonicalColumn;
use crate::schema::SourceLayout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inclusive validity bounds for one quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Physically valid ranges a canonical record must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidRanges {
    pub depth_m: Bounds,
    pub temperature_c: Bounds,
    pub salinity_psu: Bounds,
    pub latitude: Bounds,
    pub longitude: Bounds,
}

impl Default for ValidRanges {
    fn default() -> Self {
        Self {
            depth_m: Bounds::new(ranges::DEPTH_MIN_M, ranges::DEPTH_MAX_M),
            temperature_c: Bounds::new(ranges::TEMPERATURE_MIN_C, ranges::TEMPERATURE_MAX_C),
            salinity_psu: Bounds::new(ranges::SALINITY_MIN_PSU, ranges::SALINITY_MAX_PSU),
            latitude: Bounds::new(-ranges::LATITUDE_MAX, ranges::LATITUDE_MAX),
            longitude: Bounds::new(-ranges::LONGITUDE_MAX, ranges::LONGITUDE_MAX),
        }
    }
}

/// Archives whose id matches `archive_pattern` are read with `layout`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutPin {
    pub archive_pattern: String,
    pub layout: SourceLayout,
}

impl LayoutPin {
    pub fn new(archive_pattern: impl Into<String>, layout: SourceLayout) -> Self {
        Self {
            archive_pattern: archive_pattern.into(),
            layout,
        }
    }

    /// Parse `PATTERN=LAYOUT`
    pub fn parse(spec: &str) -> Result<Self> {
        let (pattern, layout) = spec.split_once('=').ok_or_else(|| CtdError::Configuration {
            message: format!("layout pin '{}' must look like PATTERN=LAYOUT", spec),
        })?;
        let layout = layout
            .parse::<SourceLayout>()
            .map_err(|message| CtdError::Configuration { message })?;
        Ok(Self::new(pattern.trim(), layout))
    }
}

/// Global configuration for CTD processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtdConfig {
    /// Globs selecting archive members that hold casts
    pub member_patterns: Vec<String>,

    /// Archive-id based layout dispatch
    pub layout_pins: Vec<LayoutPin>,

    /// Treat archives without a pin as unknown layouts
    pub require_pinned_layout: bool,

    /// Formula used for the sound speed label
    pub sound_speed_formula: SoundSpeedFormula,

    /// Record validity ranges
    pub ranges: ValidRanges,

    /// Drop rows whose WOCE quality flag marks a bound column bad
    pub reject_flagged: bool,

    /// Fixed decimal places for numeric CSV fields
    pub float_precision: usize,

    /// Columns of the final training file, in order
    pub final_columns: Vec<CanonicalColumn>,

    /// Suffix of per-archive intermediate files
    pub processed_suffix: String,

    /// Write a provenance sidecar next to each output CSV
    pub write_provenance: bool,

    /// Draw a progress bar while walking archives
    pub show_progress: bool,
}

impl Default for CtdConfig {
    fn default() -> Self {
        Self {
            member_patterns: vec![DEFAULT_MEMBER_PATTERN.to_string()],
            layout_pins: Vec::new(),
            require_pinned_layout: false,
            sound_speed_formula: SoundSpeedFormula::default(),
            ranges: ValidRanges::default(),
            reject_flagged: true,
            float_precision: DEFAULT_FLOAT_PRECISION,
            final_columns: CanonicalColumn::training_columns(),
            processed_suffix: PROCESSED_FILE_SUFFIX.to_string(),
            write_provenance: true,
            show_progress: true,
        }
    }
}

impl CtdConfig {
    /// Select the sound speed formula
    pub fn with_formula(mut self, formula: SoundSpeedFormula) -> Self {
        self.sound_speed_formula = formula;
        self
    }

    /// Pin archives matching a glob to a layout
    pub fn with_layout_pin(mut self, pin: LayoutPin) -> Self {
        self.layout_pins.push(pin);
        self
    }

    /// Only accept archives with a layout pin
    pub fn with_required_pins(mut self) -> Self {
        self.require_pinned_layout = true;
        self
    }

    /// Replace the member globs
    pub fn with_member_patterns(mut self, patterns: Vec<String>) -> Self {
        self.member_patterns = patterns;
        self
    }

    /// Set the number of decimals written for numeric fields
    pub fn with_float_precision(mut self, precision: usize) -> Self {
        self.float_precision = precision;
        self
    }

    /// Set the final CSV columns
    pub fn with_final_columns(mut self, columns: Vec<CanonicalColumn>) -> Self {
        self.final_columns = columns;
        self
    }

    /// Keep rows whose WOCE flags mark them bad
    pub fn keep_flagged(mut self) -> Self {
        self.reject_flagged = false;
        self
    }

    /// Disable the progress bar
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Disable provenance sidecars
    pub fn without_provenance(mut self) -> Self {
        self.write_provenance = false;
        self
    }

    /// Check the configuration for values the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.member_patterns.is_empty() {
            return Err(CtdError::Configuration {
                message: "at least one member pattern is required".to_string(),
            });
        }

        if self.final_columns.is_empty() {
            return Err(CtdError::Configuration {
                message: "final CSV needs at least one column".to_string(),
            });
        }

        let unique: BTreeSet<_> = self.final_columns.iter().collect();
        if unique.len() != self.final_columns.len() {
            return Err(CtdError::Configuration {
                message: "final CSV columns must not repeat".to_string(),
            });
        }

        if self.float_precision > 12 {
            return Err(CtdError::Configuration {
                message: format!("float precision {} exceeds 12", self.float_precision),
            });
        }

        for (name, bounds) in [
            ("depth_m", self.ranges.depth_m),
            ("temperature_c", self.ranges.temperature_c),
            ("salinity_psu", self.ranges.salinity_psu),
            ("latitude", self.ranges.latitude),
            ("longitude", self.ranges.longitude),
        ] {
            if bounds.min > bounds.max {
                return Err(CtdError::Configuration {
                    message: format!("range for {} is empty", name),
                });
            }
        }

        Ok(())
    }
}
