//! Derived feature computation.
//!
//! Adds `sound_speed_mps` to normalized records. The formula variant is a
//! run-level choice and is written to the dataset provenance.

use crate::models::{CanonicalRecord, NormalizedRecord};
use crate::seawater::{sound_speed_mackenzie, sound_speed_unesco};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Empirical sound speed equations available to the feature builder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundSpeedFormula {
    /// Chen & Millero / UNESCO 1983, function of pressure
    #[default]
    #[serde(rename = "unesco-1983")]
    Unesco1983,
    /// Mackenzie 1981, function of depth
    #[serde(rename = "mackenzie-1981")]
    Mackenzie1981,
}

impl SoundSpeedFormula {
    pub fn id(&self) -> &'static str {
        match self {
            SoundSpeedFormula::Unesco1983 => "unesco-1983",
            SoundSpeedFormula::Mackenzie1981 => "mackenzie-1981",
        }
    }
}

impl fmt::Display for SoundSpeedFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SoundSpeedFormula {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unesco-1983" | "unesco" | "chen-millero" => Ok(SoundSpeedFormula::Unesco1983),
            "mackenzie-1981" | "mackenzie" => Ok(SoundSpeedFormula::Mackenzie1981),
            other => Err(format!(
                "unknown sound speed formula '{}' (expected unesco-1983 or mackenzie-1981)",
                other
            )),
        }
    }
}

/// Computes derived columns for normalized records
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder {
    formula: SoundSpeedFormula,
}

impl FeatureBuilder {
    pub fn new(formula: SoundSpeedFormula) -> Self {
        Self { formula }
    }

    pub fn formula(&self) -> SoundSpeedFormula {
        self.formula
    }

    /// Sound speed for one record under the configured formula
    pub fn sound_speed(&self, record: &NormalizedRecord) -> f64 {
        match self.formula {
            SoundSpeedFormula::Unesco1983 => {
                sound_speed_unesco(record.salinity_psu, record.temperature_c, record.pressure_dbar)
            }
            SoundSpeedFormula::Mackenzie1981 => {
                sound_speed_mackenzie(record.salinity_psu, record.temperature_c, record.depth_m)
            }
        }
    }

    /// Attach derived features, producing an output record
    pub fn enrich(&self, record: NormalizedRecord) -> CanonicalRecord {
        let sound_speed_mps = self.sound_speed(&record);
        CanonicalRecord {
            latitude: record.latitude,
            longitude: record.longitude,
            depth_m: record.depth_m,
            pressure_dbar: record.pressure_dbar,
            temperature_c: record.temperature_c,
            salinity_psu: record.salinity_psu,
            sound_speed_mps,
            source_id: record.source_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn surface_record() -> NormalizedRecord {
        NormalizedRecord {
            latitude: 10.0,
            longitude: -30.0,
            depth_m: 0.0,
            pressure_dbar: 0.0,
            temperature_c: 0.0,
            salinity_psu: 35.0,
            source_id: Arc::from("atlantic/cast_001.csv"),
        }
    }

    #[test]
    fn test_enrich_preserves_fields() {
        let builder = FeatureBuilder::default();
        let enriched = builder.enrich(surface_record());

        assert_eq!(enriched.latitude, 10.0);
        assert_eq!(enriched.longitude, -30.0);
        assert_eq!(enriched.salinity_psu, 35.0);
        assert_eq!(&*enriched.source_id, "atlantic/cast_001.csv");
        assert!((enriched.sound_speed_mps - 1449.14).abs() < 0.01);
    }

    #[test]
    fn test_formula_selection() {
        let mackenzie = FeatureBuilder::new(SoundSpeedFormula::Mackenzie1981);
        assert_eq!(mackenzie.formula(), SoundSpeedFormula::Mackenzie1981);
        assert!((mackenzie.sound_speed(&surface_record()) - 1448.96).abs() < 1e-9);
    }

    #[test]
    fn test_formula_parsing() {
        assert_eq!(
            "UNESCO-1983".parse::<SoundSpeedFormula>().unwrap(),
            SoundSpeedFormula::Unesco1983
        );
        assert_eq!(
            "mackenzie".parse::<SoundSpeedFormula>().unwrap(),
            SoundSpeedFormula::Mackenzie1981
        );
        assert!("del-grosso".parse::<SoundSpeedFormula>().is_err());
    }

    #[test]
    fn test_formula_serializes_to_id() {
        let json = serde_json::to_string(&SoundSpeedFormula::Mackenzie1981).unwrap();
        assert_eq!(json, "\"mackenzie-1981\"");
        assert_eq!(SoundSpeedFormula::Unesco1983.to_string(), "unesco-1983");
    }
}
