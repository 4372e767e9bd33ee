//! CTD Processor Library
//!
//! Turns folders of zipped oceanographic CTD casts into a single tabular
//! dataset of ocean state records labelled with the speed of sound.
//!
//! This library provides tools for:
//! - Walking zip archives and selecting their cast members
//! - Sniffing cast headers and binding them to a known source layout
//! - Normalizing rows to a canonical schema with unit conversion and range checks
//! - Deriving pressure, depth, salinity and sound speed with EOS-80 formulas
//! - Writing per-archive, aggregated and training CSVs with provenance

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod extractor;
pub mod features;
pub mod header;
pub mod models;
pub mod processor;
pub mod schema;
pub mod seawater;

pub use config::{CtdConfig, LayoutPin, ValidRanges};
pub use error::{CtdError, Result};
pub use features::{FeatureBuilder, SoundSpeedFormula};
pub use models::{CanonicalColumn, CanonicalRecord, RejectReason, RejectionCounts, RunSummary};
pub use processor::{Aggregator, OutputPaths, RunState};
pub use schema::SourceLayout;
