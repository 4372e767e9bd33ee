//! Command-line interface components.

use crate::config::{CtdConfig, LayoutPin};
use crate::constants::{DEFAULT_AGGREGATED_CSV, DEFAULT_FINAL_CSV, DEFAULT_FLOAT_PRECISION, DEFAULT_PROCESSED_FOLDER};
use crate::error::Result;
use crate::features::SoundSpeedFormula;
use crate::models::RunSummary;
use crate::processor::OutputPaths;
use clap::Parser;
use colored::*;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ctd_processor")]
#[command(about = "Extract zipped CTD casts into a sound-speed training dataset")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Folder holding the source zip archives (or a single archive)
    #[arg(long = "zip_folder", visible_alias = "zip-folder", value_name = "PATH")]
    pub zip_folder: PathBuf,

    /// Folder for the per-archive intermediate CSVs
    #[arg(
        long = "processed_folder",
        visible_alias = "processed-folder",
        value_name = "PATH",
        default_value = DEFAULT_PROCESSED_FOLDER
    )]
    pub processed_folder: PathBuf,

    /// Combined CSV of every accepted record
    #[arg(
        long = "aggregated_csv",
        visible_alias = "aggregated-csv",
        value_name = "FILE",
        default_value = DEFAULT_AGGREGATED_CSV
    )]
    pub aggregated_csv: PathBuf,

    /// Training CSV (aggregated records without source ids)
    #[arg(
        long = "final_csv",
        visible_alias = "final-csv",
        value_name = "FILE",
        default_value = DEFAULT_FINAL_CSV
    )]
    pub final_csv: PathBuf,

    /// Sound speed formula (unesco-1983, mackenzie-1981)
    #[arg(long, default_value = "unesco-1983")]
    pub formula: SoundSpeedFormula,

    /// Pin archives to a layout, e.g. `woce_*=woce-exchange` (repeatable)
    #[arg(long = "layout", value_name = "PATTERN=LAYOUT")]
    pub layouts: Vec<String>,

    /// Skip archives that no --layout pin matches
    #[arg(long)]
    pub strict_layouts: bool,

    /// Decimal places for numeric output fields
    #[arg(long, default_value_t = DEFAULT_FLOAT_PRECISION)]
    pub precision: usize,

    /// Keep rows whose WOCE quality flags mark them bad
    #[arg(long)]
    pub keep_flagged: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors, no progress bar
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Build the run configuration from the flags
    pub fn to_config(&self) -> Result<CtdConfig> {
        let mut config = CtdConfig::default()
            .with_formula(self.formula)
            .with_float_precision(self.precision);

        for spec in &self.layouts {
            config = config.with_layout_pin(LayoutPin::parse(spec)?);
        }
        if self.strict_layouts {
            config = config.with_required_pins();
        }
        if self.keep_flagged {
            config = config.keep_flagged();
        }
        if self.quiet {
            config = config.without_progress();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths {
            processed_folder: self.processed_folder.clone(),
            aggregated_csv: self.aggregated_csv.clone(),
            final_csv: self.final_csv.clone(),
        }
    }
}

/// Print the end-of-run report to stdout
pub fn report_summary(summary: &RunSummary) {
    println!();
    println!("{}", "CTD aggregation complete".bright_green().bold());
    println!(
        "  {} {} processed, {} skipped",
        "Archives:".bright_white(),
        summary.archives_processed().to_string().bright_cyan(),
        summary.archives_skipped().to_string().bright_yellow()
    );
    println!(
        "  {} {} accepted, {} rejected",
        "Records:".bright_white(),
        summary.records_accepted.to_string().bright_cyan(),
        summary.records_rejected().to_string().bright_yellow()
    );

    let rejected = &summary.rejected;
    if rejected.total() > 0 {
        println!(
            "    {}",
            format!(
                "malformed {}, missing {}, fill value {}, bad flag {}, out of range {}",
                rejected.malformed,
                rejected.missing_field,
                rejected.fill_value,
                rejected.bad_quality_flag,
                rejected.out_of_range
            )
            .bright_black()
        );
    }

    println!("  {} {}", "Sound speed:".bright_white(), summary.formula);
    println!(
        "  {} {}",
        "Aggregated:".bright_white(),
        summary.aggregated_csv.display()
    );
    println!("  {} {}", "Final:".bright_white(), summary.final_csv.display());
    println!(
        "  {} {:.2}s",
        "Time:".bright_white(),
        summary.processing_time_ms as f64 / 1000.0
    );

    for skipped in &summary.skipped {
        println!(
            "  {} {}: {}",
            "skipped".yellow(),
            skipped.archive_id.bright_cyan(),
            skipped.reason
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CtdError;
    use crate::schema::SourceLayout;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["ctd_processor", "--zip_folder", "zips"]).unwrap();

        assert_eq!(args.zip_folder, PathBuf::from("zips"));
        assert_eq!(args.processed_folder, PathBuf::from("processed_data"));
        assert_eq!(args.aggregated_csv, PathBuf::from("aggregated.csv"));
        assert_eq!(args.final_csv, PathBuf::from("Train_data.csv"));
        assert_eq!(args.formula, SoundSpeedFormula::Unesco1983);
        assert_eq!(args.log_level(), "info");

        let config = args.to_config().unwrap();
        assert!(config.reject_flagged);
        assert!(config.show_progress);
        assert_eq!(config.float_precision, 4);
    }

    #[test]
    fn test_kebab_case_aliases_and_flags() {
        let args = Args::try_parse_from([
            "ctd_processor",
            "--zip-folder",
            "zips",
            "--final-csv",
            "out/train.csv",
            "--formula",
            "mackenzie-1981",
            "--layout",
            "woce_*=woce-exchange",
            "--layout",
            "brest_*=regional-conductivity",
            "--strict-layouts",
            "--keep-flagged",
            "--precision",
            "6",
            "--quiet",
        ])
        .unwrap();

        assert_eq!(args.final_csv, PathBuf::from("out/train.csv"));
        assert_eq!(args.log_level(), "warn");

        let config = args.to_config().unwrap();
        assert_eq!(config.sound_speed_formula, SoundSpeedFormula::Mackenzie1981);
        assert_eq!(
            config.layout_pins,
            vec![
                LayoutPin::new("woce_*", SourceLayout::WoceExchange),
                LayoutPin::new("brest_*", SourceLayout::RegionalConductivity),
            ]
        );
        assert!(config.require_pinned_layout);
        assert!(!config.reject_flagged);
        assert!(!config.show_progress);
        assert_eq!(config.float_precision, 6);
    }

    #[test]
    fn test_bad_layout_pin() {
        let args = Args::try_parse_from([
            "ctd_processor",
            "--zip_folder",
            "zips",
            "--layout",
            "woce_*=netcdf",
        ])
        .unwrap();

        assert!(matches!(args.to_config(), Err(CtdError::Configuration { .. })));
    }

    #[test]
    fn test_zip_folder_is_required() {
        assert!(Args::try_parse_from(["ctd_processor"]).is_err());
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Args::try_parse_from(["ctd_processor", "--zip_folder", "z", "-v", "-q"]).is_err());
    }
}
