//! Aggregation engine.
//!
//! Drives discovery, extraction, normalization and feature building for
//! every archive of an input folder, writes one intermediate CSV per
//! archive and the combined aggregated and training CSVs.

pub mod discovery;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::discovery::{SourceWalker, archive_id};
use self::writer::{CsvOutputWriter, Provenance};

use crate::config::CtdConfig;
use crate::error::{CtdError, Result};
use crate::extractor::RecordExtractor;
use crate::features::FeatureBuilder;
use crate::models::{ArchiveStats, CanonicalColumn, CanonicalRecord, RejectionCounts, RunSummary, SkippedArchive};
use crate::schema::{LayoutRegistry, SchemaNormalizer};

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle of one aggregation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Walking,
    ProcessingArchive,
    Writing,
    Done,
    Failed,
}

/// Output locations of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub processed_folder: PathBuf,
    pub aggregated_csv: PathBuf,
    pub final_csv: PathBuf,
}

/// Stateless stages shared by every archive of a run
struct Pipeline {
    walker: SourceWalker,
    registry: LayoutRegistry,
    normalizer: SchemaNormalizer,
    features: FeatureBuilder,
    writer: CsvOutputWriter,
}

/// Records and counts of one successfully read archive
struct ArchiveBatch {
    stats: ArchiveStats,
    records: Vec<CanonicalRecord>,
}

/// Orchestrates a run over a folder of CTD archives
#[derive(Debug)]
pub struct Aggregator {
    zip_folder: PathBuf,
    outputs: OutputPaths,
    config: CtdConfig,
    state: RunState,
}

impl Aggregator {
    /// Create an aggregator over an existing input folder
    pub fn new(zip_folder: impl Into<PathBuf>, outputs: OutputPaths) -> Result<Self> {
        let zip_folder = zip_folder.into();
        if !zip_folder.exists() {
            return Err(CtdError::InputNotFound { path: zip_folder });
        }

        Ok(Self {
            zip_folder,
            outputs,
            config: CtdConfig::default(),
            state: RunState::Idle,
        })
    }

    /// Configure the aggregator
    pub fn with_config(mut self, config: CtdConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CtdConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the pipeline over every archive and write all outputs
    pub fn run(&mut self) -> Result<RunSummary> {
        let start_time = Instant::now();
        let result = self.run_inner(start_time);

        if let Err(e) = &result {
            error!("Run failed: {}", e);
            self.transition(RunState::Failed);
        }
        result
    }

    fn run_inner(&mut self, start_time: Instant) -> Result<RunSummary> {
        self.config.validate()?;
        let pipeline = self.pipeline()?;

        info!(
            "Aggregating CTD archives from {} (sound speed: {})",
            self.zip_folder.display(),
            self.config.sound_speed_formula
        );

        self.transition(RunState::Walking);
        let archives = pipeline.walker.discover_archives()?;
        info!("Found {} archives", archives.len());

        let progress = self.progress_bar(archives.len());
        let mut dataset: Vec<CanonicalRecord> = Vec::new();
        let mut processed: Vec<ArchiveStats> = Vec::new();
        let mut skipped: Vec<SkippedArchive> = Vec::new();

        for path in &archives {
            self.transition(RunState::ProcessingArchive);
            let id = archive_id(path);
            progress.set_message(id.clone());

            match self.process_archive(&pipeline, path) {
                Ok(mut batch) => {
                    batch.stats.processed_csv = self.processed_csv_path(&id);
                    pipeline.writer.write_csv(
                        &batch.records,
                        &CanonicalColumn::ALL,
                        &batch.stats.processed_csv,
                    )?;
                    debug!(
                        "Archive {}: {} accepted, {} rejected",
                        id,
                        batch.stats.accepted,
                        batch.stats.rejected.total()
                    );
                    dataset.append(&mut batch.records);
                    processed.push(batch.stats);
                }
                Err(e) if e.is_archive_scoped() => {
                    warn!("Skipping archive {}: {}", id, e);
                    self.remove_stale_intermediate(&id)?;
                    skipped.push(SkippedArchive {
                        archive_id: id,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    progress.abandon();
                    return Err(e);
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        self.transition(RunState::Writing);
        self.write_outputs(&pipeline, &dataset, &processed)?;

        let mut rejected = RejectionCounts::default();
        for stats in &processed {
            rejected.merge(&stats.rejected);
        }

        let summary = RunSummary {
            records_accepted: dataset.len(),
            rejected,
            aggregated_csv: self.outputs.aggregated_csv.clone(),
            final_csv: self.outputs.final_csv.clone(),
            formula: self.config.sound_speed_formula,
            processing_time_ms: start_time.elapsed().as_millis(),
            archives: processed,
            skipped,
        };

        info!(
            "Accepted {} records, rejected {} ({} archives processed, {} skipped)",
            summary.records_accepted,
            summary.records_rejected(),
            summary.archives_processed(),
            summary.archives_skipped()
        );

        self.transition(RunState::Done);
        Ok(summary)
    }

    fn pipeline(&self) -> Result<Pipeline> {
        Ok(Pipeline {
            walker: SourceWalker::new(&self.zip_folder, &self.config)?,
            registry: LayoutRegistry::from_config(&self.config)?,
            normalizer: SchemaNormalizer::from_config(&self.config),
            features: FeatureBuilder::new(self.config.sound_speed_formula),
            writer: CsvOutputWriter::new(self.config.float_precision),
        })
    }

    /// Read one archive completely; nothing is kept if any member fails
    fn process_archive(&self, pipeline: &Pipeline, path: &Path) -> Result<ArchiveBatch> {
        let mut archive = pipeline.walker.open(path)?;
        let id = archive.id().to_string();

        let mut stats = ArchiveStats {
            archive_id: id.clone(),
            ..Default::default()
        };
        let mut records = Vec::new();

        let mut members = archive.members();
        for member in members.by_ref() {
            let member = member?;
            let plan = pipeline
                .registry
                .plan_member(&id, &member.name, &member.text)?;
            stats.layouts.insert(plan.layout);

            let source_id: Arc<str> = Arc::from(format!("{}/{}", id, member.name));
            let extractor = RecordExtractor::new(&plan.shape);
            let mut extraction = extractor.extract(&member.name, &member.text);

            for raw in extraction.by_ref() {
                match pipeline.normalizer.normalize(&plan, &raw, &source_id) {
                    Ok(normalized) => records.push(pipeline.features.enrich(normalized)),
                    Err(reason) => {
                        debug!("{}:{} rejected: {}", source_id, raw.line_number, reason);
                        stats.rejected.record(reason);
                    }
                }
            }

            let lines = extraction.stats();
            stats.rejected.malformed += lines.rejected;
            stats.members_read += 1;
            debug!(
                "{} read as {}: {} data rows, {} malformed lines",
                source_id, plan.layout, lines.accepted, lines.rejected
            );
        }
        stats.members_ignored = members.ignored();
        stats.accepted = records.len();

        Ok(ArchiveBatch { stats, records })
    }

    fn write_outputs(
        &self,
        pipeline: &Pipeline,
        dataset: &[CanonicalRecord],
        processed: &[ArchiveStats],
    ) -> Result<()> {
        let archive_ids: Vec<String> = processed.iter().map(|s| s.archive_id.clone()).collect();
        let layouts: BTreeSet<_> = processed.iter().flat_map(|s| s.layouts.iter().copied()).collect();

        let all_columns = CanonicalColumn::ALL;
        let targets = [
            (&self.outputs.aggregated_csv, &all_columns[..]),
            (&self.outputs.final_csv, &self.config.final_columns[..]),
        ];

        for (path, columns) in targets {
            let rows = pipeline.writer.write_csv(dataset, columns, path)?;
            info!("Wrote {} rows to {}", rows, path.display());

            if self.config.write_provenance {
                let provenance = Provenance::new(self.config.sound_speed_formula, columns)
                    .with_records(rows)
                    .with_archives(archive_ids.clone(), layouts.clone());
                pipeline.writer.write_provenance(&provenance, path)?;
            }
        }

        Ok(())
    }

    fn processed_csv_path(&self, archive_id: &str) -> PathBuf {
        self.outputs
            .processed_folder
            .join(format!("{}{}.csv", archive_id, self.config.processed_suffix))
    }

    /// Drop an earlier run's intermediate file for an archive that is now skipped
    fn remove_stale_intermediate(&self, archive_id: &str) -> Result<()> {
        let path = self.processed_csv_path(archive_id);
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| CtdError::output_write(&path, e))?;
            debug!("Removed stale {}", path.display());
        }
        Ok(())
    }

    fn progress_bar(&self, archives: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(archives as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        ) {
            progress.set_style(style.progress_chars("#>-"));
        }
        progress
    }

    fn transition(&mut self, next: RunState) {
        debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
