// 🚦 Normalization Pipeline - five dependency-ordered stages
//
// regions → categories → parties → legislators(parties) →
// fiscal documents(regions, legislators, categories)
//
// Every stage runs inside its own store transaction and ends as either
// Completed (committed, entities handed to later stages) or Aborted
// (rolled back, run stops).

use crate::config::NormalizerConfig;
use crate::entities::{Category, Party, Region};
use crate::error::NormalizeError;
use crate::linker::{link_documents, LinkReport, SkippedRecord};
use crate::normalizer::{normalize_entities, normalize_legislators, Normalized};
use crate::store::ExpenseStore;
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};

// ============================================================================
// STAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Regions,
    Categories,
    Parties,
    Legislators,
    FiscalDocuments,
}

impl Stage {
    /// Execution order
    pub const ALL: [Stage; 5] = [
        Stage::Regions,
        Stage::Categories,
        Stage::Parties,
        Stage::Legislators,
        Stage::FiscalDocuments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Regions => "regions",
            Stage::Categories => "categories",
            Stage::Parties => "parties",
            Stage::Legislators => "legislators",
            Stage::FiscalDocuments => "fiscal documents",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage ended
#[derive(Debug)]
pub enum StageOutcome<T> {
    Completed(T),
    Aborted(NormalizeError),
}

impl<T> StageOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed(_))
    }

    pub fn into_result(self) -> Result<T, NormalizeError> {
        match self {
            StageOutcome::Completed(value) => Ok(value),
            StageOutcome::Aborted(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, NormalizeError>> for StageOutcome<T> {
    fn from(result: Result<T, NormalizeError>) -> Self {
        match result {
            Ok(value) => StageOutcome::Completed(value),
            Err(err) => StageOutcome::Aborted(err),
        }
    }
}

/// The run stopped at `stage`; earlier stages stay committed
#[derive(Debug, Error)]
#[error("{stage} stage aborted: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: NormalizeError,
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub read: usize,
    pub persisted: usize,
    pub excluded: usize,
    pub skipped: usize,
    pub elapsed_ms: u128,
}

impl StageReport {
    fn from_normalized<E>(stage: Stage, normalized: &Normalized<E>) -> Self {
        StageReport {
            stage,
            read: normalized.read,
            persisted: normalized.persisted,
            excluded: 0,
            skipped: 0,
            elapsed_ms: normalized.elapsed.as_millis(),
        }
    }

    fn from_link(report: &LinkReport) -> Self {
        StageReport {
            stage: Stage::FiscalDocuments,
            read: report.read,
            persisted: report.persisted,
            excluded: report.excluded,
            skipped: report.skipped.len(),
            elapsed_ms: report.elapsed.as_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
    pub skipped_records: Vec<SkippedRecord>,
    pub elapsed_ms: u128,
}

impl RunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline<'s, S: ExpenseStore + ?Sized> {
    store: &'s mut S,
    config: NormalizerConfig,
}

impl<'s, S: ExpenseStore + ?Sized> Pipeline<'s, S> {
    pub fn new(store: &'s mut S, config: NormalizerConfig) -> Self {
        Pipeline { store, config }
    }

    /// Run one stage inside a store transaction
    pub fn run_stage<T, F>(&mut self, stage: Stage, work: F) -> StageOutcome<T>
    where
        F: FnOnce(&mut S, &NormalizerConfig) -> Result<T, NormalizeError>,
    {
        if let Err(e) = self.store.begin_stage(stage) {
            return StageOutcome::Aborted(e.into());
        }

        let outcome: StageOutcome<T> = work(&mut *self.store, &self.config)
            .and_then(|value| {
                self.store.commit_stage(stage)?;
                Ok(value)
            })
            .into();

        if let StageOutcome::Aborted(err) = &outcome {
            error!("Stage {} aborted: {}", stage, err);
            if let Err(e) = self.store.rollback_stage(stage) {
                error!("Rollback of stage {} failed: {}", stage, e);
            }
        }

        outcome
    }

    fn stage<T, F>(&mut self, stage: Stage, work: F) -> Result<T, PipelineError>
    where
        F: FnOnce(&mut S, &NormalizerConfig) -> Result<T, NormalizeError>,
    {
        self.run_stage(stage, work)
            .into_result()
            .map_err(|source| PipelineError { stage, source })
    }

    /// Run all five stages in order, stopping at the first abort
    pub fn run(&mut self) -> Result<RunReport, PipelineError> {
        info!("Starting database normalization...");
        let start = Instant::now();
        let mut stages = Vec::with_capacity(Stage::ALL.len());

        let regions = self.stage(Stage::Regions, |store, config| {
            normalize_entities::<Region, S>(store, config)
        })?;
        stages.push(StageReport::from_normalized(Stage::Regions, &regions));

        let categories = self.stage(Stage::Categories, |store, config| {
            normalize_entities::<Category, S>(store, config)
        })?;
        stages.push(StageReport::from_normalized(Stage::Categories, &categories));

        let parties = self.stage(Stage::Parties, |store, config| {
            normalize_entities::<Party, S>(store, config)
        })?;
        stages.push(StageReport::from_normalized(Stage::Parties, &parties));

        let legislators = self.stage(Stage::Legislators, |store, config| {
            normalize_legislators(store, &parties.entities, config)
        })?;
        stages.push(StageReport::from_normalized(Stage::Legislators, &legislators));

        let documents = self.stage(Stage::FiscalDocuments, |store, config| {
            link_documents(
                store,
                &regions.entities,
                &legislators.entities,
                &categories.entities,
                config,
            )
        })?;
        stages.push(StageReport::from_link(&documents));

        let elapsed = start.elapsed();
        info!("Total normalization time: {} seconds", elapsed.as_secs());

        Ok(RunReport {
            stages,
            skipped_records: documents.skipped,
            elapsed_ms: elapsed.as_millis(),
        })
    }
}
