use std::collections::HashSet;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Endpoints;
use crate::domain::{Accession, GenomeIdentifierBundle, GenomeRecord};
use crate::error::ResolverError;
use crate::extract::{ArchiveExtractor, Extraction};
use crate::fetcher::{ArchiveFetcher, FetchOutcome};
use crate::ledger::{ResolutionLedger, ResolutionRecord};
use crate::locator::AssetLocator;
use crate::remote::RemoteClient;
use crate::resolver::AccessionResolver;
use crate::store::ArchiveCacheStore;

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Retry identifiers whose earlier attempt failed instead of skipping them.
    pub force_reresolve: bool,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolve,
    Locate,
    Fetch,
    Extract,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Cached { accession: String },
    Downloaded { accession: String },
    PreviouslyFailed,
    Failed { stage: Stage, reason: String },
    Unidentifiable,
}

impl RecordOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            RecordOutcome::Cached { .. } | RecordOutcome::Downloaded { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordReport {
    pub genome_label: String,
    pub original_id: Option<String>,
    pub outcome: RecordOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub downloaded: usize,
    pub cached: usize,
    pub previously_failed: usize,
    pub failed: usize,
    pub unidentifiable: usize,
    /// Records left without a cached archive.
    pub missing: usize,
    pub records: Vec<RecordReport>,
}

impl BatchReport {
    pub fn all_missing(&self) -> bool {
        self.total > 0 && self.missing == self.total
    }
}

/// Drives resolve -> locate -> fetch -> extract over a batch of genome records,
/// consulting and updating the resolution ledger of one dataset.
pub struct GenomePipeline<C: RemoteClient> {
    client: C,
    endpoints: Endpoints,
    store: ArchiveCacheStore,
    options: PipelineOptions,
}

impl<C: RemoteClient> GenomePipeline<C> {
    pub fn new(
        client: C,
        endpoints: Endpoints,
        store: ArchiveCacheStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            client,
            endpoints,
            store,
            options,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &ArchiveCacheStore {
        &self.store
    }

    pub fn open_ledger(&self) -> Result<ResolutionLedger, ResolverError> {
        ResolutionLedger::open(self.store.ledger_path(), self.store.journal_path())
    }

    /// Processes every record in order and sets `resolved_id` on those whose
    /// archive was fetched and extracted. Only local I/O failures on the
    /// ledger are returned as errors.
    pub fn run(
        &self,
        records: &mut [GenomeRecord],
        sink: &dyn ProgressSink,
    ) -> Result<BatchReport, ResolverError> {
        let started_at = Utc::now();
        self.store.ensure_roots()?;
        let mut ledger = self.open_ledger()?;
        let mut seen_this_run = HashSet::new();
        let total = records.len();
        let mut reports = Vec::with_capacity(total);

        for (i, record) in records.iter_mut().enumerate() {
            let start = Instant::now();
            let report = self.process(&mut ledger, &mut seen_this_run, record, i, total)?;
            sink.event(ProgressEvent {
                message: format!(
                    "genome {}/{} {}: {}",
                    i + 1,
                    total,
                    report.original_id.as_deref().unwrap_or("<none>"),
                    outcome_label(&report.outcome)
                ),
                elapsed: Some(start.elapsed()),
            });
            reports.push(report);
        }

        ledger.checkpoint()?;

        let missing = reports
            .iter()
            .filter(|report| match &report.original_id {
                Some(id) => ledger.get(id).map(|r| !r.has_archive()).unwrap_or(true),
                None => true,
            })
            .count();
        let count = |pred: fn(&RecordOutcome) -> bool| {
            reports.iter().filter(|report| pred(&report.outcome)).count()
        };
        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            total,
            downloaded: count(|o| matches!(o, RecordOutcome::Downloaded { .. })),
            cached: count(|o| matches!(o, RecordOutcome::Cached { .. })),
            previously_failed: count(|o| matches!(o, RecordOutcome::PreviouslyFailed)),
            failed: count(|o| matches!(o, RecordOutcome::Failed { .. })),
            unidentifiable: count(|o| matches!(o, RecordOutcome::Unidentifiable)),
            missing,
            records: reports,
        };

        info!(
            missing = report.missing,
            total = report.total,
            "dataset has {} missing sets of antiSMASH data (from a total of {})",
            report.missing,
            report.total
        );
        if report.all_missing() {
            warn!("failed to retrieve ANY genome data");
        }
        Ok(report)
    }

    /// Drops one identifier from the ledger so the next run resolves it from scratch.
    pub fn forget(&self, original_id: &str) -> Result<Option<ResolutionRecord>, ResolverError> {
        let mut ledger = self.open_ledger()?;
        let removed = ledger.forget(original_id);
        if removed.is_some() {
            ledger.checkpoint()?;
            info!(original_id, "removed ledger record");
        }
        Ok(removed)
    }

    fn process(
        &self,
        ledger: &mut ResolutionLedger,
        seen_this_run: &mut HashSet<String>,
        record: &mut GenomeRecord,
        index: usize,
        total: usize,
    ) -> Result<RecordReport, ResolverError> {
        record.resolved_id = None;
        let label = record.genome_label.clone();
        let best = record.genome_id.best_available();
        let Some(original_id) = best.as_str().map(str::to_string) else {
            warn!(label = %label, bundle = %record.genome_id, "genome has no usable identifier");
            return Ok(RecordReport {
                genome_label: label,
                original_id: None,
                outcome: RecordOutcome::Unidentifiable,
            });
        };
        info!(
            original_id = %original_id,
            namespace = best.namespace(),
            "checking for antiSMASH data {}/{}",
            index + 1,
            total
        );

        let first_sighting = seen_this_run.insert(original_id.clone());
        let mut entry = ledger.entry(&original_id).clone();

        if entry.has_archive() {
            if let Some(accession) = self.valid_cached_archive(&entry) {
                info!(original_id = %original_id, path = %entry.filename, "genome already downloaded");
                let archive = Utf8PathBuf::from(entry.filename.as_str());
                let outcome = match self.extract(&accession, &archive) {
                    Ok(()) => {
                        record.resolved_id = Some(accession.to_string());
                        RecordOutcome::Cached {
                            accession: accession.to_string(),
                        }
                    }
                    Err(err) => {
                        warn!(original_id = %original_id, error = %err, "extraction of cached archive failed");
                        RecordOutcome::Failed {
                            stage: Stage::Extract,
                            reason: err.to_string(),
                        }
                    }
                };
                return Ok(RecordReport {
                    genome_label: label,
                    original_id: Some(original_id),
                    outcome,
                });
            }
            entry.filename.clear();
            entry.attempted = false;
        } else if entry.is_failed() {
            if !(self.options.force_reresolve && first_sighting) {
                info!(original_id = %original_id, "skipped due to previous failure");
                return Ok(RecordReport {
                    genome_label: label,
                    original_id: Some(original_id),
                    outcome: RecordOutcome::PreviouslyFailed,
                });
            }
            info!(original_id = %original_id, "forcing re-resolution of failed identifier");
            entry.reset();
        }

        info!(original_id = %original_id, "beginning lookup process");
        let result = self.attempt(&mut entry, &record.genome_id);
        entry.attempted = true;
        ledger.record(entry.clone())?;

        let outcome = match result {
            Ok((accession, fetched)) => {
                record.resolved_id = Some(accession.to_string());
                info!(original_id = %original_id, accession = %accession, "genome data successfully retrieved");
                match fetched {
                    FetchOutcome::CacheHit => RecordOutcome::Cached {
                        accession: accession.to_string(),
                    },
                    FetchOutcome::Downloaded { .. } => RecordOutcome::Downloaded {
                        accession: accession.to_string(),
                    },
                }
            }
            Err((stage, err)) => {
                warn!(
                    original_id = %original_id,
                    resolved_id = entry.resolved_id.as_deref().unwrap_or("None"),
                    stage = ?stage,
                    error = %err,
                    "failed to retrieve genome data"
                );
                RecordOutcome::Failed {
                    stage,
                    reason: err.to_string(),
                }
            }
        };

        Ok(RecordReport {
            genome_label: label,
            original_id: Some(original_id),
            outcome,
        })
    }

    /// Runs the remote chain, writing the resolved accession and archive path
    /// into `entry` as each step succeeds.
    fn attempt(
        &self,
        entry: &mut ResolutionRecord,
        bundle: &GenomeIdentifierBundle,
    ) -> Result<(Accession, FetchOutcome), (Stage, ResolverError)> {
        let known = entry
            .resolved_id
            .as_deref()
            .and_then(|id| id.parse::<Accession>().ok());
        let accession = match known {
            Some(accession) => accession,
            None => AccessionResolver::new(&self.client, &self.endpoints)
                .resolve(bundle)
                .map_err(|err| (Stage::Resolve, err))?,
        };
        entry.resolved_id = Some(accession.to_string());

        let (accession, fetched) = match self.cached_variant(&accession) {
            Some(cached) => (cached, FetchOutcome::CacheHit),
            None => {
                let asset = AssetLocator::new(&self.client, &self.endpoints)
                    .locate(&accession)
                    .ok_or_else(|| {
                        (
                            Stage::Locate,
                            ResolverError::NotFound(format!("no antiSMASH archive for {accession}")),
                        )
                    })?;
                // The catalog's spelling of the accession becomes the cache key.
                entry.resolved_id = Some(asset.accession.to_string());
                let destination = self.store.archive_path(&asset.accession);
                let fetched = ArchiveFetcher::new(&self.client, &self.endpoints, &self.store)
                    .fetch(&asset, &destination)
                    .map_err(|err| (Stage::Fetch, err))?;
                (asset.accession, fetched)
            }
        };
        let archive = self.store.archive_path(&accession);
        entry.resolved_id = Some(accession.to_string());
        entry.filename = archive.to_string();

        self.extract(&accession, &archive)
            .map_err(|err| (Stage::Extract, err))?;
        Ok((accession, fetched))
    }

    /// An archive already on disk for the accession or its `.1` variant.
    fn cached_variant(&self, accession: &Accession) -> Option<Accession> {
        [accession.clone(), accession.with_version_suffix()]
            .into_iter()
            .find(|candidate| {
                let path = self.store.archive_path(candidate);
                ArchiveCacheStore::validate_or_evict(&path).unwrap_or(false)
            })
    }

    fn valid_cached_archive(&self, entry: &ResolutionRecord) -> Option<Accession> {
        let path = Utf8PathBuf::from(entry.filename.as_str());
        let valid = ArchiveCacheStore::validate_or_evict(&path).unwrap_or(false);
        let accession = entry
            .resolved_id
            .as_deref()
            .and_then(|id| id.parse::<Accession>().ok());
        match (valid, accession) {
            (true, Some(accession)) => Some(accession),
            (true, None) => {
                info!(
                    original_id = %entry.original_id,
                    path = %path,
                    "cached archive has no usable resolved accession, resolving again"
                );
                None
            }
            (false, _) => {
                info!(
                    original_id = %entry.original_id,
                    path = %path,
                    "cached archive missing or invalid, fetching again"
                );
                None
            }
        }
    }

    fn extract(&self, accession: &Accession, archive: &Utf8Path) -> Result<(), ResolverError> {
        let output = self.store.extraction_dir(accession);
        match ArchiveExtractor::new(accession.clone())
            .extract(archive.as_std_path(), output.as_std_path())?
        {
            Extraction::AlreadyComplete => {}
            Extraction::Extracted { entries } => {
                info!(accession = %accession, entries, output = %output, "extracted antiSMASH data");
            }
        }
        Ok(())
    }
}

fn outcome_label(outcome: &RecordOutcome) -> String {
    match outcome {
        RecordOutcome::Cached { accession } => format!("cached ({accession})"),
        RecordOutcome::Downloaded { accession } => format!("downloaded ({accession})"),
        RecordOutcome::PreviouslyFailed => "skipped (previous failure)".to_string(),
        RecordOutcome::Failed { stage, .. } => format!("failed at {stage:?}"),
        RecordOutcome::Unidentifiable => "no usable identifier".to_string(),
    }
}
