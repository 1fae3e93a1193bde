use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

use crate::{
    error::{ReleaseError, Result},
    ledger::Candidate,
};

/// A releasable candidate bound to its nonce and batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmissionJob {
    pub candidate: Candidate,
    pub nonce: u64,
    pub batch_index: u32,
}

/// Why a submitted job did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Failure {
    /// The ledger included the transaction but its logic failed
    Dispatch(String),
    /// The submission never made it to a terminal status on chain
    Transport(String),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Dispatch(detail) => write!(f, "dispatch error: {}", detail),
            Failure::Transport(detail) => write!(f, "transport error: {}", detail),
        }
    }
}

/// Terminal outcome of a submitted job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobOutcome {
    Succeeded { block_hash: Option<String> },
    Failed(Failure),
}

/// Per-batch counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub index: u32,
    /// Height of the block notification that triggered the batch
    pub block: u64,
    pub size: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub unknown: usize,
}

/// Final submission counts handed over once the scheduler is done
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmissionReport {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Dispatched jobs with no terminal status by the end of the settle period
    pub unknown: usize,
    /// Planned jobs never dispatched because the block stream ended
    pub not_submitted: usize,
    pub batches: Vec<BatchSummary>,
    pub failures: Vec<(SubmissionJob, Failure)>,
}

struct JobRecord {
    job: SubmissionJob,
    outcome: Option<JobOutcome>,
}

#[derive(Default)]
struct AggregatorState {
    jobs: HashMap<u64, JobRecord>,
    batches: BTreeMap<u32, BatchSummary>,
    not_submitted: usize,
}

/// Collects terminal outcomes of submitted jobs.
///
/// Every dispatched job is registered first and may be recorded exactly once.
#[derive(Default)]
pub struct OutcomeAggregator {
    state: Mutex<AggregatorState>,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a job at dispatch time
    pub fn register(&self, job: &SubmissionJob, block: u64) -> Result<()> {
        let mut state = self.state();
        if state.jobs.contains_key(&job.nonce) {
            error!(nonce = job.nonce, "job registered twice");
            return Err(ReleaseError::DuplicateJob(job.nonce));
        }

        let batch = state.batches.entry(job.batch_index).or_insert_with(|| BatchSummary {
            index: job.batch_index,
            block,
            ..Default::default()
        });
        batch.size += 1;

        state.jobs.insert(
            job.nonce,
            JobRecord {
                job: *job,
                outcome: None,
            },
        );
        Ok(())
    }

    /// Record the terminal outcome of a registered job
    pub fn record(&self, nonce: u64, outcome: JobOutcome) -> Result<()> {
        let mut state = self.state();

        let record = state.jobs.get_mut(&nonce).ok_or_else(|| {
            error!(nonce, "outcome reported for unregistered job");
            ReleaseError::UnknownJob(nonce)
        })?;

        if record.outcome.is_some() {
            error!(nonce, ?outcome, "outcome reported twice, ignoring second report");
            return Err(ReleaseError::DuplicateOutcome(nonce));
        }

        let job = record.job;
        match &outcome {
            JobOutcome::Succeeded { block_hash } => info!(
                nonce,
                batch = job.batch_index,
                owner = %job.candidate.owner,
                asset = %job.candidate.asset_id,
                block_hash = block_hash.as_deref().unwrap_or("-"),
                "release included"
            ),
            JobOutcome::Failed(failure) => warn!(
                nonce,
                batch = job.batch_index,
                owner = %job.candidate.owner,
                asset = %job.candidate.asset_id,
                %failure,
                "release failed"
            ),
        }
        record.outcome = Some(outcome);
        Ok(())
    }

    pub fn mark_not_submitted(&self, count: usize) {
        self.state().not_submitted += count;
    }

    /// Produce the final counts; jobs still without an outcome count as unknown
    pub fn finalize(&self) -> SubmissionReport {
        let state = self.state();
        let mut batches = state.batches.clone();
        let mut report = SubmissionReport {
            submitted: state.jobs.len(),
            not_submitted: state.not_submitted,
            ..Default::default()
        };

        let mut records: Vec<&JobRecord> = state.jobs.values().collect();
        records.sort_by_key(|r| r.job.nonce);

        for record in records {
            let Some(batch) = batches.get_mut(&record.job.batch_index) else {
                continue;
            };
            match &record.outcome {
                Some(JobOutcome::Succeeded { .. }) => {
                    report.succeeded += 1;
                    batch.succeeded += 1;
                }
                Some(JobOutcome::Failed(failure)) => {
                    report.failed += 1;
                    batch.failed += 1;
                    report.failures.push((record.job, failure.clone()));
                }
                None => {
                    warn!(
                        nonce = record.job.nonce,
                        owner = %record.job.candidate.owner,
                        asset = %record.job.candidate.asset_id,
                        "no terminal status before the settle period ended"
                    );
                    report.unknown += 1;
                    batch.unknown += 1;
                }
            }
        }

        report.batches = batches.into_values().collect();
        for batch in &report.batches {
            info!(
                batch = batch.index + 1,
                block = batch.block,
                size = batch.size,
                succeeded = batch.succeeded,
                failed = batch.failed,
                unknown = batch.unknown,
                "batch settled"
            );
        }
        report
    }
}

/// Everything a run did, from scan to settle
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub scanned: usize,
    pub matched: usize,
    pub current_block: Option<u64>,
    pub releasable: usize,
    pub locked: usize,
    pub dry_run: bool,
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub unknown: usize,
    pub not_submitted: usize,
    pub batches: Vec<BatchSummary>,
    pub failures: Vec<(SubmissionJob, Failure)>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            scanned: 0,
            matched: 0,
            current_block: None,
            releasable: 0,
            locked: 0,
            dry_run: false,
            submitted: 0,
            succeeded: 0,
            failed: 0,
            unknown: 0,
            not_submitted: 0,
            batches: Vec::new(),
            failures: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    pub fn apply_submissions(&mut self, report: SubmissionReport) {
        self.submitted = report.submitted;
        self.succeeded = report.succeeded;
        self.failed = report.failed;
        self.unknown = report.unknown;
        self.not_submitted = report.not_submitted;
        self.batches = report.batches;
        self.failures = report.failures;
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Print a formatted summary to console
    pub fn print_summary(&self) {
        println!("\n{}", "=== Deposit Release Summary ===".cyan().bold());
        println!("Reserves Scanned: {}", self.scanned);
        println!("Matching:         {}", self.matched);
        if let Some(block) = self.current_block {
            println!("Checked At Block: {}", block);
        }
        println!("Releasable:       {}", self.releasable.to_string().green());
        println!("Still Locked:     {}", self.locked.to_string().yellow());

        if self.dry_run {
            println!("\n{}", "DRY RUN: No transactions were sent".yellow());
        } else if self.submitted > 0 || self.not_submitted > 0 {
            println!("Submitted:        {}", self.submitted);
            println!("Succeeded:        {} ✓", self.succeeded.to_string().green());
            println!("Failed:           {} ✗", self.failed.to_string().red());
            println!("Unknown:          {} ?", self.unknown.to_string().yellow());
            if self.not_submitted > 0 {
                println!("Not Submitted:    {}", self.not_submitted.to_string().red());
            }
        }

        if !self.batches.is_empty() {
            println!();
            crate::utils::print_table_border(64);
            crate::utils::print_table_row(
                &["Batch", "Block", "Size", "Succeeded", "Failed", "Unknown"],
                &[6, 12, 6, 10, 8, 8],
            );
            crate::utils::print_table_border(64);
            for batch in &self.batches {
                crate::utils::print_table_row(
                    &[
                        &(batch.index + 1).to_string(),
                        &batch.block.to_string(),
                        &batch.size.to_string(),
                        &batch.succeeded.to_string(),
                        &batch.failed.to_string(),
                        &batch.unknown.to_string(),
                    ],
                    &[6, 12, 6, 10, 8, 8],
                );
            }
            crate::utils::print_table_border(64);
        }

        for (job, failure) in &self.failures {
            println!(
                "  {} nonce {} {}: {}",
                "✗".red(),
                job.nonce,
                crate::utils::format_candidate(&job.candidate),
                failure
            );
        }

        println!(
            "Duration:         {}s",
            (self.finished_at - self.started_at).num_seconds()
        );
        println!("{}", "===============================".cyan());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AccountRef, AssetId};

    fn job(nonce: u64, batch_index: u32) -> SubmissionJob {
        SubmissionJob {
            candidate: Candidate {
                owner: AccountRef([nonce as u8; 32]),
                asset_id: AssetId(nonce as u32),
            },
            nonce,
            batch_index,
        }
    }

    fn success() -> JobOutcome {
        JobOutcome::Succeeded {
            block_hash: Some("0x01".to_string()),
        }
    }

    #[test]
    fn test_counts_per_batch() {
        let aggregator = OutcomeAggregator::new();
        for nonce in 0..10 {
            aggregator.register(&job(nonce, 0), 100).unwrap();
        }
        for nonce in 0..10 {
            let outcome = if nonce == 3 {
                JobOutcome::Failed(Failure::Dispatch("CircuitBreaker.AssetInLockdown".to_string()))
            } else {
                success()
            };
            aggregator.record(nonce, outcome).unwrap();
        }

        let report = aggregator.finalize();
        assert_eq!(report.submitted, 10);
        assert_eq!(report.succeeded, 9);
        assert_eq!(report.failed, 1);
        assert_eq!(report.unknown, 0);
        assert_eq!(report.batches.len(), 1);
        assert_eq!(report.batches[0].block, 100);
        assert_eq!(report.batches[0].succeeded, 9);
        assert_eq!(report.batches[0].failed, 1);
        assert_eq!(report.failures[0].0.nonce, 3);
    }

    #[test]
    fn test_duplicate_outcome_rejected() {
        let aggregator = OutcomeAggregator::new();
        aggregator.register(&job(0, 0), 1).unwrap();
        aggregator.record(0, success()).unwrap();

        let err = aggregator
            .record(0, JobOutcome::Failed(Failure::Transport("late".to_string())))
            .unwrap_err();
        assert!(matches!(err, ReleaseError::DuplicateOutcome(0)));

        let report = aggregator.finalize();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_unregistered_outcome_rejected() {
        let aggregator = OutcomeAggregator::new();
        let err = aggregator.record(5, success()).unwrap_err();
        assert!(matches!(err, ReleaseError::UnknownJob(5)));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let aggregator = OutcomeAggregator::new();
        aggregator.register(&job(0, 0), 1).unwrap();
        let err = aggregator.register(&job(0, 1), 2).unwrap_err();
        assert!(matches!(err, ReleaseError::DuplicateJob(0)));
        assert_eq!(aggregator.finalize().submitted, 1);
    }

    #[test]
    fn test_missing_outcomes_are_unknown_not_failed() {
        let aggregator = OutcomeAggregator::new();
        aggregator.register(&job(0, 0), 1).unwrap();
        aggregator.register(&job(1, 0), 1).unwrap();
        aggregator.register(&job(2, 1), 2).unwrap();
        aggregator.record(0, success()).unwrap();

        let report = aggregator.finalize();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.unknown, 2);
        assert_eq!(report.succeeded + report.failed + report.unknown, report.submitted);
        assert_eq!(report.batches[1].unknown, 1);
    }

    /// Collects the fields of every "batch settled" event
    #[derive(Clone, Default)]
    struct BatchEvents(std::sync::Arc<Mutex<Vec<String>>>);

    struct FieldText(String);

    impl tracing::field::Visit for FieldText {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.push_str(&format!("{}={:?} ", field.name(), value));
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for BatchEvents {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            let mut fields = FieldText(String::new());
            event.record(&mut fields);
            if fields.0.contains("batch settled") {
                self.0.lock().unwrap().push(fields.0);
            }
        }
    }

    #[test]
    fn test_finalize_logs_each_batch() {
        use tracing_subscriber::layer::SubscriberExt;

        let events = BatchEvents::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());

        tracing::subscriber::with_default(subscriber, || {
            let aggregator = OutcomeAggregator::new();
            aggregator.register(&job(0, 0), 100).unwrap();
            aggregator.register(&job(1, 0), 100).unwrap();
            aggregator.register(&job(2, 1), 101).unwrap();
            aggregator.record(0, success()).unwrap();
            aggregator
                .record(1, JobOutcome::Failed(Failure::Dispatch("BadOrigin".to_string())))
                .unwrap();
            aggregator.finalize();
        });

        let events = events.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        for field in ["batch=1 ", "block=100 ", "size=2 ", "succeeded=1 ", "failed=1 ", "unknown=0 "] {
            assert!(events[0].contains(field), "{} missing from {}", field, events[0]);
        }
        for field in ["batch=2 ", "block=101 ", "size=1 ", "unknown=1 "] {
            assert!(events[1].contains(field), "{} missing from {}", field, events[1]);
        }
    }

    #[test]
    fn test_apply_submissions() {
        let aggregator = OutcomeAggregator::new();
        aggregator.register(&job(0, 0), 1).unwrap();
        aggregator.record(0, success()).unwrap();
        aggregator.mark_not_submitted(4);

        let mut summary = RunSummary::new(Utc::now());
        summary.apply_submissions(aggregator.finalize());
        let summary = summary.finish();

        assert_eq!(summary.submitted, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.not_submitted, 4);
        assert!(summary.finished_at >= summary.started_at);
    }
}
