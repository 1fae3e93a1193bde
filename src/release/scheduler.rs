use futures::{
    future::BoxFuture,
    stream::{FuturesUnordered, StreamExt},
    FutureExt,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::{
    config::ReleaseConfig,
    error::{ReleaseError, Result},
    ledger::{BlockStream, Candidate, LedgerClient, TxStatus},
    release::outcome::{Failure, JobOutcome, OutcomeAggregator, SubmissionJob, SubmissionReport},
};

/// Lifecycle of one submission run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    /// Dispatching one batch per block notification
    Running,
    /// Everything dispatched, waiting for in-flight jobs to settle
    Draining,
    Done,
}

impl SchedulerState {
    fn can_transition_to(self, next: SchedulerState) -> bool {
        use SchedulerState::*;
        matches!(
            (self, next),
            (Idle, Running) | (Idle, Done) | (Running, Draining) | (Draining, Done)
        )
    }
}

/// Status at which a submitted job counts as settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    InBlock,
    Finalized,
}

impl TerminalStatus {
    pub fn is_reached_by(self, status: &TxStatus) -> bool {
        match (self, status) {
            (_, TxStatus::Submitted) => false,
            (TerminalStatus::InBlock, _) => true,
            (TerminalStatus::Finalized, TxStatus::Finalized { .. }) => true,
            (TerminalStatus::Finalized, TxStatus::InBlock { .. }) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub batch_size: usize,
    pub settle_delay: Duration,
    pub terminal: TerminalStatus,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
            settle_delay: Duration::from_secs(crate::config::DEFAULT_SETTLE_SECS),
            terminal: TerminalStatus::InBlock,
        }
    }
}

impl From<&ReleaseConfig> for SchedulerConfig {
    fn from(config: &ReleaseConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            settle_delay: Duration::from_secs(config.settle_secs),
            terminal: if config.wait_for_finalization {
                TerminalStatus::Finalized
            } else {
                TerminalStatus::InBlock
            },
        }
    }
}

/// Split candidates into batches of at most `batch_size`, numbering jobs
/// with consecutive nonces starting at `start_nonce`.
pub fn plan_batches(candidates: &[Candidate], start_nonce: u64, batch_size: usize) -> Vec<Vec<SubmissionJob>> {
    let batch_size = batch_size.max(1);
    let mut nonce = start_nonce;

    candidates
        .chunks(batch_size)
        .enumerate()
        .map(|(batch_index, chunk)| {
            chunk
                .iter()
                .map(|candidate| {
                    let job = SubmissionJob {
                        candidate: *candidate,
                        nonce,
                        batch_index: batch_index as u32,
                    };
                    nonce += 1;
                    job
                })
                .collect()
        })
        .collect()
}

/// Owns the block subscription and releases it exactly once
struct BlockSubscription {
    stream: Option<BlockStream>,
}

impl BlockSubscription {
    fn new(stream: BlockStream) -> Self {
        Self { stream: Some(stream) }
    }

    async fn next(&mut self) -> Option<u64> {
        match self.stream.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        }
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            debug!("Block subscription released");
        }
    }
}

impl Drop for BlockSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

type InFlight<'a> = FuturesUnordered<BoxFuture<'a, (SubmissionJob, JobOutcome)>>;

/// Submits releases in nonce order, one batch per new block
pub struct BatchScheduler<'a, C: LedgerClient + ?Sized> {
    client: &'a C,
    config: SchedulerConfig,
    aggregator: OutcomeAggregator,
    state: SchedulerState,
}

impl<'a, C: LedgerClient + ?Sized> BatchScheduler<'a, C> {
    pub fn new(client: &'a C, config: SchedulerConfig) -> Self {
        Self {
            client,
            config,
            aggregator: OutcomeAggregator::new(),
            state: SchedulerState::Idle,
        }
    }

    fn transition(&mut self, next: SchedulerState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ReleaseError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = ?self.state, to = ?next, "scheduler transition");
        self.state = next;
        Ok(())
    }

    /// Drive every releasable candidate to a terminal outcome or the end of the settle period
    pub async fn run(mut self, releasable: &[Candidate]) -> Result<SubmissionReport> {
        if releasable.is_empty() {
            self.transition(SchedulerState::Done)?;
            return Ok(self.aggregator.finalize());
        }

        let signer = self.client.signer_account();
        let start_nonce = self.client.next_sequence_number(&signer).await?;
        let batches = plan_batches(releasable, start_nonce, self.config.batch_size);
        let total_batches = batches.len();

        info!(
            signer = %signer,
            start_nonce,
            jobs = releasable.len(),
            batches = total_batches,
            batch_size = self.config.batch_size,
            "Submitting {} release(s), one batch per block",
            releasable.len()
        );

        let mut blocks = BlockSubscription::new(self.client.subscribe_new_blocks().await?);
        self.transition(SchedulerState::Running)?;

        let mut pending = batches.into_iter();
        let mut in_flight: InFlight<'a> = FuturesUnordered::new();

        loop {
            tokio::select! {
                block = blocks.next() => match block {
                    Some(height) => match pending.next() {
                        Some(batch) => self.dispatch(batch, height, total_batches, &mut in_flight)?,
                        None => {
                            info!(block = height, in_flight = in_flight.len(), "All batches dispatched, settling");
                            break;
                        }
                    },
                    None => {
                        let remaining: usize = pending.by_ref().map(|batch| batch.len()).sum();
                        warn!(remaining, "Block subscription ended before all batches were dispatched");
                        self.aggregator.mark_not_submitted(remaining);
                        break;
                    }
                },
                Some((job, outcome)) = in_flight.next(), if !in_flight.is_empty() => {
                    self.record(job, outcome);
                }
            }
        }

        self.transition(SchedulerState::Draining)?;

        let settle = tokio::time::sleep(self.config.settle_delay);
        tokio::pin!(settle);

        while !in_flight.is_empty() {
            tokio::select! {
                _ = &mut settle => {
                    warn!(outstanding = in_flight.len(), "Settle period elapsed with submissions still in flight");
                    break;
                }
                Some((job, outcome)) = in_flight.next() => {
                    self.record(job, outcome);
                }
            }
        }

        // Unresolved submissions are cancelled here and reported as unknown
        drop(in_flight);
        blocks.release();
        self.transition(SchedulerState::Done)?;

        Ok(self.aggregator.finalize())
    }

    fn dispatch(
        &self,
        batch: Vec<SubmissionJob>,
        block: u64,
        total_batches: usize,
        in_flight: &mut InFlight<'a>,
    ) -> Result<()> {
        let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
            return Ok(());
        };

        info!(
            batch = first.batch_index + 1,
            of = total_batches,
            block,
            size = batch.len(),
            first_nonce = first.nonce,
            last_nonce = last.nonce,
            "Dispatching batch"
        );

        for job in batch {
            self.aggregator.register(&job, block)?;
            let client = self.client;
            let terminal = self.config.terminal;
            in_flight.push(track_submission(client, job, terminal).boxed());
        }

        Ok(())
    }

    fn record(&self, job: SubmissionJob, outcome: JobOutcome) {
        if let Err(e) = self.aggregator.record(job.nonce, outcome) {
            error!(nonce = job.nonce, "Failed to record outcome: {}", e);
        }
    }
}

/// Submit one job and follow its status stream to the terminal status
async fn track_submission<C: LedgerClient + ?Sized>(
    client: &C,
    job: SubmissionJob,
    terminal: TerminalStatus,
) -> (SubmissionJob, JobOutcome) {
    let mut updates = match client.submit_release(&job.candidate, job.nonce).await {
        Ok(updates) => updates,
        Err(e) => return (job, JobOutcome::Failed(Failure::Transport(e.to_string()))),
    };

    while let Some(update) = updates.next().await {
        let update = match update {
            Ok(update) => update,
            Err(e) => return (job, JobOutcome::Failed(Failure::Transport(e.to_string()))),
        };

        debug!(nonce = job.nonce, status = ?update.status, "status update");
        if !terminal.is_reached_by(&update.status) {
            continue;
        }

        let outcome = match update.dispatch_error {
            Some(detail) => JobOutcome::Failed(Failure::Dispatch(detail)),
            None => JobOutcome::Succeeded {
                block_hash: update.status.block_hash().map(str::to_string),
            },
        };
        return (job, outcome);
    }

    (
        job,
        JobOutcome::Failed(Failure::Transport(
            "status stream closed before reaching a terminal status".to_string(),
        )),
    )
}
