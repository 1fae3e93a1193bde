use chrono::Utc;
use tracing::{info, warn};

use crate::{
    config::ReleaseConfig,
    error::Result,
    ledger::LedgerClient,
    release::{
        classifier::LockdownClassifier,
        outcome::RunSummary,
        scanner::ReservationScanner,
        scheduler::{BatchScheduler, SchedulerConfig},
    },
};

/// Runs one scan → classify → submit pass against a connected ledger
pub struct ReleaseOrchestrator<'a, C: LedgerClient + ?Sized> {
    client: &'a C,
    config: ReleaseConfig,
}

impl<'a, C: LedgerClient + ?Sized> ReleaseOrchestrator<'a, C> {
    pub fn new(client: &'a C, config: ReleaseConfig) -> Self {
        Self { client, config }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::new(Utc::now());

        let scan = ReservationScanner::new(self.config.target_kind.as_str())
            .scan(self.client)
            .await?;
        summary.scanned = scan.total;
        summary.matched = scan.matched.len();

        if scan.matched.is_empty() {
            info!("No matching reserves found. Nothing to release.");
            return Ok(summary.finish());
        }

        let candidates = scan.candidates();
        let current_block = self.client.current_block_height().await?;
        summary.current_block = Some(current_block);
        info!(current_block, "Current block");

        let report = LockdownClassifier::new(self.client, self.config.check_lockdown)
            .classify_all(&candidates, current_block)
            .await?;
        summary.releasable = report.releasable.len();
        summary.locked = report.locked.len();

        for locked in &report.locked {
            warn!(
                asset = %locked.candidate.asset_id,
                owner = %locked.candidate.owner,
                until_block = locked.until,
                blocks_remaining = locked.blocks_remaining(current_block),
                "Skipping asset still in lockdown"
            );
        }

        if report.releasable.is_empty() {
            info!("No releasable deposits found (all assets still in lockdown).");
            return Ok(summary.finish());
        }

        if self.config.dry_run {
            summary.dry_run = true;
            info!(
                releasable = report.releasable.len(),
                "DRY RUN: would submit {} release(s)",
                report.releasable.len()
            );
            return Ok(summary.finish());
        }

        let submissions = BatchScheduler::new(self.client, SchedulerConfig::from(&self.config))
            .run(&report.releasable)
            .await?;
        summary.apply_submissions(submissions);

        info!(
            submitted = summary.submitted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            unknown = summary.unknown,
            "Release run complete"
        );

        if summary.locked > 0 {
            info!("{} asset(s) were skipped due to active lockdown", summary.locked);
        }

        Ok(summary.finish())
    }
}
