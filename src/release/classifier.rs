use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::{ReleaseError, Result},
    ledger::{Candidate, LedgerClient, LockdownState},
};

/// Snapshot verdict for one candidate at the block it was classified against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    Releasable,
    Locked { until: u64 },
}

/// Decide whether an asset may be released at `current_block`.
///
/// A lock is still active on its final block: `until == current_block` is locked.
pub fn classify(state: Option<&LockdownState>, current_block: u64) -> Classification {
    match state {
        None | Some(LockdownState::Unlocked) => Classification::Releasable,
        Some(LockdownState::LockedUntil(until)) if *until >= current_block => {
            Classification::Locked { until: *until }
        }
        Some(LockdownState::LockedUntil(_)) => Classification::Releasable,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockedCandidate {
    pub candidate: Candidate,
    pub until: u64,
}

impl LockedCandidate {
    pub fn blocks_remaining(&self, current_block: u64) -> u64 {
        self.until.saturating_sub(current_block)
    }
}

/// Outcome of a full classification pass
#[derive(Debug, Clone, Default)]
pub struct ClassificationReport {
    pub current_block: u64,
    pub releasable: Vec<Candidate>,
    pub locked: Vec<LockedCandidate>,
}

/// Classifies candidates against the lockdown map, one query per candidate
pub struct LockdownClassifier<'a, C: LedgerClient + ?Sized> {
    client: &'a C,
    check_lockdown: bool,
}

impl<'a, C: LedgerClient + ?Sized> LockdownClassifier<'a, C> {
    pub fn new(client: &'a C, check_lockdown: bool) -> Self {
        Self {
            client,
            check_lockdown,
        }
    }

    /// Classify every candidate against a single block height.
    ///
    /// Any failed query aborts the pass; a candidate is never released unclassified.
    pub async fn classify_all(
        &self,
        candidates: &[Candidate],
        current_block: u64,
    ) -> Result<ClassificationReport> {
        let mut report = ClassificationReport {
            current_block,
            ..Default::default()
        };

        if !self.check_lockdown {
            warn!("Lockdown check disabled, treating {} candidate(s) as releasable", candidates.len());
            report.releasable = candidates.to_vec();
            return Ok(report);
        }

        info!("Checking lockdown status for {} asset(s) at block {}", candidates.len(), current_block);

        for candidate in candidates {
            let state = self
                .client
                .lockdown_state(candidate.asset_id)
                .await
                .map_err(|e| ReleaseError::Classification {
                    asset: candidate.asset_id.0,
                    message: e.to_string(),
                })?;

            match classify(state.as_ref(), current_block) {
                Classification::Releasable => {
                    info!(
                        owner = %candidate.owner,
                        asset = %candidate.asset_id,
                        lockdown = ?state,
                        "releasable"
                    );
                    report.releasable.push(*candidate);
                }
                Classification::Locked { until } => {
                    info!(
                        owner = %candidate.owner,
                        asset = %candidate.asset_id,
                        until_block = until,
                        current_block,
                        "still in lockdown"
                    );
                    report.locked.push(LockedCandidate {
                        candidate: *candidate,
                        until,
                    });
                }
            }
        }

        info!(
            releasable = report.releasable.len(),
            locked = report.locked.len(),
            "Classification complete"
        );

        Ok(report)
    }
}
