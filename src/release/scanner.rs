use tracing::{debug, info};

use crate::{
    error::Result,
    ledger::{Candidate, LedgerClient, ReservationEntry},
};

/// Result of one pass over the reserves map
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Entries read from storage
    pub total: usize,
    /// Entries holding a reservation of the target kind, in storage order
    pub matched: Vec<ReservationEntry>,
}

impl ScanReport {
    pub fn candidates(&self) -> Vec<Candidate> {
        self.matched.iter().map(ReservationEntry::candidate).collect()
    }
}

/// Finds reserves entries tagged with a given reservation kind
pub struct ReservationScanner {
    target_kind: String,
}

impl ReservationScanner {
    pub fn new(target_kind: impl Into<String>) -> Self {
        Self {
            target_kind: target_kind.into(),
        }
    }

    pub fn matches(&self, entry: &ReservationEntry) -> bool {
        entry.has_kind(&self.target_kind)
    }

    /// Keep matching entries, preserving their relative order
    pub fn filter(&self, entries: Vec<ReservationEntry>) -> Vec<ReservationEntry> {
        entries.into_iter().filter(|e| self.matches(e)).collect()
    }

    /// Read the reserves map once and keep the matching entries
    pub async fn scan<C: LedgerClient + ?Sized>(&self, client: &C) -> Result<ScanReport> {
        info!("Fetching all reserves entries...");

        let entries = client.scan_reservations().await?;
        let total = entries.len();
        let matched = self.filter(entries);

        for entry in &matched {
            debug!(
                owner = %entry.owner,
                asset = %entry.asset_id,
                reservations = ?entry.reservations,
                "matching reservation"
            );
        }

        info!(
            kind = %self.target_kind,
            matched = matched.len(),
            total,
            "Found {} entries with id {:?} (out of {} total)",
            matched.len(),
            self.target_kind,
            total
        );

        Ok(ScanReport { total, matched })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AccountRef, AssetId, MockLedgerClient, Reservation};

    fn entry(owner: u8, asset: u32, kinds: &[&str]) -> ReservationEntry {
        ReservationEntry {
            owner: AccountRef([owner; 32]),
            asset_id: AssetId(asset),
            reservations: kinds
                .iter()
                .map(|k| Reservation {
                    kind: k.to_string(),
                    amount: 1_000,
                })
                .collect(),
        }
    }

    #[test]
    fn test_filter_keeps_only_target_kind_in_order() {
        let scanner = ReservationScanner::new("depositc");
        let entries = vec![
            entry(1, 10, &["depositc"]),
            entry(2, 10, &["otc"]),
            entry(3, 11, &["otc", "depositc"]),
            entry(4, 12, &[]),
            entry(5, 13, &["deposit"]),
            entry(6, 14, &["depositc", "depositc"]),
        ];

        let matched = scanner.filter(entries);
        let owners: Vec<u8> = matched.iter().map(|e| e.owner.0[0]).collect();

        assert_eq!(owners, vec![1, 3, 6]);
    }

    #[test]
    fn test_filter_empty_map() {
        let scanner = ReservationScanner::new("depositc");
        assert!(scanner.filter(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_scan_reports_totals_and_candidates() {
        let mut client = MockLedgerClient::new();
        client
            .expect_scan_reservations()
            .times(1)
            .returning(|| Ok(vec![entry(1, 7, &["depositc"]), entry(2, 8, &["otc"])]));

        let report = ReservationScanner::new("depositc").scan(&client).await.unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(
            report.candidates(),
            vec![Candidate {
                owner: AccountRef([1; 32]),
                asset_id: AssetId(7)
            }]
        );
    }
}
