use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte on-chain account id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountRef(pub [u8; 32]);

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Currency id as used by the tokens pallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u32);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named hold on part of an account's balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub kind: String,
    pub amount: u128,
}

/// One `(owner, asset) -> reservations` entry of the reserves map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationEntry {
    pub owner: AccountRef,
    pub asset_id: AssetId,
    pub reservations: Vec<Reservation>,
}

impl ReservationEntry {
    pub fn has_kind(&self, kind: &str) -> bool {
        self.reservations.iter().any(|r| r.kind == kind)
    }

    pub fn candidate(&self) -> Candidate {
        Candidate {
            owner: self.owner,
            asset_id: self.asset_id,
        }
    }
}

/// An `(owner, asset)` pair whose deposit may be released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub owner: AccountRef,
    pub asset_id: AssetId,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.owner, self.asset_id)
    }
}

/// Per-asset circuit breaker record. Absence of a record is modelled as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockdownState {
    Unlocked,
    LockedUntil(u64),
}

/// Lifecycle status reported for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// Accepted by the node, not yet in a block
    Submitted,
    InBlock { block_hash: String },
    Finalized { block_hash: String },
}

impl TxStatus {
    pub fn block_hash(&self) -> Option<&str> {
        match self {
            TxStatus::Submitted => None,
            TxStatus::InBlock { block_hash } | TxStatus::Finalized { block_hash } => {
                Some(block_hash.as_str())
            }
        }
    }
}

/// One update from a submission's status stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxUpdate {
    pub status: TxStatus,
    /// Decoded dispatch error, only meaningful once the transaction is in a block
    pub dispatch_error: Option<String>,
}

impl TxUpdate {
    pub fn submitted() -> Self {
        Self {
            status: TxStatus::Submitted,
            dispatch_error: None,
        }
    }

    pub fn in_block(block_hash: impl Into<String>) -> Self {
        Self {
            status: TxStatus::InBlock { block_hash: block_hash.into() },
            dispatch_error: None,
        }
    }

    pub fn finalized(block_hash: impl Into<String>) -> Self {
        Self {
            status: TxStatus::Finalized { block_hash: block_hash.into() },
            dispatch_error: None,
        }
    }

    pub fn with_dispatch_error(mut self, error: impl Into<String>) -> Self {
        self.dispatch_error = Some(error.into());
        self
    }
}

/// Basic identification of the connected node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub chain: String,
    pub node_name: String,
    pub node_version: String,
}
