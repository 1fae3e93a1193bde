use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::ledger::types::{
    AccountRef, AssetId, Candidate, LockdownState, NodeInfo, ReservationEntry, TxUpdate,
};

/// Status updates of one submitted transaction, ending after a terminal status or an error
pub type TxUpdateStream = BoxStream<'static, Result<TxUpdate>>;

/// Heights of newly imported blocks
pub type BlockStream = BoxStream<'static, u64>;

/// Capabilities the release run needs from a connected node.
///
/// Implementations own the connection and the signing credential; the release
/// logic never builds, encodes or signs transactions itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn node_info(&self) -> Result<NodeInfo>;

    /// Account that signs every submitted release
    fn signer_account(&self) -> AccountRef;

    /// Read the full reserves map
    async fn scan_reservations(&self) -> Result<Vec<ReservationEntry>>;

    async fn current_block_height(&self) -> Result<u64>;

    async fn lockdown_state(&self, asset_id: AssetId) -> Result<Option<LockdownState>>;

    /// Next valid transaction nonce for `account`
    async fn next_sequence_number(&self, account: &AccountRef) -> Result<u64>;

    /// Sign a release for `candidate` with the given nonce and submit it
    async fn submit_release(&self, candidate: &Candidate, nonce: u64) -> Result<TxUpdateStream>;

    async fn subscribe_new_blocks(&self) -> Result<BlockStream>;

    async fn disconnect(&self);
}
