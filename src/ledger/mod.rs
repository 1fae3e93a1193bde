pub mod client;
pub mod keystore;
#[cfg(feature = "substrate")]
pub mod substrate;
pub mod types;

pub use client::{BlockStream, LedgerClient, TxUpdateStream};
#[cfg(test)]
pub use client::MockLedgerClient;
pub use keystore::{KeyType, Keystore};
#[cfg(feature = "substrate")]
pub use substrate::SubstrateClient;
pub use types::{
    AccountRef, AssetId, Candidate, LockdownState, NodeInfo, Reservation, ReservationEntry, TxStatus,
    TxUpdate,
};
