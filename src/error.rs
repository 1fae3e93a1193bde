use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Keystore error: {0}")]
    Keystore(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("Ledger RPC error: {0}")]
    Rpc(String),

    #[cfg(feature = "substrate")]
    #[error("Substrate client error: {0}")]
    Subxt(#[from] subxt::Error),

    #[error("Lockdown query failed for asset {asset}: {message}")]
    Classification { asset: u32, message: String },

    #[error("Outcome for job with nonce {0} was already recorded")]
    DuplicateOutcome(u64),

    #[error("Submission job with nonce {0} was registered twice")]
    DuplicateJob(u64),

    #[error("No submission job registered with nonce {0}")]
    UnknownJob(u64),

    #[error("Invalid scheduler transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: crate::release::SchedulerState,
        to: crate::release::SchedulerState,
    },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ReleaseError>;
