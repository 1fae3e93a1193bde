pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod release;
pub mod utils;

pub use crate::config::Config;
pub use crate::error::{ReleaseError, Result};
