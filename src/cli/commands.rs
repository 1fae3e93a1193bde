use clap::Parser;

use crate::config::{DEFAULT_ENDPOINT, DEFAULT_KEYSTORE_PASSWORD, DEFAULT_KEYSTORE_PATH};

#[derive(Parser, Debug)]
#[command(name = "deposit-release")]
#[command(about = "Release pending deposit reserves whose asset lockdown has expired")]
#[command(version)]
// Positional arguments override `config/default` and `RELEASE_*` settings
pub struct Cli {
    #[arg(value_name = "ENDPOINT", help = format!("Node websocket endpoint [default: {}]", DEFAULT_ENDPOINT))]
    pub endpoint: Option<String>,

    #[arg(value_name = "KEYSTORE", help = format!("Path to the exported account JSON [default: {}]", DEFAULT_KEYSTORE_PATH))]
    pub keystore: Option<String>,

    #[arg(value_name = "PASSWORD", help = format!("Password unlocking the account JSON [default: {}]", DEFAULT_KEYSTORE_PASSWORD))]
    pub password: Option<String>,
}
