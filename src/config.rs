use serde::Deserialize;
use std::time::Duration;

use crate::error::{ReleaseError, Result};

pub const DEFAULT_ENDPOINT: &str = "ws://host.docker.internal:9999";
pub const DEFAULT_KEYSTORE_PATH: &str = "./account.json";
pub const DEFAULT_KEYSTORE_PASSWORD: &str = "123456";
pub const DEFAULT_TARGET_KIND: &str = "depositc";
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_SETTLE_SECS: u64 = 10;

/// Reserve identifiers on chain are fixed 8-byte arrays.
const MAX_TARGET_KIND_LEN: usize = 8;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub signer: SignerConfig,
    pub release: ReleaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    pub endpoint: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignerConfig {
    pub keystore_path: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReleaseConfig {
    /// Reserve identifier whose deposits get released
    pub target_kind: String,
    /// Submissions dispatched per observed block; 1 means strictly sequential pacing
    pub batch_size: usize,
    /// Wait after the last batch before the run is closed
    pub settle_secs: u64,
    /// Skip lockdown queries entirely and treat every candidate as releasable
    pub check_lockdown: bool,
    /// Treat finality instead of block inclusion as the terminal status
    pub wait_for_finalization: bool,
    /// Stop after classification without submitting anything
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from defaults, `config/default.*`, then `RELEASE_<SECTION>__<KEY>` env vars
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::load_from("config/default")
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .set_default("node.endpoint", DEFAULT_ENDPOINT)?
            .set_default("signer.keystore_path", DEFAULT_KEYSTORE_PATH)?
            .set_default("signer.password", DEFAULT_KEYSTORE_PASSWORD)?
            .set_default("release.target_kind", DEFAULT_TARGET_KIND)?
            .set_default("release.batch_size", DEFAULT_BATCH_SIZE as i64)?
            .set_default("release.settle_secs", DEFAULT_SETTLE_SECS as i64)?
            .set_default("release.check_lockdown", true)?
            .set_default("release.wait_for_finalization", false)?
            .set_default("release.dry_run", false)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("RELEASE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the positional CLI arguments on top of the loaded layers
    pub fn with_overrides(
        mut self,
        endpoint: Option<String>,
        keystore_path: Option<String>,
        password: Option<String>,
    ) -> Self {
        if let Some(endpoint) = endpoint {
            self.node.endpoint = endpoint;
        }
        if let Some(path) = keystore_path {
            self.signer.keystore_path = path;
        }
        if let Some(password) = password {
            self.signer.password = password;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.release.batch_size == 0 {
            return Err(ReleaseError::Config("release.batch_size must be at least 1".to_string()));
        }

        let kind_len = self.release.target_kind.len();
        if kind_len == 0 || kind_len > MAX_TARGET_KIND_LEN {
            return Err(ReleaseError::Config(format!(
                "release.target_kind must be 1..={} bytes, got {:?}",
                MAX_TARGET_KIND_LEN, self.release.target_kind
            )));
        }

        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.release.settle_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let stem = dir.path().join("release").to_string_lossy().to_string();
        (dir, stem)
    }

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load_from("/nonexistent/release-config").unwrap();

        assert_eq!(config.node.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.signer.keystore_path, DEFAULT_KEYSTORE_PATH);
        assert_eq!(config.release.target_kind, "depositc");
        assert_eq!(config.release.batch_size, 10);
        assert_eq!(config.settle_delay(), Duration::from_secs(10));
        assert!(config.release.check_lockdown);
        assert!(!config.release.dry_run);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let (_dir, stem) = write_config(
            r#"
            [node]
            endpoint = "ws://127.0.0.1:9944"

            [release]
            batch_size = 1
            wait_for_finalization = true
            "#,
        );

        let config = Config::load_from(&stem).unwrap();
        assert_eq!(config.node.endpoint, "ws://127.0.0.1:9944");
        assert_eq!(config.release.batch_size, 1);
        assert!(config.release.wait_for_finalization);
        assert_eq!(config.release.settle_secs, DEFAULT_SETTLE_SECS);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let (_dir, stem) = write_config("[release]\nbatch_size = 0\n");

        let err = Config::load_from(&stem).unwrap_err();
        assert!(matches!(err, ReleaseError::Config(_)));
    }

    #[test]
    fn test_oversized_target_kind_rejected() {
        let (_dir, stem) = write_config("[release]\ntarget_kind = \"depositcx\"\n");

        assert!(Config::load_from(&stem).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::load_from("/nonexistent/release-config")
            .unwrap()
            .with_overrides(Some("ws://node:9944".to_string()), None, Some("secret".to_string()));

        assert_eq!(config.node.endpoint, "ws://node:9944");
        assert_eq!(config.signer.keystore_path, DEFAULT_KEYSTORE_PATH);
        assert_eq!(config.signer.password, "secret");
    }
}
