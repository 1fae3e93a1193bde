use serde::Deserialize;
use std::path::Path;

use crate::error::{ReleaseError, Result};

/// Signature scheme declared by a keystore file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Sr25519,
    Ed25519,
}

#[derive(Debug, Deserialize)]
struct KeystoreJson {
    #[serde(default)]
    encoding: Option<KeystoreEncoding>,
}

#[derive(Debug, Deserialize)]
struct KeystoreEncoding {
    #[serde(default)]
    content: Vec<String>,
}

/// A polkadot-js style exported account, still encrypted
#[derive(Debug, Clone)]
pub struct Keystore {
    pub json: String,
    pub key_type: KeyType,
}

impl Keystore {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ReleaseError::Keystore(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse(json)
            .map_err(|e| ReleaseError::Keystore(format!("Failed to load signer from {}: {}", path.display(), e)))
    }

    pub fn parse(json: String) -> Result<Self> {
        let parsed: KeystoreJson = serde_json::from_str(&json)?;

        // Anything not explicitly ed25519 is treated as sr25519
        let key_type = match &parsed.encoding {
            Some(encoding) if encoding.content.iter().any(|c| c == "ed25519") => KeyType::Ed25519,
            _ => KeyType::Sr25519,
        };

        Ok(Self {
            json,
            key_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sr25519_detected() {
        let json = r#"{"address":"5Grw","encoding":{"content":["pkcs8","sr25519"],"type":["scrypt","xsalsa20-poly1305"],"version":"3"}}"#;
        let keystore = Keystore::parse(json.to_string()).unwrap();

        assert_eq!(keystore.key_type, KeyType::Sr25519);
    }

    #[test]
    fn test_ed25519_detected() {
        let json = r#"{"encoding":{"content":["pkcs8","ed25519"]}}"#;
        let keystore = Keystore::parse(json.to_string()).unwrap();

        assert_eq!(keystore.key_type, KeyType::Ed25519);
    }

    #[test]
    fn test_missing_encoding_defaults_to_sr25519() {
        let keystore = Keystore::parse("{}".to_string()).unwrap();
        assert_eq!(keystore.key_type, KeyType::Sr25519);
    }

    #[test]
    fn test_load_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();

        let err = Keystore::load(file.path()).unwrap_err();
        assert!(matches!(err, ReleaseError::Keystore(_)));
        assert!(err.to_string().contains("Failed to load signer"));
    }

    #[test]
    fn test_missing_file() {
        let err = Keystore::load("/nonexistent/account.json").unwrap_err();
        assert!(matches!(err, ReleaseError::Keystore(_)));
    }
}
