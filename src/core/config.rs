use crate::core::storage::KeyStore;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATA_DIR: &str = ".vidchat";
// Visual search downloads the whole video before answering.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    /// Key given on the command line or through the environment.
    pub api_key: Option<String>,
    pub data_dir: PathBuf,
    pub timeout: Duration,
}

impl Config {
    /// Explicit key first, then the stored one.
    pub fn resolve_api_key(&self, store: &KeyStore) -> Result<Option<String>> {
        if let Some(key) = self.api_key.as_deref().map(str::trim)
            && !key.is_empty()
        {
            return Ok(Some(key.to_string()));
        }
        store.load_api_key()
    }

    pub fn require_api_key(&self, store: &KeyStore) -> Result<String> {
        self.resolve_api_key(store)?.ok_or_else(|| {
            Error::custom(
                "No API key available. Pass --api-key, set GEMINI_API_KEY or run `vidchat key set <KEY>`",
            )
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            api_key: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_wins_over_stored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = KeyStore::open(dir.path()).expect("store");
        store.save_api_key("stored").expect("save");

        let mut config = Config::default();
        assert_eq!(config.require_api_key(&store).expect("key"), "stored");

        config.api_key = Some(" flag ".to_string());
        assert_eq!(config.require_api_key(&store).expect("key"), "flag");

        config.api_key = Some("   ".to_string());
        assert_eq!(config.require_api_key(&store).expect("key"), "stored");
    }

    #[test]
    fn missing_key_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = KeyStore::open(dir.path()).expect("store");
        assert!(Config::default().require_api_key(&store).is_err());
    }
}
