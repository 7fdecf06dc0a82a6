use crate::core::session::ChatSession;
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

pub const API_KEY_NAME: &str = "GEMINI_API_KEY";

const STORAGE_FILE: &str = "storage.json";
const CHATS_DIR: &str = "chats";
const CHAT_PREFIX: &str = "chat_";
const CHAT_SUFFIX: &str = ".md";

#[derive(Debug, Clone)]
pub struct ChatEntry {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

impl ChatEntry {
    pub fn video_id(&self) -> Option<&str> {
        self.name
            .strip_prefix(CHAT_PREFIX)
            .and_then(|rest| rest.strip_suffix(CHAT_SUFFIX))
    }
}

/// String key/value storage kept as one JSON object on disk, the terminal
/// counterpart of the browser's local storage.
#[derive(Debug, Clone)]
pub struct KeyStore {
    root: PathBuf,
}

impl KeyStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure_directory(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn storage_path(&self) -> PathBuf {
        self.root.join(STORAGE_FILE)
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        let path = self.storage_path();
        if !path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::custom(format!(
                "{} does not contain a JSON object",
                path.display()
            ))),
        }
    }

    fn write_all(&self, map: &Map<String, Value>) -> Result<()> {
        let path = self.storage_path();
        let content = serde_json::to_string_pretty(map)?;
        fs::write(&path, content)?;
        restrict_file(&path)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .read_all()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_all()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_all(&map)?;
        debug!(key, "stored value");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut map = self.read_all()?;
        let removed = map.remove(key).is_some();
        if removed {
            self.write_all(&map)?;
        }
        Ok(removed)
    }

    pub fn load_api_key(&self) -> Result<Option<String>> {
        Ok(self.get(API_KEY_NAME)?.filter(|key| !key.trim().is_empty()))
    }

    pub fn save_api_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::custom("API key cannot be empty"));
        }
        self.set(API_KEY_NAME, key)
    }

    pub fn clear_api_key(&self) -> Result<bool> {
        self.remove(API_KEY_NAME)
    }

    fn chats_dir(&self) -> Result<PathBuf> {
        let dir = self.root.join(CHATS_DIR);
        ensure_directory(&dir)?;
        Ok(dir)
    }

    /// Write the session as markdown, replacing an earlier export of the same video.
    pub fn save_chat(&self, session: &ChatSession) -> Result<PathBuf> {
        let path = self
            .chats_dir()?
            .join(format!("{CHAT_PREFIX}{}{CHAT_SUFFIX}", session.video.id));
        fs::write(&path, session.to_markdown())?;
        restrict_file(&path)?;
        info!(path = %path.display(), "chat exported");
        Ok(path)
    }

    pub fn list_chats(&self) -> Result<Vec<ChatEntry>> {
        let mut chats = Vec::new();

        for entry in fs::read_dir(self.chats_dir()?)? {
            let entry = entry?;
            let path = entry.path();

            if let Some(name) = path.file_name().and_then(|n| n.to_str())
                && name.starts_with(CHAT_PREFIX)
                && name.ends_with(CHAT_SUFFIX)
            {
                let metadata = entry.metadata()?;
                chats.push(ChatEntry {
                    name: name.to_string(),
                    path: path.clone(),
                    size: metadata.len(),
                    modified: metadata.modified()?,
                });
            }
        }

        // Newest first
        chats.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(chats)
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = fs::metadata(path)?.permissions();
        if permissions.mode() & 0o777 != 0o700 {
            permissions.set_mode(0o700);
            fs::set_permissions(path, permissions)?;
        }
    }

    Ok(())
}

fn restrict_file(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::VideoRef;

    fn store() -> (tempfile::TempDir, KeyStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = KeyStore::open(dir.path().join("data")).expect("open store");
        (dir, store)
    }

    #[test]
    fn api_key_round_trips_and_clears() {
        let (_dir, store) = store();
        assert_eq!(store.load_api_key().expect("load"), None);

        store.save_api_key("  abc123  ").expect("save");
        assert_eq!(store.load_api_key().expect("load").as_deref(), Some("abc123"));

        // A second handle sees the same file.
        let reopened = KeyStore::open(store.root()).expect("reopen");
        assert_eq!(reopened.get(API_KEY_NAME).expect("get").as_deref(), Some("abc123"));

        assert!(store.clear_api_key().expect("clear"));
        assert!(!store.clear_api_key().expect("clear again"));
        assert_eq!(store.load_api_key().expect("load"), None);
    }

    #[test]
    fn rejects_blank_api_key() {
        let (_dir, store) = store();
        assert!(store.save_api_key("   ").is_err());
    }

    #[test]
    fn keeps_unrelated_keys() {
        let (_dir, store) = store();
        store.set("theme", "dark").expect("set");
        store.save_api_key("k").expect("save");
        store.clear_api_key().expect("clear");
        assert_eq!(store.get("theme").expect("get").as_deref(), Some("dark"));
    }

    #[cfg(unix)]
    #[test]
    fn storage_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        store.save_api_key("k").expect("save");
        let mode = fs::metadata(store.root().join(STORAGE_FILE))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn exports_and_lists_chats() {
        let (_dir, store) = store();
        let video = VideoRef::parse("dQw4w9WgXcQ").expect("valid id");
        let mut session = ChatSession::new(video);
        session.push_answer("What?".to_string(), "At 00:10.".to_string());

        let path = store.save_chat(&session).expect("save chat");
        assert!(path.ends_with("chats/chat_dQw4w9WgXcQ.md"));

        let chats = store.list_chats().expect("list");
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].video_id(), Some("dQw4w9WgXcQ"));
        assert!(fs::read_to_string(path).expect("read").contains("What?"));
    }
}
