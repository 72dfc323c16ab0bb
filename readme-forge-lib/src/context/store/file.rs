//! A directory of JSON envelopes, one file per key.

use super::KeyValueStore;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core::fmt::Write as _;
use core::time::Duration;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

const LOG_TARGET: &str = "     store";

/// On-disk representation of an entry.
#[derive(Debug, Deserialize, Serialize)]
struct Envelope {
    /// `None` never expires.
    expires_at: Option<DateTime<Utc>>,
    value: String,
}

impl Envelope {
    fn new(value: &str, ttl: Duration, now: DateTime<Utc>) -> Self {
        let expires_at = chrono::Duration::from_std(ttl).ok().and_then(|ttl| now.checked_add_signed(ttl));
        Self {
            expires_at,
            value: value.to_string(),
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

enum Slot {
    Missing,
    /// Parsed, but past its expiry.
    Expired,
    /// Present but unreadable. Never removed, only overwritten by a new value.
    Unreadable,
    Live(String),
}

/// Store that survives process restarts, used by the CLI for the artifact cache.
///
/// Entries are written to a private temporary file and then published under their final name
/// in one step, so readers only ever see complete envelopes. Mutations within a store are
/// serialized; `set_if_absent` publishes with a hard link, which fails if another writer
/// created the entry first.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    writes: Arc<Mutex<()>>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).into_app_err_with(|| format!("creating store directory '{}'", dir.display()))?;
        Ok(Self {
            dir,
            writes: Arc::new(Mutex::new(())),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }

    async fn load(path: &Path) -> Result<Slot> {
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Slot::Missing),
            Err(e) => return Err(e).into_app_err_with(|| format!("reading store entry '{}'", path.display())),
        };

        match serde_json::from_str::<Envelope>(&text) {
            Ok(envelope) if envelope.is_live(Utc::now()) => Ok(Slot::Live(envelope.value)),
            Ok(_) => Ok(Slot::Expired),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Ignoring unreadable store entry '{}': {e:#}", path.display());
                Ok(Slot::Unreadable)
            }
        }
    }

    /// Write `value` to a fresh temporary file next to the entries.
    async fn stage(&self, value: &str, ttl: Duration) -> Result<PathBuf> {
        let json = serde_json::to_vec(&Envelope::new(value, ttl, Utc::now()))?;

        // a leading dot never appears in an encoded key
        let staged = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&staged, json)
            .await
            .into_app_err_with(|| format!("writing store entry '{}'", staged.display()))?;

        Ok(staged)
    }

    /// Move a staged file over `path`, replacing whatever is there.
    async fn publish(staged: &Path, path: &Path) -> Result<()> {
        match fs::rename(staged, path).await {
            Ok(()) => Ok(()),
            Err(e) => {
                discard(staged).await;
                Err(e).into_app_err_with(|| format!("publishing store entry '{}'", path.display()))
            }
        }
    }

    /// Link a staged file to `path` unless `path` already exists. Returns whether it was linked.
    async fn publish_new(staged: &Path, path: &Path) -> Result<bool> {
        let linked = fs::hard_link(staged, path).await;
        discard(staged).await;

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).into_app_err_with(|| format!("creating store entry '{}'", path.display())),
        }
    }

    async fn remove(path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).into_app_err_with(|| format!("removing store entry '{}'", path.display())),
        }
    }
}

async fn discard(staged: &Path) {
    if let Err(e) = fs::remove_file(staged).await {
        log::debug!(target: LOG_TARGET, "Could not remove staged file '{}': {e:#}", staged.display());
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);

        match Self::load(&path).await? {
            Slot::Live(value) => Ok(Some(value)),
            Slot::Expired => {
                // re-check under the write lock: a writer may have replaced the entry meanwhile
                let _guard = self.writes.lock().await;
                if matches!(Self::load(&path).await?, Slot::Expired) {
                    let _ = Self::remove(&path).await?;
                }
                Ok(None)
            }
            Slot::Unreadable | Slot::Missing => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let path = self.path_for(key);
        let staged = self.stage(value, ttl).await?;

        let _guard = self.writes.lock().await;
        Self::publish(&staged, &path).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let path = self.path_for(key);
        let staged = self.stage(value, ttl).await?;

        let _guard = self.writes.lock().await;
        match Self::load(&path).await {
            Ok(Slot::Live(_)) => {
                discard(&staged).await;
                Ok(false)
            }
            Ok(Slot::Expired | Slot::Unreadable) => {
                Self::publish(&staged, &path).await?;
                Ok(true)
            }
            Ok(Slot::Missing) => Self::publish_new(&staged, &path).await,
            Err(e) => {
                discard(&staged).await;
                Err(e)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key);

        let _guard = self.writes.lock().await;
        match Self::load(&path).await? {
            Slot::Live(_) => Self::remove(&path).await,
            Slot::Expired => {
                let _ = Self::remove(&path).await?;
                Ok(false)
            }
            Slot::Unreadable | Slot::Missing => Ok(false),
        }
    }
}

/// Map a store key onto a safe, collision-free file name.
///
/// ASCII alphanumerics, `-` and isolated `.` pass through; every other byte becomes `_XX`
/// (hex), so separators, traversal sequences and `_` itself can never alias another key.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());

    for (i, byte) in key.bytes().enumerate() {
        let leading_dot = byte == b'.' && (i == 0 || key.as_bytes().get(i - 1) == Some(&b'.'));
        if (byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.') && !leading_dot {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "_{byte:02X}");
        }
    }

    encoded
}
