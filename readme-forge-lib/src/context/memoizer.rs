//! Cache-aside memoization of repository artifacts keyed by head commit.
//!
//! Keys embed the head commit SHA, so a new push naturally produces new keys and old entries
//! simply age out. Nothing is ever invalidated explicitly. The cache is best effort: store
//! failures are logged and never surface to callers.

use super::cipher::PayloadCipher;
use super::repo_ref::RepoRef;
use super::store::KeyValueStore;
use crate::Result;
use async_trait::async_trait;
use core::fmt::{Debug, Display, Formatter};
use core::time::Duration;
use ohno::IntoAppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

const LOG_TARGET: &str = "  memoizer";

/// Default lifetime of cached artifacts.
pub const DEFAULT_ARTIFACT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The kinds of artifact the context pipeline caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Readme,
    Commits,
    Languages,
    Tree,
    RepoInfo,
    EntryFiles,
    ImportantFiles,
}

impl ArtifactKind {
    pub const ALL: [Self; 7] = [
        Self::Readme,
        Self::Commits,
        Self::Languages,
        Self::Tree,
        Self::RepoInfo,
        Self::EntryFiles,
        Self::ImportantFiles,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Readme => "readme",
            Self::Commits => "commits",
            Self::Languages => "languages",
            Self::Tree => "tree",
            Self::RepoInfo => "repo_info",
            Self::EntryFiles => "entry_files",
            Self::ImportantFiles => "important_files",
        }
    }

    /// Kinds holding repository source text, which is only stored encrypted.
    #[must_use]
    pub const fn is_file_content(self) -> bool {
        matches!(self, Self::EntryFiles | Self::ImportantFiles)
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one cached artifact: `(owner, repo, head SHA, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    owner: Arc<str>,
    repo: Arc<str>,
    sha: Arc<str>,
    kind: ArtifactKind,
}

impl ArtifactKey {
    #[must_use]
    pub fn new(repo: &RepoRef, sha: &str, kind: ArtifactKind) -> Self {
        Self {
            owner: Arc::from(repo.owner()),
            repo: Arc::from(repo.repo()),
            sha: Arc::from(sha),
            kind,
        }
    }

    /// Build the key for `kind` when a head SHA is known.
    #[must_use]
    pub fn for_head(repo: &RepoRef, sha: Option<&str>, kind: ArtifactKind) -> Option<Self> {
        sha.map(|sha| Self::new(repo, sha, kind))
    }

    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        self.kind
    }

    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("readme-forge:artifact:{}/{}:{}:{}", self.owner, self.repo, self.sha, self.kind)
    }
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let short_sha = self.sha.get(..7).unwrap_or(&self.sha);
        write!(f, "{} of {}/{}@{short_sha}", self.kind, self.owner, self.repo)
    }
}

/// Reads and writes one artifact type against backing storage.
#[async_trait]
pub trait ArtifactIo<T>: Send + Sync
where
    T: Send + Sync,
{
    /// `Ok(None)` on a miss.
    async fn read(&self, key: &ArtifactKey) -> Result<Option<T>>;

    async fn write(&self, key: &ArtifactKey, value: &T) -> Result<()>;
}

/// Artifacts stored as plaintext JSON.
#[derive(Debug, Clone)]
pub struct JsonArtifacts {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl JsonArtifacts {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }
}

#[async_trait]
impl<T> ArtifactIo<T> for JsonArtifacts
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn read(&self, key: &ArtifactKey) -> Result<Option<T>> {
        let Some(text) = self.store.get(&key.storage_key()).await? else {
            return Ok(None);
        };

        let value = serde_json::from_str(&text).into_app_err_with(|| format!("deserializing cached {key}"))?;
        Ok(Some(value))
    }

    async fn write(&self, key: &ArtifactKey, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.store.set_with_ttl(&key.storage_key(), &text, self.ttl).await
    }
}

/// Decorates [`JsonArtifacts`] so payloads are encrypted before they reach the store.
#[derive(Debug, Clone)]
pub struct EncryptedArtifacts {
    inner: JsonArtifacts,
    cipher: Arc<dyn PayloadCipher>,
}

impl EncryptedArtifacts {
    #[must_use]
    pub fn new(inner: JsonArtifacts, cipher: Arc<dyn PayloadCipher>) -> Self {
        Self { inner, cipher }
    }
}

#[async_trait]
impl<T> ArtifactIo<T> for EncryptedArtifacts
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn read(&self, key: &ArtifactKey) -> Result<Option<T>> {
        let Some(sealed) = self.inner.store.get(&key.storage_key()).await? else {
            return Ok(None);
        };

        let text = self.cipher.decrypt(&sealed)?;
        let value = serde_json::from_str(&text).into_app_err_with(|| format!("deserializing cached {key}"))?;
        Ok(Some(value))
    }

    async fn write(&self, key: &ArtifactKey, value: &T) -> Result<()> {
        let sealed = self.cipher.encrypt(&serde_json::to_string(value)?)?;
        self.inner.store.set_with_ttl(&key.storage_key(), &sealed, self.inner.ttl).await
    }
}

/// Return the cached artifact for `key`, or run `loader` and cache its result.
///
/// Read failures count as misses and write failures are only logged; either way the caller
/// still gets a value. Errors from `loader` propagate unchanged. Concurrent misses on the same
/// key may each run `loader`; the last write wins.
pub async fn get_or_load_and_cache<T, I, F, Fut, E>(key: &ArtifactKey, io: &I, loader: F) -> Result<T, E>
where
    T: Send + Sync,
    I: ArtifactIo<T> + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match io.read(key).await {
        Ok(Some(value)) => {
            log::debug!(target: LOG_TARGET, "Cache hit for {key}");
            return Ok(value);
        }
        Ok(None) => log::debug!(target: LOG_TARGET, "Cache miss for {key}"),
        Err(e) => log::warn!(target: LOG_TARGET, "Could not read cached {key}, treating as a miss: {e:#}"),
    }

    let value = loader().await?;

    if let Err(e) = io.write(key, &value).await {
        log::warn!(target: LOG_TARGET, "Could not cache {key}: {e:#}");
    }

    Ok(value)
}

/// Routes each artifact kind to plaintext or encrypted storage.
#[derive(Debug, Clone)]
pub struct Memoizer {
    plain: JsonArtifacts,
    encrypted: Option<EncryptedArtifacts>,
}

impl Memoizer {
    /// Without a cipher, file-content artifacts are never cached.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration, cipher: Option<Arc<dyn PayloadCipher>>) -> Self {
        let plain = JsonArtifacts::new(store, ttl);
        let encrypted = cipher.map(|cipher| EncryptedArtifacts::new(plain.clone(), cipher));
        Self { plain, encrypted }
    }

    /// Memoize `loader` under `key`. A missing key (unknown head SHA) bypasses the cache.
    pub async fn get_or_load<T, F, Fut, E>(&self, key: Option<ArtifactKey>, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(key) = key else {
            return loader().await;
        };

        if !key.kind().is_file_content() {
            return get_or_load_and_cache(&key, &self.plain, loader).await;
        }

        match &self.encrypted {
            Some(io) => get_or_load_and_cache(&key, io, loader).await,
            None => {
                log::debug!(target: LOG_TARGET, "No cipher configured, not caching {key}");
                loader().await
            }
        }
    }
}
