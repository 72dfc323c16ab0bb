//! Repository-context aggregation: provider calls, commit sampling, caching and LLM enrichment.

mod cipher;
mod collector;
mod commits;
mod error;
mod executor;
pub mod hosting;
mod llm;
mod memoizer;
mod pagination;
mod repo_ref;
pub mod store;
mod tree_filter;

pub use cipher::{AesGcmCipher, PayloadCipher};
pub use collector::{ContextCollector, DEFAULT_MAX_CONTRIBUTORS, DEFAULT_MAX_FILES_PER_KIND, FileContent, RepositoryContext};
pub use commits::{CommitSlice, TARGET_INITIAL_COMMITS, get_all_commits, get_commits, pad_initial_commits};
pub use error::{ApiError, ErrorPayload};
pub use executor::{ApiExecutor, DEFAULT_RATE_LIMIT_WAIT_SECS, DEFAULT_REQUEST_TIMEOUT, RawResponse, classify, rate_limit_wait_seconds};
pub use llm::{AnalysisRequest, HttpLlmClient, LlmClient, ReadmeContent, ReadmeMode, RepositoryMetadata};
pub use memoizer::{
    ArtifactIo, ArtifactKey, ArtifactKind, DEFAULT_ARTIFACT_TTL, EncryptedArtifacts, JsonArtifacts, Memoizer, get_or_load_and_cache,
};
pub use pagination::{PageInfo, infer_last_and_middle};
pub use repo_ref::RepoRef;
pub use store::KeyValueStore;
pub use tree_filter::{DEFAULT_MAX_BLOB_SIZE, TreeFilter};
