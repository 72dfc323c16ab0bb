use super::commits::{CommitSlice, get_all_commits};
use super::hosting::HostingClient;
use super::llm::{AnalysisRequest, LlmClient, RepositoryMetadata};
use super::memoizer::{ArtifactKey, ArtifactKind, Memoizer};
use super::tree_filter::TreeFilter;
use super::{ApiError, RepoRef};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

const LOG_TARGET: &str = " collector";

/// Default number of contributors whose history is sampled.
pub const DEFAULT_MAX_CONTRIBUTORS: usize = 10;

/// Default number of files fetched for each of the entry and important file lists.
pub const DEFAULT_MAX_FILES_PER_KIND: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
}

/// Everything gathered about a repository branch for README work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryContext {
    /// Head commit the context was built from. `None` when it could not be resolved, in which
    /// case nothing was served from or written to the cache.
    pub head_sha: Option<String>,
    pub readme: String,
    pub languages: BTreeMap<String, u64>,
    pub tree: Vec<String>,
    pub commits: Vec<CommitSlice>,
    pub repo_info: RepositoryMetadata,
    pub entry_files: Vec<FileContent>,
    pub important_files: Vec<FileContent>,
}

/// Builds [`RepositoryContext`] values, memoizing every expensive step by head commit.
#[derive(Debug, Clone)]
pub struct ContextCollector {
    hosting: HostingClient,
    llm: Arc<dyn LlmClient>,
    memoizer: Memoizer,
    tree_filter: TreeFilter,
    max_contributors: usize,
    max_files_per_kind: usize,
}

impl ContextCollector {
    #[must_use]
    pub fn new(hosting: HostingClient, llm: Arc<dyn LlmClient>, memoizer: Memoizer) -> Self {
        Self {
            hosting,
            llm,
            memoizer,
            tree_filter: TreeFilter::default(),
            max_contributors: DEFAULT_MAX_CONTRIBUTORS,
            max_files_per_kind: DEFAULT_MAX_FILES_PER_KIND,
        }
    }

    #[must_use]
    pub const fn with_max_contributors(mut self, max_contributors: usize) -> Self {
        self.max_contributors = max_contributors;
        self
    }

    #[must_use]
    pub const fn with_max_files_per_kind(mut self, max_files_per_kind: usize) -> Self {
        self.max_files_per_kind = max_files_per_kind;
        self
    }

    #[must_use]
    pub const fn with_tree_filter(mut self, tree_filter: TreeFilter) -> Self {
        self.tree_filter = tree_filter;
        self
    }

    #[must_use]
    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// Gather README, languages, tree, sampled commits, LLM metadata and key file contents.
    ///
    /// Independent artifacts are fetched concurrently. The first fatal error wins; recoverable
    /// conditions (no README, missing files, unknown head) never fail the whole request.
    pub async fn fetch_repository_context(&self, repo: &RepoRef) -> Result<RepositoryContext, ApiError> {
        let head_sha = self.hosting.head_sha(repo).await?;
        let sha = head_sha.as_deref();

        // every read names the resolved commit so the cached artifacts all describe one snapshot
        let pinned = match sha {
            Some(sha) => repo.at_commit(sha),
            None => {
                log::info!(target: LOG_TARGET, "Could not resolve head of {repo}, caching disabled for this request");
                repo.clone()
            }
        };
        let repo = &pinned;
        let key = |kind| ArtifactKey::for_head(repo, sha, kind);

        let (readme, languages, tree, commits) = tokio::try_join!(
            self.memoizer
                .get_or_load(key(ArtifactKind::Readme), || self.hosting.readme(repo)),
            self.memoizer
                .get_or_load(key(ArtifactKind::Languages), || self.hosting.languages(repo)),
            self.memoizer
                .get_or_load(key(ArtifactKind::Tree), || self.load_tree(repo)),
            self.memoizer
                .get_or_load(key(ArtifactKind::Commits), || self.load_commits(repo)),
        )?;

        let repo_info: RepositoryMetadata = self
            .memoizer
            .get_or_load(key(ArtifactKind::RepoInfo), || async {
                let request = AnalysisRequest {
                    owner: repo.owner(),
                    repo: repo.repo(),
                    readme: &readme,
                    languages: &languages,
                    tree: &tree,
                };
                self.llm.analyze_repository(&request).await
            })
            .await?;

        let (entry_files, important_files) = tokio::try_join!(
            self.memoizer.get_or_load(key(ArtifactKind::EntryFiles), || {
                self.load_files(repo, &repo_info.entry_files, &tree)
            }),
            self.memoizer.get_or_load(key(ArtifactKind::ImportantFiles), || {
                self.load_files(repo, &repo_info.important_files, &tree)
            }),
        )?;

        log::info!(
            target: LOG_TARGET,
            "Collected context for {repo}: {} file(s), {} commit slice(s), {} entry and {} important file(s)",
            tree.len(),
            commits.len(),
            entry_files.len(),
            important_files.len()
        );

        Ok(RepositoryContext {
            head_sha,
            readme,
            languages,
            tree,
            commits,
            repo_info,
            entry_files,
            important_files,
        })
    }

    async fn load_tree(&self, repo: &RepoRef) -> Result<Vec<String>, ApiError> {
        // the trees endpoint also resolves branch names
        let entries = self.hosting.tree(repo, repo.revision()).await?;
        Ok(self.tree_filter.apply(entries))
    }

    async fn load_commits(&self, repo: &RepoRef) -> Result<Vec<CommitSlice>, ApiError> {
        let contributors = self.hosting.contributors(repo, self.max_contributors).await?;
        get_all_commits(&self.hosting, repo, &contributors).await
    }

    /// Fetch the listed files that exist in the filtered tree, dropping any that vanished.
    async fn load_files(&self, repo: &RepoRef, wanted: &[String], tree: &[String]) -> Result<Vec<FileContent>, ApiError> {
        let selected = select_paths(wanted, tree, self.max_files_per_kind);

        let fetches: Vec<_> = selected.iter().map(|path| self.hosting.file_content(repo, path)).collect();
        let contents = try_join_all(fetches).await?;

        Ok(selected
            .into_iter()
            .zip(contents)
            .filter_map(|(path, content)| {
                content.map(|content| FileContent {
                    path: path.to_string(),
                    content,
                })
            })
            .collect())
    }
}

/// Paths from `wanted` that are present in `tree`, deduplicated, in request order, capped at `limit`.
fn select_paths<'a>(wanted: &'a [String], tree: &[String], limit: usize) -> Vec<&'a str> {
    let known: HashSet<&str> = tree.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();

    wanted
        .iter()
        .map(|path| path.trim_start_matches("./").trim_start_matches('/'))
        .filter(|path| known.contains(path) && seen.insert(*path))
        .take(limit)
        .collect()
}
