//! GitHub REST client
//!
//! Thin typed layer over [`ApiExecutor`] for the handful of repository endpoints the context
//! pipeline reads. Each method issues exactly one request.

use super::models::{Commit, CommitEnvelope, Contributor, TreeEntry, TreeResponse};
use crate::context::{ApiError, ApiExecutor, RawResponse, RepoRef};
use core::convert::Infallible;
use ohno::bail;
use std::collections::BTreeMap;
use url::Url;

const LOG_TARGET: &str = "   hosting";

/// Public GitHub API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw+json";
const ACCEPT_SHA: &str = "application/vnd.github.sha";

/// Commits per page when listing a whole branch.
pub const UNFILTERED_PAGE_SIZE: u32 = 40;

/// Commits per page when listing one contributor's history.
pub const FILTERED_PAGE_SIZE: u32 = 20;

/// One page of a commit listing with the pagination header that came with it.
#[derive(Debug, Clone)]
pub struct CommitPage {
    pub commits: Vec<Commit>,
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HostingClient {
    executor: ApiExecutor,
    base_url: Url,
}

impl HostingClient {
    pub fn new(executor: ApiExecutor, base_url: &str) -> crate::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            bail!("API base URL '{base_url}' cannot carry path segments");
        }

        Ok(Self { executor, base_url })
    }

    /// Resolve the current head commit of the branch.
    ///
    /// A missing branch or an empty repository yields `None`, which disables caching for
    /// the request rather than failing it.
    pub async fn head_sha(&self, repo: &RepoRef) -> Result<Option<String>, ApiError> {
        let url = self.repo_url(repo, &["commits", repo.branch()]);
        let request = self.executor.get(url.as_str(), repo.token(), ACCEPT_SHA);

        self.executor
            .execute_or_recover(
                request,
                |raw| {
                    let sha = raw.body().trim();
                    if sha.is_empty() {
                        Err("empty commit SHA")
                    } else {
                        Ok(Some(sha.to_string()))
                    }
                },
                "resolve head commit",
                // 409 is an empty repository, 422 an unknown ref
                |e| matches!(e.status(), Some(404 | 409 | 422)).then_some(None),
            )
            .await
    }

    /// List up to `limit` contributors, most active first.
    pub async fn contributors(&self, repo: &RepoRef, limit: usize) -> Result<Vec<Contributor>, ApiError> {
        let mut url = self.repo_url(repo, &["contributors"]);
        let _ = url.query_pairs_mut().append_pair("per_page", &limit.to_string());
        let request = self.executor.get(url.as_str(), repo.token(), ACCEPT_JSON);

        let mut contributors = self
            .executor
            .execute(
                request,
                |raw| {
                    // an empty repository answers 204 with no body
                    if raw.body().trim().is_empty() {
                        Ok(Vec::new())
                    } else {
                        serde_json::from_str::<Vec<Contributor>>(raw.body())
                    }
                },
                "list contributors",
            )
            .await?;

        contributors.truncate(limit);
        log::debug!(target: LOG_TARGET, "Found {} contributor(s) for {repo}", contributors.len());
        Ok(contributors)
    }

    /// Fetch one page of the branch's commit history, optionally filtered to one author.
    ///
    /// A 404 here always means the branch is gone, so it surfaces as
    /// [`ApiError::BranchNotFound`] and is never recovered.
    pub async fn commit_page(&self, repo: &RepoRef, author: Option<&str>, page: u32) -> Result<CommitPage, ApiError> {
        let per_page = if author.is_some() {
            FILTERED_PAGE_SIZE
        } else {
            UNFILTERED_PAGE_SIZE
        };

        let mut url = self.repo_url(repo, &["commits"]);
        {
            let mut query = url.query_pairs_mut();
            let _ = query.append_pair("sha", repo.revision());
            if let Some(author) = author {
                let _ = query.append_pair("author", author);
            }
            let _ = query
                .append_pair("per_page", &per_page.to_string())
                .append_pair("page", &page.to_string());
        }

        let request = self.executor.get(url.as_str(), repo.token(), ACCEPT_JSON);
        let operation = format!("list commits page {page}");

        self.executor
            .execute(request, parse_commit_page, &operation)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    ApiError::BranchNotFound {
                        owner: repo.owner().to_string(),
                        repo: repo.repo().to_string(),
                        branch: repo.branch().to_string(),
                    }
                } else {
                    e
                }
            })
    }

    /// Bytes of code per language.
    pub async fn languages(&self, repo: &RepoRef) -> Result<BTreeMap<String, u64>, ApiError> {
        let url = self.repo_url(repo, &["languages"]);
        let request = self.executor.get(url.as_str(), repo.token(), ACCEPT_JSON);

        self.executor
            .execute(request, |raw| serde_json::from_str(raw.body()), "read language statistics")
            .await
    }

    /// Every file (blob) reachable from `sha`.
    pub async fn tree(&self, repo: &RepoRef, sha: &str) -> Result<Vec<TreeEntry>, ApiError> {
        let mut url = self.repo_url(repo, &["git", "trees", sha]);
        let _ = url.query_pairs_mut().append_pair("recursive", "1");
        let request = self.executor.get(url.as_str(), repo.token(), ACCEPT_JSON);

        let response: TreeResponse = self
            .executor
            .execute(request, |raw| serde_json::from_str(raw.body()), "read file tree")
            .await?;

        if response.truncated {
            log::warn!(target: LOG_TARGET, "File tree for {repo} was truncated by the provider");
        }

        Ok(response.tree.into_iter().filter(TreeEntry::is_blob).collect())
    }

    /// The README at the branch head, or an empty string when the repository has none.
    pub async fn readme(&self, repo: &RepoRef) -> Result<String, ApiError> {
        let mut url = self.repo_url(repo, &["readme"]);
        let _ = url.query_pairs_mut().append_pair("ref", repo.revision());
        let request = self.executor.get(url.as_str(), repo.token(), ACCEPT_RAW);

        self.executor
            .execute_or_recover(request, raw_text, "read README", |e| e.is_not_found().then(String::new))
            .await
    }

    /// Raw content of one file at the branch head, or `None` when it does not exist.
    pub async fn file_content(&self, repo: &RepoRef, path: &str) -> Result<Option<String>, ApiError> {
        let mut segments = vec!["contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));

        let mut url = self.repo_url(repo, &segments);
        let _ = url.query_pairs_mut().append_pair("ref", repo.revision());
        let request = self.executor.get(url.as_str(), repo.token(), ACCEPT_RAW);
        let operation = format!("read file '{path}'");

        self.executor
            .execute_or_recover(
                request,
                |raw| raw_text(raw).map(Some),
                &operation,
                |e| e.is_not_found().then_some(None),
            )
            .await
    }

    fn repo_url(&self, repo: &RepoRef, tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            let _ = segments
                .pop_if_empty()
                .extend(["repos", repo.owner(), repo.repo()])
                .extend(tail);
        }
        url
    }
}

fn parse_commit_page(raw: &RawResponse) -> Result<CommitPage, serde_json::Error> {
    let envelopes: Vec<CommitEnvelope> = serde_json::from_str(raw.body())?;

    Ok(CommitPage {
        commits: envelopes.into_iter().map(Commit::from).collect(),
        link: raw.link().map(str::to_string),
    })
}

fn raw_text(raw: &RawResponse) -> Result<String, Infallible> {
    Ok(raw.body().to_string())
}
