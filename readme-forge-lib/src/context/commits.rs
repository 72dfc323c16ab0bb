//! Per-contributor commit history sampling.
//!
//! Rather than walking a contributor's entire history, three slices are taken: the first page
//! (latest work), the middle page, and the last page (earliest work). Page counts come from the
//! link header of the first response so the middle and last pages can be fetched concurrently.

use super::hosting::{Commit, Contributor, HostingClient};
use super::pagination::infer_last_and_middle;
use super::{ApiError, RepoRef};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "   commits";

/// Minimum size of the initial-commits slice when an earlier page can pad it.
pub const TARGET_INITIAL_COMMITS: usize = 30;

/// Sampled history for one contributor, or for the whole branch when `contributor` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSlice {
    pub contributor: Option<Contributor>,
    pub latest_commits: Vec<Commit>,
    pub middle_commits: Vec<Commit>,
    pub initial_commits: Vec<Commit>,
}

/// Sample the history of the branch, filtered to `contributor` when given.
///
/// Any page answering 404 fails with [`ApiError::BranchNotFound`].
pub async fn get_commits(
    client: &HostingClient,
    repo: &RepoRef,
    contributor: Option<&Contributor>,
) -> Result<CommitSlice, ApiError> {
    let author = contributor.map(|c| c.username.as_str());
    let first = client.commit_page(repo, author, 1).await?;
    let pages = infer_last_and_middle(first.link.as_deref());

    let mut slice = CommitSlice {
        contributor: contributor.cloned(),
        latest_commits: first.commits,
        ..CommitSlice::default()
    };

    let (Some(last), Some(middle)) = (pages.last_page, pages.middle_page) else {
        return Ok(slice);
    };

    if pages.is_single_page() {
        return Ok(slice);
    }

    log::debug!(
        target: LOG_TARGET,
        "Sampling pages {middle} and {last} of {repo} for {}",
        author.unwrap_or("all contributors")
    );

    let (middle_page, initial_commits) = tokio::try_join!(
        client.commit_page(repo, author, middle),
        fetch_initial_commits(client, repo, author, last),
    )?;

    slice.middle_commits = middle_page.commits;
    slice.initial_commits = initial_commits;
    Ok(slice)
}

/// Sample every contributor concurrently.
///
/// With no contributors (an empty or anonymous history), the branch is sampled once unfiltered.
/// The first failing contributor fails the whole aggregation.
pub async fn get_all_commits(
    client: &HostingClient,
    repo: &RepoRef,
    contributors: &[Contributor],
) -> Result<Vec<CommitSlice>, ApiError> {
    if contributors.is_empty() {
        return Ok(vec![get_commits(client, repo, None).await?]);
    }

    let fetches: Vec<_> = contributors.iter().map(|c| get_commits(client, repo, Some(c))).collect();
    try_join_all(fetches).await
}

async fn fetch_initial_commits(
    client: &HostingClient,
    repo: &RepoRef,
    author: Option<&str>,
    last: u32,
) -> Result<Vec<Commit>, ApiError> {
    let last_commits = client.commit_page(repo, author, last).await?.commits;
    if last_commits.len() >= TARGET_INITIAL_COMMITS || last <= 1 {
        return Ok(last_commits);
    }

    let penultimate = client.commit_page(repo, author, last - 1).await?.commits;
    Ok(pad_initial_commits(penultimate, last_commits, TARGET_INITIAL_COMMITS))
}

/// Prepend the tail of `penultimate` to `last` until `target` entries are reached.
///
/// Provider order is preserved in the result: the borrowed entries are the ones that
/// immediately precede `last` in the listing.
#[must_use]
pub fn pad_initial_commits(penultimate: Vec<Commit>, last: Vec<Commit>, target: usize) -> Vec<Commit> {
    let missing = target.saturating_sub(last.len());
    let skip = penultimate.len().saturating_sub(missing);

    penultimate.into_iter().skip(skip).chain(last).collect()
}
