use crate::Result;
use core::fmt::{Debug, Display, Formatter};
use ohno::bail;
use std::sync::Arc;

/// A repository branch together with the token used to read it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    owner: Arc<str>,
    repo: Arc<str>,
    branch: Arc<str>,
    /// Commit the reads are pinned to, once resolved.
    revision: Option<Arc<str>>,
    token: Arc<str>,
}

impl RepoRef {
    pub fn new(owner: &str, repo: &str, branch: &str, token: &str) -> Result<Self> {
        if owner.is_empty() || repo.is_empty() {
            bail!("invalid repository reference: empty owner or repo name");
        }

        if branch.is_empty() {
            bail!("invalid repository reference: empty branch for {owner}/{repo}");
        }

        Ok(Self {
            owner: Arc::from(owner),
            repo: Arc::from(repo.trim_end_matches(".git")),
            branch: Arc::from(branch),
            revision: None,
            token: Arc::from(token),
        })
    }

    /// Parse an `owner/repo` slug.
    pub fn parse(slug: &str, branch: &str, token: &str) -> Result<Self> {
        let mut segments = slug.trim_matches('/').split('/');

        let (Some(owner), Some(repo), None) = (segments.next(), segments.next(), segments.next()) else {
            bail!("invalid repository slug '{slug}', expected 'owner/repo'");
        };

        Self::new(owner, repo, branch, token)
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Pin subsequent reads to `sha` instead of the moving branch tip.
    #[must_use]
    pub fn at_commit(&self, sha: &str) -> Self {
        Self {
            revision: Some(Arc::from(sha)),
            ..self.clone()
        }
    }

    /// The ref reads should name: the pinned commit if any, else the branch.
    #[must_use]
    pub fn revision(&self) -> &str {
        self.revision.as_deref().unwrap_or(&self.branch)
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Display for RepoRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

impl Debug for RepoRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RepoRef")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("revision", &self.revision)
            .field("token", &"<redacted>")
            .finish()
    }
}
