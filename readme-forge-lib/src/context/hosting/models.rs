//! Wire shapes returned by the hosting API and the domain types derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit reduced to what README analysis needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Someone who has committed to the repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contributor {
    #[serde(alias = "login")]
    pub username: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// One entry of a recursive git tree listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl TreeEntry {
    #[must_use]
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

/// Commit as the provider's list endpoint returns it.
#[derive(Debug, Deserialize)]
pub(super) struct CommitEnvelope {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    #[serde(default)]
    committer: Option<Signature>,
    #[serde(default)]
    author: Option<Signature>,
}

#[derive(Debug, Deserialize)]
struct Signature {
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

impl From<CommitEnvelope> for Commit {
    fn from(envelope: CommitEnvelope) -> Self {
        let detail = envelope.commit;
        let timestamp = detail
            .committer
            .and_then(|s| s.date)
            .or_else(|| detail.author.and_then(|s| s.date));

        Self {
            sha: envelope.sha,
            message: detail.message,
            timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TreeResponse {
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_deserialize_github_shape() {
        let json = r#"{
            "sha": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
            "commit": {
                "message": "Fix all the bugs",
                "author": { "name": "Monalisa", "date": "2011-04-14T16:00:49Z" },
                "committer": { "name": "Monalisa", "date": "2011-04-15T16:00:49Z" }
            },
            "committer": null
        }"#;

        let commit: Commit = serde_json::from_str::<CommitEnvelope>(json).unwrap().into();
        assert_eq!(commit.sha, "6dcb09b5b57875f334f61aebed695e2e4193db5e");
        assert_eq!(commit.message, "Fix all the bugs");
        assert_eq!(commit.timestamp.unwrap().to_rfc3339(), "2011-04-15T16:00:49+00:00");
    }

    #[test]
    fn test_commit_falls_back_to_author_date() {
        let json = r#"{
            "sha": "abc",
            "commit": { "message": "m", "author": { "date": "2020-01-01T00:00:00Z" } }
        }"#;

        let commit: Commit = serde_json::from_str::<CommitEnvelope>(json).unwrap().into();
        assert_eq!(commit.timestamp.unwrap().timestamp(), 1_577_836_800);
    }

    #[test]
    fn test_contributor_accepts_login_field() {
        let json = r#"{ "login": "octocat", "avatar_url": "https://avatars/u/1", "contributions": 32 }"#;
        let contributor: Contributor = serde_json::from_str(json).unwrap();
        assert_eq!(contributor.username, "octocat");
        assert_eq!(contributor.avatar_url, "https://avatars/u/1");

        let cached = serde_json::to_string(&contributor).unwrap();
        let back: Contributor = serde_json::from_str(&cached).unwrap();
        assert_eq!(back, contributor);
    }

    #[test]
    fn test_tree_response_deserialize() {
        let json = r#"{
            "sha": "x",
            "tree": [
                { "path": "src", "type": "tree" },
                { "path": "src/main.rs", "type": "blob", "size": 120 }
            ],
            "truncated": false
        }"#;

        let tree: TreeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(tree.tree.len(), 2);
        assert!(!tree.tree[0].is_blob());
        assert!(tree.tree[1].is_blob());
        assert_eq!(tree.tree[1].size, Some(120));
    }
}
