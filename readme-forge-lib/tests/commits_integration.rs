//! Integration tests for commit history sampling using wiremock

use core::time::Duration;
use readme_forge_lib::context::hosting::{Contributor, HostingClient};
use readme_forge_lib::context::{ApiExecutor, RepoRef, TARGET_INITIAL_COMMITS, get_all_commits, get_commits};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMMITS_PATH: &str = "/repos/octo/hello/commits";

fn client(server: &MockServer) -> HostingClient {
    let executor = ApiExecutor::new(Duration::from_secs(5)).unwrap();
    HostingClient::new(executor, &server.uri()).unwrap()
}

fn repo() -> RepoRef {
    RepoRef::new("octo", "hello", "main", "").unwrap()
}

fn contributor(name: &str) -> Contributor {
    Contributor {
        username: name.to_string(),
        avatar_url: String::new(),
    }
}

/// A page of `count` commits whose SHAs are `{prefix}{index}`.
fn commit_page(prefix: &str, count: usize) -> Value {
    (0..count)
        .map(|i| {
            json!({
                "sha": format!("{prefix}{i}"),
                "commit": {
                    "message": format!("{prefix} change {i}"),
                    "committer": {"date": "2024-03-01T12:00:00Z"}
                }
            })
        })
        .collect()
}

fn link_to_last(server: &MockServer, last: u32) -> String {
    format!(
        r#"<{uri}{COMMITS_PATH}?sha=main&per_page=40&page=2>; rel="next", <{uri}{COMMITS_PATH}?sha=main&per_page=40&page={last}>; rel="last""#,
        uri = server.uri()
    )
}

async fn mount_page(server: &MockServer, page: u32, body: Value, link: Option<String>, hits: u64) {
    let mut response = ResponseTemplate::new(200).set_body_json(body);
    if let Some(link) = link {
        response = response.insert_header("link", link.as_str());
    }

    Mock::given(method("GET"))
        .and(path(COMMITS_PATH))
        .and(query_param("page", page.to_string().as_str()))
        .respond_with(response)
        .expect(hits)
        .mount(server)
        .await;
}

fn shas(commits: &[readme_forge_lib::context::hosting::Commit]) -> Vec<&str> {
    commits.iter().map(|c| c.sha.as_str()).collect()
}

#[tokio::test]
async fn test_single_page_history_fetches_once() {
    let server = MockServer::start().await;
    mount_page(&server, 1, commit_page("a", 7), None, 1).await;

    let slice = get_commits(&client(&server), &repo(), None).await.unwrap();

    assert_eq!(slice.latest_commits.len(), 7);
    assert!(slice.middle_commits.is_empty());
    assert!(slice.initial_commits.is_empty());
    assert!(slice.contributor.is_none());
    assert!(slice.latest_commits[0].timestamp.is_some());
}

#[tokio::test]
async fn test_middle_and_last_pages_with_padding() {
    let server = MockServer::start().await;

    mount_page(&server, 1, commit_page("p1-", 40), Some(link_to_last(&server, 5)), 1).await;
    mount_page(&server, 3, commit_page("p3-", 40), None, 1).await;
    mount_page(&server, 4, commit_page("p4-", 40), None, 1).await;
    mount_page(&server, 5, commit_page("p5-", 12), None, 1).await;

    let slice = get_commits(&client(&server), &repo(), None).await.unwrap();

    assert_eq!(slice.latest_commits.len(), 40);
    assert_eq!(slice.middle_commits[0].sha, "p3-0");
    assert_eq!(slice.initial_commits.len(), TARGET_INITIAL_COMMITS);

    // the tail of page 4 followed by all of page 5, in provider order
    let initial = shas(&slice.initial_commits);
    assert_eq!(initial[0], "p4-22");
    assert_eq!(initial[17], "p4-39");
    assert_eq!(initial[18], "p5-0");
    assert_eq!(initial[29], "p5-11");
}

#[tokio::test]
async fn test_full_last_page_needs_no_padding() {
    let server = MockServer::start().await;

    mount_page(&server, 1, commit_page("p1-", 40), Some(link_to_last(&server, 4)), 1).await;
    mount_page(&server, 2, commit_page("p2-", 40), None, 1).await;
    mount_page(&server, 3, commit_page("p3-", 40), None, 0).await;
    mount_page(&server, 4, commit_page("p4-", 35), None, 1).await;

    let slice = get_commits(&client(&server), &repo(), None).await.unwrap();

    assert_eq!(slice.middle_commits[0].sha, "p2-0");
    assert_eq!(slice.initial_commits.len(), 35);
    assert_eq!(slice.initial_commits[0].sha, "p4-0");
}

#[tokio::test]
async fn test_unparseable_last_link_is_treated_as_single_page() {
    let server = MockServer::start().await;
    let link = format!(r#"<{}{COMMITS_PATH}?sha=main&page=banana>; rel="last""#, server.uri());

    mount_page(&server, 1, commit_page("a", 40), Some(link), 1).await;

    let slice = get_commits(&client(&server), &repo(), None).await.unwrap();
    assert_eq!(slice.latest_commits.len(), 40);
    assert!(slice.middle_commits.is_empty());
}

#[tokio::test]
async fn test_contributors_are_sampled_with_author_filter() {
    let server = MockServer::start().await;

    for (author, prefix) in [("alice", "al"), ("bob", "bo")] {
        Mock::given(method("GET"))
            .and(path(COMMITS_PATH))
            .and(query_param("author", author))
            .and(query_param("per_page", "20"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(commit_page(prefix, 3)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let slices = get_all_commits(&client(&server), &repo(), &[contributor("alice"), contributor("bob")])
        .await
        .unwrap();

    assert_eq!(slices.len(), 2);
    assert_eq!(slices[0].contributor.as_ref().unwrap().username, "alice");
    assert_eq!(slices[0].latest_commits[0].sha, "al0");
    assert_eq!(slices[1].contributor.as_ref().unwrap().username, "bob");
    assert_eq!(slices[1].latest_commits[0].sha, "bo0");
}

#[tokio::test]
async fn test_no_contributors_samples_whole_branch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(COMMITS_PATH))
        .and(query_param("per_page", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(commit_page("c", 2)))
        .expect(1)
        .mount(&server)
        .await;

    let slices = get_all_commits(&client(&server), &repo(), &[]).await.unwrap();

    assert_eq!(slices.len(), 1);
    assert!(slices[0].contributor.is_none());
    assert_eq!(slices[0].latest_commits.len(), 2);
}

#[tokio::test]
async fn test_missing_branch_fails_the_aggregation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(COMMITS_PATH))
        .and(query_param("author", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(commit_page("al", 1)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(COMMITS_PATH))
        .and(query_param("author", "bob"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = get_all_commits(&client(&server), &repo(), &[contributor("alice"), contributor("bob")])
        .await
        .unwrap_err();

    assert_eq!(err.code(), "BRANCH_NOT_FOUND");
}
