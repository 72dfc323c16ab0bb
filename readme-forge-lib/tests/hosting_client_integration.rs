//! Integration tests for the GitHub client and request executor using wiremock

use core::time::Duration;
use readme_forge_lib::context::hosting::HostingClient;
use readme_forge_lib::context::{ApiError, ApiExecutor, RepoRef};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HostingClient {
    let executor = ApiExecutor::new(Duration::from_secs(5)).unwrap();
    HostingClient::new(executor, &server.uri()).unwrap()
}

fn repo(token: &str) -> RepoRef {
    RepoRef::new("octo", "hello", "main", token).unwrap()
}

#[tokio::test]
async fn test_head_sha_is_read_as_plain_text() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/commits/main"))
        .and(header("accept", "application/vnd.github.sha"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0123456789abcdef\n"))
        .expect(1)
        .mount(&server)
        .await;

    let sha = client(&server).head_sha(&repo("")).await.unwrap();
    assert_eq!(sha.as_deref(), Some("0123456789abcdef"));
}

#[tokio::test]
async fn test_head_sha_of_unknown_ref_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/commits/main"))
        .respond_with(ResponseTemplate::new(422).set_body_string(r#"{"message":"No commit found for SHA: main"}"#))
        .mount(&server)
        .await;

    assert_eq!(client(&server).head_sha(&repo("")).await.unwrap(), None);
}

#[tokio::test]
async fn test_token_is_sent_as_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/languages"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Rust": 1200, "Shell": 30})))
        .expect(1)
        .mount(&server)
        .await;

    let languages = client(&server).languages(&repo("s3cret")).await.unwrap();
    assert_eq!(languages.get("Rust"), Some(&1200));
    assert_eq!(languages.len(), 2);
}

#[tokio::test]
async fn test_forbidden_rate_limit_uses_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/languages"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("retry-after", "17")
                .set_body_string(r#"{"message":"API rate limit exceeded for user"}"#),
        )
        .mount(&server)
        .await;

    let err = client(&server).languages(&repo("")).await.unwrap_err();
    assert_eq!(err.code(), "RATE_LIMITED");
    assert_eq!(err.wait_seconds(), Some(17));
}

#[tokio::test]
async fn test_too_many_requests_uses_reset_header() {
    let server = MockServer::start().await;
    let reset = chrono::Utc::now().timestamp() + 120;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/languages"))
        .respond_with(ResponseTemplate::new(429).insert_header("x-ratelimit-reset", reset.to_string().as_str()))
        .mount(&server)
        .await;

    let wait = client(&server).languages(&repo("")).await.unwrap_err().wait_seconds().unwrap();
    assert!((110..=120).contains(&wait), "unexpected wait {wait}");
}

#[tokio::test]
async fn test_plain_forbidden_is_not_a_rate_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/languages"))
        .respond_with(ResponseTemplate::new(403).set_body_string(r#"{"message":"Resource not accessible by integration"}"#))
        .mount(&server)
        .await;

    let err = client(&server).languages(&repo("")).await.unwrap_err();
    assert_eq!(err.code(), "FORBIDDEN");
    assert_eq!(err.wait_seconds(), None);
}

#[tokio::test]
async fn test_status_classification() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/languages"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/contributors"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = client(&server);

    let err = client.languages(&repo("")).await.unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");

    let err = client.contributors(&repo(""), 10).await.unwrap_err();
    assert_eq!(err.code(), "UPSTREAM_ERROR");
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn test_unparseable_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/languages"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server).languages(&repo("")).await.unwrap_err();
    assert!(matches!(err, ApiError::MalformedResponse { .. }));
    assert_eq!(err.code(), "MALFORMED_RESPONSE");
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    // bind then release a port so nothing is listening on it
    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let executor = ApiExecutor::new(Duration::from_secs(5)).unwrap();
    let client = HostingClient::new(executor, &format!("http://127.0.0.1:{port}")).unwrap();

    let err = client.languages(&repo("")).await.unwrap_err();
    assert_eq!(err.code(), "TRANSPORT_ERROR");
}

#[tokio::test]
async fn test_missing_readme_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/readme"))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client(&server).readme(&repo("")).await.unwrap(), "");
}

#[tokio::test]
async fn test_file_content_found_and_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/contents/src/main.rs"))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fn main() {}\n"))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(
        client.file_content(&repo(""), "src/main.rs").await.unwrap().as_deref(),
        Some("fn main() {}\n")
    );
    assert_eq!(client.file_content(&repo(""), "src/gone.rs").await.unwrap(), None);
}

#[tokio::test]
async fn test_contributors_are_truncated_and_empty_history_is_allowed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/contributors"))
        .and(query_param("per_page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"login": "alice", "avatar_url": "https://avatars.example/alice"},
            {"login": "bob", "avatar_url": "https://avatars.example/bob"},
            {"login": "carol"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/empty/contributors"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client(&server);

    let contributors = client.contributors(&repo(""), 2).await.unwrap();
    let names: Vec<_> = contributors.iter().map(|c| c.username.as_str()).collect();
    assert_eq!(names, ["alice", "bob"]);
    assert_eq!(contributors[0].avatar_url, "https://avatars.example/alice");

    let empty = RepoRef::new("octo", "empty", "main", "").unwrap();
    assert!(client.contributors(&empty, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tree_keeps_only_blobs() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/git/trees/abc123"))
        .and(query_param("recursive", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "abc123",
            "truncated": false,
            "tree": [
                {"path": "src", "type": "tree"},
                {"path": "src/main.rs", "type": "blob", "size": 42},
                {"path": "vendor/lib", "type": "commit"},
                {"path": "Cargo.toml", "type": "blob", "size": 300}
            ]
        })))
        .mount(&server)
        .await;

    let tree = client(&server).tree(&repo(""), "abc123").await.unwrap();
    let paths: Vec<_> = tree.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, ["src/main.rs", "Cargo.toml"]);
}

#[tokio::test]
async fn test_missing_branch_on_commit_listing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/commits"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server).commit_page(&repo(""), None, 1).await.unwrap_err();
    assert!(matches!(err, ApiError::BranchNotFound { ref branch, .. } if branch == "main"));
    assert_eq!(err.code(), "BRANCH_NOT_FOUND");
}

#[tokio::test]
async fn test_pinned_repo_reads_the_commit_not_the_branch() {
    let server = MockServer::start().await;
    let pinned = repo("").at_commit("abc123");

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/readme"))
        .and(query_param("ref", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# pinned\n"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/contents/src/main.rs"))
        .and(query_param("ref", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fn main() {}\n"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/commits"))
        .and(query_param("sha", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.readme(&pinned).await.unwrap(), "# pinned\n");
    assert!(client.file_content(&pinned, "src/main.rs").await.unwrap().is_some());
    let _ = client.commit_page(&pinned, None, 1).await.unwrap();
}

#[tokio::test]
async fn test_base_url_with_path_prefix() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/repos/octo/hello/languages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let executor = ApiExecutor::new(Duration::from_secs(5)).unwrap();
    let client = HostingClient::new(executor, &format!("{}/api/v3", server.uri())).unwrap();

    assert!(client.languages(&repo("")).await.unwrap().is_empty());
}
