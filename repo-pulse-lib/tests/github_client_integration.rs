//! GitHub client behaviour against a mock API server.

use chrono::{DateTime, Utc};
use core::time::Duration;
use repo_pulse_lib::collect::{ApiError, GitHubClient, MetricsApi};
use repo_pulse_lib::model::RepoKey;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> GitHubClient {
    GitHubClient::new(Some("test-token"), server.uri(), Duration::from_secs(5)).unwrap()
}

fn repo() -> RepoKey {
    RepoKey::new("octo", "widget")
}

fn since() -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200, 0).unwrap()
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_get_repository_sends_token_and_parses_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget"))
        .and(header("authorization", "token test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "widget",
            "stargazers_count": 120,
            "forks_count": 30,
            "subscribers_count": 9,
            "open_issues_count": 14,
            "size": 2048,
            "network_count": 31,
            "language": "Rust",
            "description": "A widget"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let meta = client(&server).get_repository(&repo()).await.unwrap();
    assert_eq!(meta.stargazers_count, 120);
    assert_eq!(meta.subscribers_count, 9);
    assert_eq!(meta.language.as_deref(), Some("Rust"));
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_commit_count_comes_from_last_page_link() {
    let server = MockServer::start().await;
    let last = format!(
        r#"<{0}/repos/octo/widget/commits?per_page=1&page=2>; rel="next", <{0}/repos/octo/widget/commits?per_page=1&page=12>; rel="last""#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/commits"))
        .and(query_param("per_page", "1"))
        .and(query_param("since", "2024-01-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"author": null}])).insert_header("link", last.as_str()))
        .mount(&server)
        .await;

    let count = client(&server).count_commits_since(&repo(), since()).await.unwrap();
    assert_eq!(count, 12);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_commit_count_without_link_counts_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"author": {"login": "a"}}])))
        .mount(&server)
        .await;

    assert_eq!(client(&server).count_commits_since(&repo(), since()).await.unwrap(), 1);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_empty_repository_has_no_commits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/commits"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"message": "Git Repository is empty."})))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.count_commits_since(&repo(), since()).await.unwrap(), 0);
    assert!(client.recent_commits(&repo(), since(), 50).await.unwrap().is_empty());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_recent_commits_keep_anonymous_authors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/commits"))
        .and(query_param("per_page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"author": {"login": "alice"}},
            {"author": null},
            {"author": {"login": "bob"}}
        ])))
        .mount(&server)
        .await;

    let authors = client(&server).recent_commits(&repo(), since(), 3).await.unwrap();
    let logins: Vec<_> = authors.iter().map(|a| a.login.as_deref()).collect();
    assert_eq!(logins, [Some("alice"), None, Some("bob")]);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_missing_release_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/releases/latest"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client(&server).latest_release(&repo()).await.unwrap().is_none());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_latest_release_and_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tag_name": "v2.1.0",
            "created_at": "2024-02-01T10:00:00Z",
            "published_at": "2024-02-02T10:00:00Z"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/releases"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{}]))
                .insert_header("link", r#"<https://api.github.com/x?per_page=1&page=27>; rel="last""#),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    let release = client.latest_release(&repo()).await.unwrap().unwrap();
    assert_eq!(release.tag_name, "v2.1.0");
    assert_eq!(release.date().to_rfc3339(), "2024-02-02T10:00:00+00:00");
    assert_eq!(client.count_releases(&repo()).await.unwrap(), 27);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_not_found_and_forbidden_are_distinguished() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/private"))
        .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "4000"))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(matches!(client.get_repository(&RepoKey::new("octo", "gone")).await, Err(ApiError::NotFound)));
    assert!(matches!(client.get_repository(&RepoKey::new("octo", "private")).await, Err(ApiError::Forbidden)));
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_exhausted_budget_reports_reset_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-limit", "5000")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "1704070800"),
        )
        .mount(&server)
        .await;

    match client(&server).get_repository(&repo()).await {
        Err(ApiError::RateLimited(info)) => {
            assert_eq!(info.limit, 5000);
            assert_eq!(info.remaining, 0);
            assert_eq!(info.reset_at.timestamp(), 1_704_070_800);
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_server_error_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/pulls"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    match client(&server).count_open_pull_requests(&repo()).await {
        Err(ApiError::Status { status, .. }) => assert_eq!(status, 502),
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_contributors_and_profiles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/contributors"))
        .and(query_param("per_page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"login": "alice", "contributions": 40, "avatar_url": "https://a/alice.png", "html_url": "https://github.com/alice"},
            {"login": "bob", "contributions": 12}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/contributors"))
        .and(query_param("per_page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"login": "alice", "contributions": 40}]))
                .insert_header("link", r#"<https://api.github.com/x?per_page=1&page=85>; rel="last""#),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "alice",
            "name": "Alice",
            "company": "Widgets Inc",
            "followers": 321,
            "public_repos": 17
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let top = client.top_contributors(&repo(), 2).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].login, "alice");
    assert_eq!(top[1].avatar_url, None);

    assert_eq!(client.count_contributors(&repo()).await.unwrap(), 85);

    let profile = client.user_profile("alice").await.unwrap();
    assert_eq!(profile.name.as_deref(), Some("Alice"));
    assert_eq!(profile.followers, 321);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_rate_limit_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": {},
            "rate": {"limit": 5000, "used": 1200, "remaining": 3800, "reset": 1_704_070_800}
        })))
        .mount(&server)
        .await;

    let info = client(&server).rate_limit_status().await.unwrap();
    assert_eq!(info.limit, 5000);
    assert_eq!(info.remaining, 3800);
    assert_eq!(info.reset_at.timestamp(), 1_704_070_800);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_unreachable_server_is_a_transport_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = GitHubClient::new(None, uri, Duration::from_secs(2)).unwrap();
    let err = client.get_repository(&repo()).await.unwrap_err();
    assert!(!err.reached_server());
}
