//! End-to-end command runs against a mock GitHub API and a temporary data directory.

use repo_pulse_lib::Host;
use repo_pulse_lib::model::RepoKey;
use repo_pulse_lib::store::{JsonStore, Store};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestHost {
    output_buf: Vec<u8>,
    error_buf: Vec<u8>,
    exit_code: Option<i32>,
}

impl TestHost {
    fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output_buf).into_owned()
    }
}

impl Host for TestHost {
    fn output(&mut self) -> impl std::io::Write {
        &mut self.output_buf
    }

    fn error(&mut self) -> impl std::io::Write {
        &mut self.error_buf
    }

    fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}

struct Workspace {
    dir: TempDir,
    server: MockServer,
}

impl Workspace {
    async fn new() -> Self {
        let server = MockServer::start().await;
        mount_github(&server).await;

        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("pulse.toml"),
            format!(
                "[github]\napi_url = \"{}\"\n\n[collection]\npoliteness_delay = \"0s\"\n\n[contributors]\nrefresh_delay = \"0s\"\n",
                server.uri()
            ),
        )
        .unwrap();
        fs::write(
            dir.path().join("catalog.json"),
            json!([
                {
                    "project_id": "octo",
                    "name": "Octo",
                    "symbol": "oct",
                    "repositories": ["https://github.com/octo/widget", "https://github.com/octo/gone"]
                },
                {
                    "project_id": "elsewhere",
                    "repositories": ["https://gitlab.com/elsewhere/thing"]
                }
            ])
            .to_string(),
        )
        .unwrap();

        Self { dir, server }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    async fn run(&self, command: &[&str]) -> (TestHost, repo_pulse_lib::Result<()>) {
        let mut args = vec!["repo-pulse".to_string()];
        args.extend(command.iter().map(|s| (*s).to_string()));
        args.extend([
            "--github-token".to_string(),
            "test-token".to_string(),
            "--data-dir".to_string(),
            self.path("data"),
            "--catalog".to_string(),
            self.path("catalog.json"),
            "--config".to_string(),
            self.path("pulse.toml"),
            "--log-level".to_string(),
            "none".to_string(),
            "--color".to_string(),
            "never".to_string(),
        ]);

        let mut host = TestHost::default();
        let result = repo_pulse_lib::run(&mut host, args).await;
        (host, result)
    }

    fn store(&self) -> JsonStore {
        JsonStore::open(Path::new(&self.path("data"))).unwrap()
    }
}

async fn mount_github(server: &MockServer) {
    let ok = |body: serde_json::Value| ResponseTemplate::new(200).set_body_json(body);

    Mock::given(method("GET"))
        .and(path("/repos/octo/widget"))
        .respond_with(ok(json!({
            "name": "widget",
            "stargazers_count": 42,
            "forks_count": 7,
            "subscribers_count": 5,
            "open_issues_count": 6,
            "size": 1024,
            "network_count": 7,
            "language": "Rust",
            "description": "Widgets"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/commits"))
        .respond_with(ok(json!([{"author": {"login": "alice"}}])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/contributors"))
        .respond_with(ok(json!([{"login": "alice", "contributions": 5}])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/pulls"))
        .respond_with(ok(json!([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widget/releases/latest"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(ok(json!({"login": "alice", "name": "Alice", "followers": 12})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ok(json!({"rate": {"limit": 5000, "remaining": 4900, "reset": 1_704_070_800}})))
        .mount(server)
        .await;
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_collect_once_records_snapshots_and_contributors() {
    let ws = Workspace::new().await;

    let (host, result) = ws.run(&["collect", "--once"]).await;
    result.unwrap();

    let out = host.output_str();
    assert!(out.contains("Collection complete"), "{out}");
    assert!(out.contains("collected          : 1"), "{out}");
    assert!(out.contains("permanent failures : 1"), "{out}");
    assert!(out.contains("4900/5000 remaining"), "{out}");
    assert!(out.contains("contributors       : 1"), "{out}");

    let store = ws.store();
    let snapshot = store.latest_snapshot(&RepoKey::new("octo", "widget")).unwrap().unwrap();
    assert_eq!(snapshot.stats.stars, 42);
    assert_eq!(snapshot.repo.symbol, "OCT");
    assert_eq!(snapshot.activity.commits_last_7d, 1);
    assert_eq!(snapshot.activity.open_pull_requests, 0);
    assert_eq!(snapshot.activity.open_issues_only, 6);
    assert!(snapshot.activity.latest_release.is_none());
    assert!(snapshot.stats.changes.is_none());

    let alice = store.contributor("alice").unwrap().unwrap();
    assert!(alice.needs_update);
    assert!(alice.repositories.contains("octo/widget"));

    // A second pass compares against the first
    let (_, result) = ws.run(&["collect", "--once"]).await;
    result.unwrap();
    let snapshot = store.latest_snapshot(&RepoKey::new("octo", "widget")).unwrap().unwrap();
    let changes = snapshot.stats.changes.unwrap();
    assert_eq!(changes.stars.change, 0);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_primary_only_skips_secondary_repositories() {
    let ws = Workspace::new().await;

    let (host, result) = ws.run(&["collect", "--once", "--primary-only"]).await;
    result.unwrap();

    let out = host.output_str();
    assert!(out.contains("collected          : 1"), "{out}");
    assert!(out.contains("permanent failures : 0"), "{out}");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_update_contributors_then_aggregate() {
    let ws = Workspace::new().await;
    ws.run(&["collect", "--once"]).await.1.unwrap();

    let (host, result) = ws.run(&["update-contributors", "--limit", "5"]).await;
    result.unwrap();
    assert!(host.output_str().contains("Refreshed 1 contributor profiles (0 errors)"));

    let alice = ws.store().contributor("alice").unwrap().unwrap();
    assert!(!alice.needs_update);
    assert_eq!(alice.followers(), 12);

    let (host, result) = ws.run(&["aggregate", "--days", "1"]).await;
    result.unwrap();
    assert!(host.output_str().contains("Computed 1 daily aggregates over the last 1 days"));
    assert_eq!(ws.store().daily_aggregates().unwrap().len(), 1);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_unusable_catalog_is_fatal() {
    let ws = Workspace::new().await;
    fs::write(ws.path("catalog.json"), r#"[{"project_id": "x", "repositories": ["not a url"]}]"#).unwrap();

    let (_, result) = ws.run(&["collect", "--once"]).await;
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("usable GitHub repository"), "{err:#}");
    drop(ws.server);
}
