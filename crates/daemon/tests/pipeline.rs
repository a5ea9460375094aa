//! End-to-end backup runs against a local bare repository and a mock monitoring API.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use dog_watcher_core::BackupOutcome;
use dog_watcher_daemon::{BackupCoordinator, BackupSettings};
use dog_watcher_remote::{ApiClient, ApiConfig, RemoteExporter};
use dog_watcher_vcs::GitCli;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args([
            "-c",
            "user.name=seed",
            "-c",
            "user.email=seed@example.com",
            "-c",
            "init.defaultBranch=main",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

/// Bare repository with one commit on `main`.
fn seed_remote(root: &Path) -> std::path::PathBuf {
    let seed = root.join("seed");
    std::fs::create_dir_all(&seed).unwrap();
    git(&seed, &["init", "-q"]);
    git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    std::fs::write(seed.join("README.md"), "dashboard backups\n").unwrap();
    git(&seed, &["add", "README.md"]);
    git(&seed, &["commit", "-q", "-m", "initial"]);

    let remote = root.join("remote.git");
    git(
        root,
        &["clone", "-q", "--bare", "seed", remote.to_str().unwrap()],
    );
    remote
}

async fn mock_api(server: &MockServer) {
    let routes = [
        (
            "/api/v1/dash",
            json!({"dashes": [{"id": 1, "title": "CPU"}, {"id": 2, "title": null}]}),
        ),
        ("/api/v1/dash/1", json!({"dash": {"id": 1, "title": "CPU"}})),
        ("/api/v1/dash/2", json!({"dash": {"id": 2}})),
        ("/api/v1/screen", json!({"screenboards": []})),
        (
            "/api/v1/monitor",
            json!([{"id": 9, "name": "disk", "overall_state": "Alert"}]),
        ),
    ];
    for (route, body) in routes {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }
}

async fn expect_event(server: &MockServer, alert_type: &str) {
    Mock::given(method("POST"))
        .and(path("/api/v1/events"))
        .and(body_partial_json(json!({"alert_type": alert_type})))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(server)
        .await;
}

fn coordinator(
    server: &MockServer,
    repo: &Path,
    work_root: &Path,
) -> BackupCoordinator<GitCli, RemoteExporter> {
    let api = ApiConfig {
        api_key: "api".to_owned(),
        app_key: "app".to_owned(),
        base_url: format!("{}/api/v1/", server.uri()),
        timeout: Duration::from_secs(5),
    };
    let exporter = RemoteExporter::new(ApiClient::new(api).unwrap(), 4, vec!["env:test".to_owned()]);
    let git = GitCli::default().with_identity("dog-watcher", "dog-watcher@example.com");
    BackupCoordinator::new(
        git,
        exporter,
        BackupSettings {
            repo: repo.to_str().unwrap().to_owned(),
            branch: Some("main".to_owned()),
            send_event_on_noop: true,
            work_root: Some(work_root.to_path_buf()),
        },
    )
}

#[tokio::test]
async fn backs_up_then_reports_noop_on_unchanged_rerun() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let remote = seed_remote(tmp.path());
    let work_root = tmp.path().join("work");

    let server = MockServer::start().await;
    mock_api(&server).await;
    expect_event(&server, "success").await;
    expect_event(&server, "info").await;

    let coordinator = coordinator(&server, &remote, &work_root);

    assert_eq!(coordinator.run().await, BackupOutcome::Success);
    assert_eq!(std::fs::read_dir(&work_root).unwrap().count(), 0);

    let tree = git(&remote, &["ls-tree", "-r", "--name-only", "main"]);
    let files: Vec<&str> = tree.lines().collect();
    assert_eq!(
        files,
        vec![
            "README.md",
            "dash/1-cpu.json",
            "dash/2-untitled.json",
            "monitors/monitors.json"
        ]
    );
    let monitors = git(&remote, &["show", "main:monitors/monitors.json"]);
    assert!(!monitors.contains("overall_state"));
    let log = git(&remote, &["log", "-1", "--format=%s%n%an", "main"]);
    assert_eq!(log, "Automatically committed by dog-watcher\ndog-watcher\n");

    assert_eq!(coordinator.run().await, BackupOutcome::Noop);
    assert_eq!(std::fs::read_dir(&work_root).unwrap().count(), 0);
    let commits = git(&remote, &["rev-list", "--count", "main"]);
    assert_eq!(commits.trim(), "2");
}

#[tokio::test]
async fn unreachable_repository_is_a_failure() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let work_root = tmp.path().join("work");

    let server = MockServer::start().await;
    expect_event(&server, "error").await;

    let coordinator = coordinator(&server, &tmp.path().join("missing.git"), &work_root);
    let outcome = coordinator.run().await;

    assert!(outcome.is_failure(), "{outcome:?}");
    assert_eq!(std::fs::read_dir(&work_root).unwrap().count(), 0);
}
