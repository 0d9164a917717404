//! Common test utilities and helpers for repo-backup tests
#![allow(dead_code)]

use repo_backup::{BackupTarget, Config};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Repository item the way the repos endpoints return it
pub fn repo_json(name: &str, clone_url: &str) -> Value {
    json!({
        "id": 1,
        "name": name,
        "full_name": format!("owner/{}", name),
        "clone_url": clone_url,
        "private": false,
        "fork": false
    })
}

pub fn org_json(login: &str) -> Value {
    json!({ "login": login, "id": 7, "url": format!("https://api.github.com/orgs/{}", login) })
}

/// Serve `pages` at `endpoint` as pages 1..=n, followed by an empty page n+1.
///
/// Every page, including the terminating empty one, must be requested exactly once.
pub async fn mount_pages(server: &MockServer, endpoint: &str, pages: Vec<Vec<Value>>) {
    let last = pages.len() + 1;
    for (index, items) in pages.into_iter().enumerate() {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .and(query_param("page", (index + 1).to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(items)))
            .expect(1)
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path(endpoint))
        .and(query_param("page", last.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(server)
        .await;
}

/// Answer every request to `endpoint` with `status`
pub async fn mount_status(server: &MockServer, endpoint: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Configuration pointing at the mock server
pub fn config_for(server: &MockServer, per_page: u8) -> Config {
    let mut config = Config::default();
    config.github.api_url = server.uri();
    config.github.per_page = per_page;
    config
}

pub fn target(username: &str, token: Option<&str>, backup_dir: &Path) -> BackupTarget {
    BackupTarget {
        username: username.to_string(),
        token: token.map(str::to_string),
        backup_dir: backup_dir.to_path_buf(),
    }
}

/// Run git, panicking with its stderr on failure
pub fn git(cwd: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(["-c", "user.name=repo-backup tests", "-c", "user.email=tests@example.com"])
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("Failed to execute git");

    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Local origin repositories that clone URLs can point at
pub struct Origins {
    pub temp_dir: TempDir,
}

impl Origins {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Create an origin repository with one commit and return its clone URL
    pub fn create(&self, name: &str) -> String {
        let dir = self.dir(name);
        std::fs::create_dir_all(&dir).expect("Failed to create origin dir");
        git(&dir, &["init", "-q"]);
        self.commit(name, "README.md", "initial\n");
        dir.to_string_lossy().into_owned()
    }

    /// Add a commit writing `file` in origin `name`
    pub fn commit(&self, name: &str, file: &str, content: &str) {
        let dir = self.dir(name);
        std::fs::write(dir.join(file), content).expect("Failed to write origin file");
        git(&dir, &["add", "."]);
        let message = format!("update {}", file);
        git(&dir, &["commit", "-q", "-m", &message]);
    }

    pub fn dir(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}

/// Names of the entries directly under `dir`, sorted
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read dir")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
