#![allow(dead_code)]

use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

pub const USER_PROMPT_SUBMIT: &str = env!("CARGO_BIN_EXE_codetracker-user-prompt-submit");
pub const STOP: &str = env!("CARGO_BIN_EXE_codetracker-stop");

pub const API_KEY: &str = "test-key";
pub const PROJECT_HASH: &str = "proj-hash";

/// SHA-256 of `"print(1)\n"`.
pub const PRINT_ONE_HASH: &str = "cc42155088fca5730758db72b2a5bca33112a941dfaa2d43098ec422ce4ea213";

// ===================================================================
// Fake API server
// ===================================================================

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub api_key: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

type Routes = HashMap<String, (u16, String)>;

/// A local HTTP server that answers each path with a canned response and
/// records every request it receives. Unknown paths get a 404.
pub struct FakeServer {
    server: Arc<tiny_http::Server>,
    url: String,
    routes: Arc<Mutex<Routes>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl FakeServer {
    pub fn start() -> Self {
        let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let routes: Arc<Mutex<Routes>> = Arc::default();
        let requests: Arc<Mutex<Vec<Recorded>>> = Arc::default();

        let worker = {
            let server = Arc::clone(&server);
            let routes = Arc::clone(&routes);
            let requests = Arc::clone(&requests);
            thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let header = |name: &str| {
                        request
                            .headers()
                            .iter()
                            .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
                            .map(|h| h.value.as_str().to_string())
                    };
                    let api_key = header("X-API-Key");
                    let content_type = header("Content-Type");

                    let mut raw = String::new();
                    request.as_reader().read_to_string(&mut raw).unwrap();
                    let path = request.url().to_string();
                    requests.lock().unwrap().push(Recorded {
                        method: request.method().to_string(),
                        path: path.clone(),
                        api_key,
                        content_type,
                        body: serde_json::from_str(&raw).unwrap_or(Value::Null),
                    });

                    let (status, body) = routes
                        .lock()
                        .unwrap()
                        .get(&path)
                        .cloned()
                        .unwrap_or((404, "not found".into()));
                    let response = tiny_http::Response::from_string(body)
                        .with_status_code(status)
                        .with_header(
                            tiny_http::Header::from_bytes(
                                &b"Content-Type"[..],
                                &b"application/json"[..],
                            )
                            .unwrap(),
                        );
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            server,
            url: format!("http://{addr}"),
            routes,
            requests,
            worker: Some(worker),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn route(&self, path: &str, status: u16, body: Value) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
        self
    }

    pub fn route_text(&self, path: &str, status: u16, body: &str) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    /// Body of the only request sent to `path`.
    pub fn body_for(&self, path: &str) -> Value {
        let matching: Vec<_> = self
            .requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect();
        assert_eq!(matching.len(), 1, "requests to {path}: {matching:?}");
        matching[0].body.clone()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// ===================================================================
// Project fixture
// ===================================================================

/// Config that tracks `.py` files with auto snapshots on.
pub fn config(server: &FakeServer) -> Value {
    json!({
        "version": "1.0",
        "server_url": server.url(),
        "track_extensions": [".py"],
        "auto_snapshot": { "enabled": true }
    })
}

/// A temp project with `.codetracker/` set up, plus a private temp dir the
/// hooks use for their error log.
pub struct TestProject {
    dir: tempfile::TempDir,
    tmp: tempfile::TempDir,
}

impl TestProject {
    pub fn new(config: Value) -> Self {
        let project = Self::bare();
        project.write_json(".codetracker/config.json", &config);
        project.write_json(
            ".codetracker/credentials.json",
            &json!({ "api_key": API_KEY, "current_project_hash": PROJECT_HASH }),
        );
        project
    }

    /// A project that hasn't been set up for tracking.
    pub fn bare() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            tmp: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn write_json(&self, rel: &str, value: &Value) -> PathBuf {
        self.write(rel, &serde_json::to_string_pretty(value).unwrap())
    }

    /// Write a JSONL transcript outside the tracked files and return its
    /// path as a string for the hook input.
    pub fn transcript(&self, lines: &[Value]) -> String {
        let body: String = lines.iter().map(|l| format!("{l}\n")).collect();
        let path = self.write(".claude/transcript.jsonl", &body);
        path.to_string_lossy().into_owned()
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.path().join(".codetracker/cache/last_snapshot.json")
    }

    pub fn session_path(&self) -> PathBuf {
        self.dir.path().join(".codetracker/cache/current_session.json")
    }

    pub fn write_cache(&self, value: &Value) {
        self.write_json(".codetracker/cache/last_snapshot.json", value);
    }

    pub fn write_session(&self, value: &Value) {
        self.write_json(".codetracker/cache/current_session.json", value);
    }

    pub fn read_cache(&self) -> Option<Value> {
        read_json(&self.cache_path())
    }

    pub fn read_session(&self) -> Option<Value> {
        read_json(&self.session_path())
    }

    /// Contents of the error log left by `hook`, if any.
    pub fn error_log(&self, hook: &str) -> Option<String> {
        fs::read_to_string(
            self.tmp
                .path()
                .join(format!("codetracker-{hook}-error.log")),
        )
        .ok()
    }

    /// Run a hook binary against this project, returning
    /// `(exit code, stdout, stderr)`.
    pub fn run(&self, bin: &str, stdin_json: &str) -> (i32, String, String) {
        let mut child = Command::new(bin)
            .current_dir(self.dir.path())
            .env("CLAUDE_PROJECT_DIR", self.dir.path())
            .env("TMPDIR", self.tmp.path())
            .env_remove("CODETRACKER_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn binary");

        child
            .stdin
            .as_mut()
            .unwrap()
            .write_all(stdin_json.as_bytes())
            .unwrap();

        let output = child.wait_with_output().unwrap();
        (
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        )
    }
}

fn read_json(path: &Path) -> Option<Value> {
    let contents = fs::read_to_string(path).ok()?;
    Some(serde_json::from_str(&contents).unwrap())
}

pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
