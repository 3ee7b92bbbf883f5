// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Runs the real `roompick` binary as a subprocess against a mock room
//! server, with settings isolated in a temp state directory.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve the path to the compiled `roompick` binary.
pub fn roompick_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("roompick")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Everything the mock room server has seen.
#[derive(Debug, Default)]
pub struct RoomLog {
    pub picks: Vec<Value>,
    pub enters: Vec<Value>,
    /// Query strings of session sockets, then their frames, in arrival order.
    pub session: Vec<Value>,
}

/// A mock room server on a random local port.
#[derive(Clone)]
pub struct MockRoom {
    pub addr: SocketAddr,
    log: Arc<Mutex<RoomLog>>,
}

impl MockRoom {
    /// Serve `/music/pick`, `/house/enter` and the `/server` socket.
    /// Picks named `reject` get a 404.
    pub async fn start() -> anyhow::Result<Self> {
        let log = Arc::new(Mutex::new(RoomLog::default()));
        let router = Router::new()
            .route("/music/pick", post(pick))
            .route("/house/enter", post(enter))
            .route("/server", get(server_ws))
            .with_state(Arc::clone(&log));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self { addr, log })
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Run `f` against the log.
    pub fn with_log<T>(&self, f: impl FnOnce(&RoomLog) -> T) -> T {
        f(&self.log.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Poll until the session log holds `n` entries.
    pub async fn wait_session(&self, n: usize, timeout: Duration) -> anyhow::Result<Vec<Value>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let seen = self.with_log(|log| log.session.clone());
            if seen.len() >= n {
                return Ok(seen);
            }
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("saw {} of {n} session entries within {timeout:?}", seen.len());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

type SharedLog = Arc<Mutex<RoomLog>>;

async fn pick(State(log): State<SharedLog>, body: Bytes) -> impl IntoResponse {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let rejected = body["name"] == "reject";
    log.lock().unwrap_or_else(|e| e.into_inner()).picks.push(body);
    if rejected {
        return (StatusCode::NOT_FOUND, json!({ "error": "room not found" }).to_string());
    }
    (StatusCode::OK, json!({ "ok": true }).to_string())
}

async fn enter(State(log): State<SharedLog>, body: Bytes) -> impl IntoResponse {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let status = if body["password"] == "pw" { StatusCode::OK } else { StatusCode::UNAUTHORIZED };
    log.lock().unwrap_or_else(|e| e.into_inner()).enters.push(body);
    status
}

async fn server_ws(
    State(log): State<SharedLog>,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    log.lock().unwrap_or_else(|e| e.into_inner()).session.push(json!({ "query": query }));
    ws.on_upgrade(move |socket| room_socket(socket, log))
}

async fn room_socket(mut socket: WebSocket, log: SharedLog) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else { continue };
        let announce = frame["action"] == "/setting/name";
        log.lock().unwrap_or_else(|e| e.into_inner()).session.push(frame);
        if announce {
            let ack = json!({ "action": "/setting/name", "data": { "ok": true } });
            if socket.send(Message::Text(ack.to_string().into())).await.is_err() {
                break;
            }
        }
    }
}

/// Output of one finished `roompick` invocation.
#[derive(Debug)]
pub struct RunOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Parse stdout as one JSON document.
    pub fn json(&self) -> anyhow::Result<Value> {
        Ok(serde_json::from_str(&self.stdout)?)
    }
}

/// A `roompick` installation with its own state directory.
pub struct Roompick {
    state_dir: tempfile::TempDir,
}

impl Roompick {
    pub fn new() -> anyhow::Result<Self> {
        let binary = roompick_binary();
        anyhow::ensure!(binary.exists(), "roompick binary not found at {}", binary.display());
        Ok(Self { state_dir: tempfile::tempdir()? })
    }

    pub fn state_dir(&self) -> &Path {
        self.state_dir.path()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(roompick_binary());
        cmd.arg("--state-dir")
            .arg(self.state_dir.path())
            .args(["--log-format", "text", "--log-level", "warn"])
            .args(args)
            .env("ROOMPICK_GRACE_MS", "200")
            .env("ROOMPICK_HTTP_TIMEOUT_MS", "2000")
            .kill_on_drop(true);
        cmd
    }

    /// Run one command to completion.
    pub async fn run(&self, args: &[&str]) -> anyhow::Result<RunOutput> {
        let child = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let output = tokio::time::timeout(RUN_TIMEOUT, child.wait_with_output()).await??;
        Ok(RunOutput {
            status: output.status,
            stdout: String::from_utf8(output.stdout)?,
            stderr: String::from_utf8(output.stderr)?,
        })
    }

    /// Point the installation at `room` with the given transport mode.
    pub async fn configure(&self, room: &MockRoom, mode: &str) -> anyhow::Result<RunOutput> {
        let endpoint = room.endpoint();
        let out = self
            .run(&[
                "config",
                "set",
                "--endpoint",
                &endpoint,
                "--room-id",
                "lobby",
                "--room-password",
                "pw",
                "--display-name",
                "dj",
                "--contact",
                "dj@example.com",
                "--mode",
                mode,
            ])
            .await?;
        anyhow::ensure!(out.code() == Some(0), "config set failed: {}", out.stderr);
        Ok(out)
    }

    /// Start a long-running `listen` process.
    pub fn listen(&self) -> anyhow::Result<ListenProcess> {
        let mut child = self
            .command(&["listen"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| anyhow::anyhow!("no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow::anyhow!("no stdout"))?;
        Ok(ListenProcess { child, stdin: Some(stdin), lines: BufReader::new(stdout).lines() })
    }
}

/// A running `roompick listen`, killed on drop.
pub struct ListenProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Lines<BufReader<ChildStdout>>,
}

impl ListenProcess {
    /// Write one request line and read its result line.
    pub async fn request(&mut self, line: &Value) -> anyhow::Result<Value> {
        let stdin = self.stdin.as_mut().ok_or_else(|| anyhow::anyhow!("stdin closed"))?;
        stdin.write_all(format!("{line}\n").as_bytes()).await?;
        stdin.flush().await?;
        match tokio::time::timeout(RUN_TIMEOUT, self.lines.next_line()).await?? {
            Some(reply) => Ok(serde_json::from_str(&reply)?),
            None => anyhow::bail!("listen exited before replying"),
        }
    }

    /// Close stdin and wait for a clean exit.
    pub async fn finish(mut self) -> anyhow::Result<ExitStatus> {
        drop(self.stdin.take());
        Ok(tokio::time::timeout(RUN_TIMEOUT, self.child.wait()).await??)
    }
}
