// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command handlers. Output is one JSON document per line on stdout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::{Cli, Command, ConfigAction, TransportMode};
use crate::dispatch::Dispatcher;
use crate::error::{DispatchError, ErrorKind};
use crate::request::{MediaSource, SongRequest};
use crate::status::LastOutcome;
use crate::store::SettingsStore;
use crate::transport::SessionState;

/// Exit code for requests refused before any dispatch.
const EXIT_INVALID: i32 = 2;

/// Failure line printed for a rejected or failed request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureLine {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

impl FailureLine {
    fn new(error: impl Into<String>, error_kind: Option<ErrorKind>) -> Self {
        Self { success: false, error: error.into(), error_kind }
    }
}

impl From<DispatchError> for FailureLine {
    fn from(e: DispatchError) -> Self {
        Self::new(e.message, Some(e.kind))
    }
}

/// One request as read by `listen`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestLine {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source: Option<MediaSource>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    mode: String,
    session_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_dispatch_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_outcome: Option<LastOutcome>,
}

pub async fn execute(cli: Cli) -> anyhow::Result<i32> {
    let store = Arc::new(SettingsStore::open(&cli.state_dir()?)?);

    match cli.command {
        Command::Config { action: ConfigAction::Set(ref args) } => {
            let settings = store.update(|s| s.apply(args))?;
            tracing::info!(path = %store.path().display(), "settings saved");
            print_json(&settings.redacted())?;
            Ok(0)
        }
        Command::Config { action: ConfigAction::Show } => {
            print_json(&store.load()?.redacted())?;
            Ok(0)
        }
        Command::Request(ref args) => {
            let dispatcher = Dispatcher::new(Arc::clone(&store), cli.tuning());
            let line = RequestLine {
                id: args.id.clone(),
                name: args.name.clone(),
                source: args.source.clone(),
            };
            let mut out = tokio::io::stdout();
            let code = request_once(&dispatcher, &store, line, &mut out).await?;
            dispatcher.shutdown().await;
            Ok(code)
        }
        Command::Listen => {
            let dispatcher = Dispatcher::new(Arc::clone(&store), cli.tuning());
            let input = BufReader::new(tokio::io::stdin());
            let mut out = tokio::io::stdout();
            tokio::select! {
                result = listen(&dispatcher, &store, input, &mut out) => result?,
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
            }
            dispatcher.shutdown().await;
            Ok(0)
        }
        Command::Test => {
            let dispatcher = Dispatcher::new(Arc::clone(&store), cli.tuning());
            match dispatcher.test_connection().await {
                Ok(probe) => {
                    println!("{probe}");
                    Ok(0)
                }
                Err(e) => {
                    print_json(&FailureLine::from(e))?;
                    Ok(1)
                }
            }
        }
        Command::Status => {
            let settings = store.load()?;
            let session_state = match settings.transport_mode {
                TransportMode::OneShot => "n/a".to_owned(),
                // A fresh process holds no socket.
                TransportMode::Session => SessionState::Closed.to_string(),
            };
            print_json(&StatusReport {
                mode: settings.transport_mode.to_string(),
                session_state,
                last_dispatch_at: settings.last_dispatch_at,
                last_outcome: settings.last_outcome,
            })?;
            Ok(0)
        }
    }
}

/// Submit every request line from `input` in order, writing one result
/// line per request. Malformed lines are reported and skipped.
pub async fn listen<R, W>(
    dispatcher: &Dispatcher,
    store: &SettingsStore,
    input: R,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RequestLine>(line) {
            Ok(request) => {
                request_once(dispatcher, store, request, out).await?;
            }
            Err(e) => {
                write_json(out, &FailureLine::new(format!("invalid request line: {e}"), None))
                    .await?;
            }
        }
    }
    Ok(())
}

/// Run one request through the site toggles and the dispatcher; returns
/// the exit code for it.
pub async fn request_once<W>(
    dispatcher: &Dispatcher,
    store: &SettingsStore,
    line: RequestLine,
    out: &mut W,
) -> anyhow::Result<i32>
where
    W: AsyncWrite + Unpin,
{
    let request = SongRequest::new(line.id.as_deref(), line.name.as_deref(), line.source);
    if !request.is_identifiable() {
        write_json(out, &FailureLine::new("request needs an id or a name", None)).await?;
        return Ok(EXIT_INVALID);
    }
    if let Some(site) = request.source.site() {
        if !store.load()?.site_enabled(site) {
            let message = format!("requests from {site} are disabled");
            write_json(out, &FailureLine::new(message, None)).await?;
            return Ok(EXIT_INVALID);
        }
    }

    let SongRequest { media_id, media_name, source } = request;
    match dispatcher.request_song(Some(media_id.as_str()), Some(media_name.as_str()), Some(source)).await {
        Ok(response) => {
            write_json(out, &response).await?;
            Ok(0)
        }
        Err(e) => {
            write_json(out, &FailureLine::from(e)).await?;
            Ok(1)
        }
    }
}

async fn write_json<W, T>(out: &mut W, value: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    out.write_all(&line).await?;
    out.flush().await?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
