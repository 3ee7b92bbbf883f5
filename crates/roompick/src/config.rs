// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::request::MediaSource;

/// How requests reach the room server.
///
/// - `OneShot`: one stateless `POST /music/pick` per request.
/// - `Session`: a shared WebSocket kept warm across requests and closed
///   after a period of inactivity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportMode {
    #[default]
    OneShot,
    Session,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneShot => f.write_str("one-shot"),
            Self::Session => f.write_str("session"),
        }
    }
}

impl std::str::FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "one-shot" | "oneshot" | "http" => Ok(Self::OneShot),
            "session" | "ws" | "websocket" => Ok(Self::Session),
            other => Err(format!("invalid transport mode: {other}")),
        }
    }
}

/// Immutable snapshot of the room settings taken once per dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    pub endpoint: String,
    pub room_id: String,
    pub room_password: String,
    pub display_name: String,
    pub contact: String,
    pub mode: TransportMode,
}

impl RoomConfig {
    /// Fail fast when the endpoint or room id is missing.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.endpoint.trim().is_empty() || self.room_id.trim().is_empty() {
            return Err(DispatchError::config_incomplete(
                "settings incomplete: configure the server endpoint and room id",
            ));
        }
        Ok(())
    }
}

/// Timing knobs for the session transport and HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTuning {
    /// How long to wait for an announce ack before assuming readiness.
    pub grace: Duration,
    /// Inactivity after which a ready session is closed.
    pub idle: Duration,
    /// Upper bound on opening the session socket.
    pub connect_timeout: Duration,
    /// First reconnect delay after a failed attempt; doubles per failure.
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Per-request timeout for HTTP calls.
    pub http_timeout: Duration,
}

pub const DEFAULT_GRACE_MS: u64 = 1_000;
pub const DEFAULT_IDLE_MS: u64 = 180_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 100;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 5_000;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(DEFAULT_GRACE_MS),
            idle: Duration::from_millis(DEFAULT_IDLE_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
            http_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
        }
    }
}

/// Request songs for a shared listening room.
#[derive(Debug, Parser)]
#[command(name = "roompick", version, about)]
pub struct Cli {
    /// Directory holding the persisted settings file.
    #[arg(long, env = "ROOMPICK_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Log format (json or text).
    #[arg(long, env = "ROOMPICK_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "ROOMPICK_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,

    // -- Duration overrides (skip from CLI; set in tests) ---------------------
    #[clap(skip)]
    pub grace_ms: Option<u64>,
    #[clap(skip)]
    pub idle_ms: Option<u64>,
    #[clap(skip)]
    pub connect_timeout_ms: Option<u64>,
    #[clap(skip)]
    pub backoff_base_ms: Option<u64>,
    #[clap(skip)]
    pub backoff_max_ms: Option<u64>,
    #[clap(skip)]
    pub http_timeout_ms: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show or change the stored room settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Request a single song.
    Request(RequestArgs),
    /// Read JSON request lines from stdin and submit them in order.
    Listen,
    /// Check that the room server is reachable and the room credentials work.
    Test,
    /// Print the outcome of the last request.
    Status,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Merge the given values into the stored settings.
    Set(SetArgs),
    /// Print the stored settings.
    Show,
}

#[derive(Debug, Default, Clone, clap::Args)]
pub struct SetArgs {
    /// Room server as `host[:port]` or `http(s)://host[:port]`.
    #[arg(long)]
    pub endpoint: Option<String>,
    #[arg(long)]
    pub room_id: Option<String>,
    #[arg(long)]
    pub room_password: Option<String>,
    /// Name shown to the room for your requests.
    #[arg(long)]
    pub display_name: Option<String>,
    /// Contact address sent with one-shot requests.
    #[arg(long)]
    pub contact: Option<String>,
    /// Delivery mode: one-shot or session.
    #[arg(long)]
    pub mode: Option<TransportMode>,
    /// Allow requests from bilibili (on/off).
    #[arg(long, value_parser = parse_toggle)]
    pub bilibili: Option<bool>,
    /// Allow requests from netease music (on/off).
    #[arg(long, value_parser = parse_toggle)]
    pub netease: Option<bool>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct RequestArgs {
    /// Catalog id of the song.
    #[arg(long)]
    pub id: Option<String>,
    /// Name or code of the song.
    #[arg(long)]
    pub name: Option<String>,
    /// Source catalog (db or wy).
    #[arg(long)]
    pub source: Option<MediaSource>,
}

fn parse_toggle(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on or off, got: {other}")),
    }
}

fn env_duration_ms(var: &str, default: u64) -> Duration {
    let ms = std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default);
    Duration::from_millis(ms)
}

macro_rules! duration_field {
    ($method:ident, $field:ident, $env:literal, $default:expr) => {
        pub fn $method(&self) -> Duration {
            match self.$field {
                Some(ms) => Duration::from_millis(ms),
                None => env_duration_ms($env, $default),
            }
        }
    };
}

impl Cli {
    /// Resolve the state directory: flag/env, then XDG, then `~/.local/state`.
    pub fn state_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(ref dir) = self.state_dir {
            return Ok(dir.clone());
        }
        if let Some(xdg) = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(xdg).join("roompick"));
        }
        match std::env::var_os("HOME") {
            Some(home) => Ok(PathBuf::from(home).join(".local/state/roompick")),
            None => anyhow::bail!("cannot locate a state directory; pass --state-dir"),
        }
    }

    // -- Tuning knobs (field override → env var → compiled default) --------

    duration_field!(grace, grace_ms, "ROOMPICK_GRACE_MS", DEFAULT_GRACE_MS);
    duration_field!(idle, idle_ms, "ROOMPICK_IDLE_MS", DEFAULT_IDLE_MS);
    duration_field!(
        connect_timeout,
        connect_timeout_ms,
        "ROOMPICK_CONNECT_TIMEOUT_MS",
        DEFAULT_CONNECT_TIMEOUT_MS
    );
    duration_field!(backoff_base, backoff_base_ms, "ROOMPICK_BACKOFF_BASE_MS", DEFAULT_BACKOFF_BASE_MS);
    duration_field!(backoff_max, backoff_max_ms, "ROOMPICK_BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS);
    duration_field!(http_timeout, http_timeout_ms, "ROOMPICK_HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS);

    pub fn tuning(&self) -> SessionTuning {
        SessionTuning {
            grace: self.grace(),
            idle: self.idle(),
            connect_timeout: self.connect_timeout(),
            backoff_base: self.backoff_base(),
            backoff_max: self.backoff_max(),
            http_timeout: self.http_timeout(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
