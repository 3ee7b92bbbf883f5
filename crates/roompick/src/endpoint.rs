// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Room server endpoint handling.
//!
//! Users type either a bare `host[:port]` or a full URL. Everything that talks
//! to the room server goes through [`normalize`] first so HTTP and WebSocket
//! URLs are always derived from the same canonical base.

use std::sync::LazyLock;

use regex::Regex;

static ENDPOINT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(https?://)?[a-zA-Z0-9.-]+(:[0-9]+)?$").ok());

/// Return the canonical base URL for a raw endpoint string.
///
/// Strings that already start with `http://` or `https://` are returned
/// unchanged; anything else gets `https://` prepended. Pure and total.
pub fn normalize(raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_owned()
    } else {
        format!("https://{raw}")
    }
}

/// Check that an endpoint looks like `[http(s)://]host[:port]`.
pub fn is_valid_endpoint(raw: &str) -> bool {
    ENDPOINT_RE.as_ref().is_some_and(|re| re.is_match(raw))
}

/// Build an HTTP URL for `path` under the endpoint.
pub fn http_url(endpoint: &str, path: &str) -> String {
    let base = normalize(endpoint);
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Build the session-mode WebSocket URL for a room.
///
/// `https://` maps to `wss://` and `http://` to `ws://`; room id and password
/// are query-encoded.
pub fn session_url(endpoint: &str, room_id: &str, password: &str) -> anyhow::Result<String> {
    let base = normalize(endpoint);
    let ws_base = match base.strip_prefix("https://") {
        Some(rest) => format!("wss://{rest}"),
        None => base.replacen("http://", "ws://", 1),
    };

    let mut url = reqwest::Url::parse(&format!("{}/server", ws_base.trim_end_matches('/')))?;
    url.query_pairs_mut().append_pair("houseId", room_id).append_pair("housePwd", password);
    Ok(url.into())
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
