// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot HTTP delivery and the room connection test.

use std::fmt;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::endpoint;
use crate::error::{DispatchError, ErrorKind};
use crate::request::{EnterBody, PickBody};
use crate::status::SessionStatus;

use super::{SendFuture, Transport};

/// Stateless transport: one `POST /music/pick` per request.
#[derive(Debug, Clone)]
pub struct OneShotTransport {
    base_url: String,
    client: Client,
}

impl OneShotTransport {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self { base_url: endpoint::normalize(endpoint), client }
    }

    /// POST the pick and return the parsed JSON body of a 2xx response.
    pub async fn pick(&self, body: &PickBody) -> Result<Value, DispatchError> {
        let url = endpoint::http_url(&self.base_url, "/music/pick");
        let resp = self.client.post(url).json(body).send().await.map_err(network_error)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(network_error)?;

        if !status.is_success() {
            return Err(DispatchError::new(
                ErrorKind::ServerRejected,
                rejection_message(status, &bytes),
            ));
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            DispatchError::new(
                ErrorKind::MalformedResponse,
                format!("server returned invalid JSON ({status}): {e}"),
            )
        })
    }
}

impl Transport for OneShotTransport {
    fn send(&self, body: PickBody) -> SendFuture<'_> {
        Box::pin(async move { self.pick(&body).await.map(Some) })
    }

    fn status(&self) -> SessionStatus {
        SessionStatus::NotApplicable
    }
}

/// Result of a connection test against `/house/enter`.
///
/// All three variants mean the server itself was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomProbe {
    Reachable,
    RoomNotFound,
    WrongPassword,
}

impl fmt::Display for RoomProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable => f.write_str("room reachable"),
            Self::RoomNotFound => f.write_str("connected, but room not found"),
            Self::WrongPassword => f.write_str("connected, but room password is wrong"),
        }
    }
}

/// Try to enter the room with the given credentials.
pub async fn probe_room(
    client: &Client,
    endpoint: &str,
    room_id: &str,
    password: &str,
) -> Result<RoomProbe, DispatchError> {
    let body = EnterBody { id: room_id.to_owned(), password: password.to_owned() };
    let url = endpoint::http_url(endpoint, "/house/enter");
    let resp = client.post(url).json(&body).send().await.map_err(network_error)?;
    let status = resp.status();

    if status.is_success() {
        return Ok(RoomProbe::Reachable);
    }
    match status {
        StatusCode::NOT_FOUND => Ok(RoomProbe::RoomNotFound),
        StatusCode::UNAUTHORIZED => Ok(RoomProbe::WrongPassword),
        _ => {
            let bytes = resp.bytes().await.unwrap_or_default();
            Err(DispatchError::new(ErrorKind::ServerRejected, rejection_message(status, &bytes)))
        }
    }
}

/// Human-readable reason for a non-2xx response: the body's `error` or
/// `message` string, else `server error (<status>)`.
pub fn rejection_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"].iter().find_map(|key| {
                v.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_owned)
            })
        })
        .unwrap_or_else(|| format!("server error ({})", status.as_u16()))
}

fn network_error(e: reqwest::Error) -> DispatchError {
    if e.is_decode() {
        return DispatchError::new(ErrorKind::MalformedResponse, format!("unreadable response: {e}"));
    }
    DispatchError::new(ErrorKind::NetworkUnreachable, format!("cannot reach room server: {e}"))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
