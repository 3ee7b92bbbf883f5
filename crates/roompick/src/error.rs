// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a failed song request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Endpoint or room id missing; no network attempt was made.
    ConfigIncomplete,
    /// The session socket could not be opened or died before readiness.
    ConnectionFailed,
    /// The server answered with a non-2xx status or an error payload.
    ServerRejected,
    /// Low-level connect/fetch failure with no server response.
    NetworkUnreachable,
    /// The server answered 2xx but the body was not valid JSON.
    MalformedResponse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigIncomplete => "CONFIG_INCOMPLETE",
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::ServerRejected => "SERVER_REJECTED",
            Self::NetworkUnreachable => "NETWORK_UNREACHABLE",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified delivery failure with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DispatchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn config_incomplete(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigIncomplete, message)
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailed, message)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DispatchError {}
