// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last-outcome bookkeeping read by status observers.

use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ErrorKind;
use crate::store::SettingsStore;
use crate::transport::SessionState;

/// Summary of the most recent dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOutcome {
    /// Epoch millis when the dispatch finished.
    pub timestamp: u64,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl LastOutcome {
    pub fn new(
        timestamp: u64,
        success: bool,
        message: impl Into<String>,
        error_kind: Option<ErrorKind>,
    ) -> Self {
        Self { timestamp, success, message: message.into(), error_kind }
    }
}

/// Session liveness as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// One-shot mode has no session.
    NotApplicable,
    Session(SessionState),
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotApplicable => f.write_str("n/a"),
            Self::Session(state) => f.write_str(state.as_str()),
        }
    }
}

/// Holds the last outcome in memory, persists it, and pushes it to
/// subscribers.
pub struct StatusBoard {
    last: RwLock<Option<LastOutcome>>,
    tx: broadcast::Sender<LastOutcome>,
    store: Option<Arc<SettingsStore>>,
}

impl StatusBoard {
    /// Create a board seeded from the persisted last outcome, if any.
    pub fn new(store: Option<Arc<SettingsStore>>) -> Self {
        let seeded = store.as_ref().and_then(|s| s.load().ok()).and_then(|s| s.last_outcome);
        let (tx, _) = broadcast::channel(64);
        Self { last: RwLock::new(seeded), tx, store }
    }

    /// Record an outcome. Exactly one notification is sent per call.
    pub fn record(&self, outcome: LastOutcome) {
        if let Some(ref store) = self.store {
            if let Err(e) = store.record_outcome(&outcome) {
                tracing::warn!(err = %e, "failed to persist last outcome");
            }
        }
        *self.last.write().unwrap_or_else(|e| e.into_inner()) = Some(outcome.clone());
        // No subscribers is fine.
        let _ = self.tx.send(outcome);
    }

    pub fn last_outcome(&self) -> Option<LastOutcome> {
        self.last.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LastOutcome> {
        self.tx.subscribe()
    }
}

impl fmt::Debug for StatusBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusBoard")
            .field("last", &self.last_outcome())
            .field("persisted", &self.store.is_some())
            .finish()
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
