// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-mode state machine.
//!
//! Pure transition logic: every input is a discrete [`Event`] stamped with
//! the caller's `now`, every effect comes back as an [`Action`]. The actor in
//! [`super::session`] owns the socket and timers and executes the actions;
//! nothing here touches I/O or reads a clock.
//!
//! `W` is the waiter handle resolved when a queued pick is transmitted or
//! fails (a oneshot sender in production, a plain id in tests).

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::SessionTuning;
use crate::error::DispatchError;
use crate::request::PickData;

/// Action name of the announce frame and its acknowledgment.
pub const ANNOUNCE_ACTION: &str = "/setting/name";
/// Action name of a pick frame.
pub const PICK_ACTION: &str = "/music/pick";

/// Lifecycle state of the shared session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Closed,
    Connecting,
    Announcing,
    Ready,
    Closing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Connecting => "CONNECTING",
            Self::Announcing => "ANNOUNCING",
            Self::Ready => "READY",
            Self::Closing => "CLOSING",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A frame to put on the wire. Timestamps are stamped at transmit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Announce { name: String },
    Pick(PickData),
}

impl Outbound {
    pub fn to_frame(&self, epoch_ms: u64) -> String {
        let frame = match self {
            Self::Announce { name } => json!({
                "action": ANNOUNCE_ACTION,
                "data": { "name": name, "sendTime": epoch_ms },
                "timestamp": epoch_ms,
            }),
            Self::Pick(data) => json!({
                "action": PICK_ACTION,
                "data": { "name": data.name, "source": data.source.as_str() },
                "timestamp": epoch_ms,
            }),
        };
        frame.to_string()
    }
}

/// Inputs to the machine.
#[derive(Debug)]
pub enum Event<W> {
    /// A caller wants a pick delivered.
    Send { waiter: W, data: PickData },
    /// The backoff delay before a reconnect attempt has passed.
    ConnectDue,
    /// The socket opened.
    Opened,
    /// The socket could not be opened.
    OpenFailed { reason: String },
    /// An inbound text frame.
    Frame { text: String },
    /// The readiness grace period has passed.
    GraceElapsed,
    /// The idle timer fired.
    IdleElapsed,
    /// The socket closed, expectedly or not.
    LinkClosed,
    /// External teardown: settle to `Closed` from any state.
    Teardown,
}

/// Effects the owner of the socket must carry out, in order.
#[derive(Debug)]
pub enum Action<W> {
    /// Start one connection attempt.
    Connect,
    /// Hand a frame to the socket; resolve `waiter` with the hand-off result.
    Transmit { frame: Outbound, waiter: Option<W> },
    /// Ask the socket to close.
    CloseLink,
    /// Settle a waiter without transmitting.
    Resolve { waiter: W, result: Result<(), DispatchError> },
}

/// The session state machine.
pub struct SessionMachine<W> {
    state: SessionState,
    display_name: String,
    tuning: SessionTuning,
    queue: VecDeque<(W, PickData)>,
    last_activity: Option<Instant>,
    grace_deadline: Option<Instant>,
    idle_deadline: Option<Instant>,
    connect_deadline: Option<Instant>,
    failures: u32,
}

impl<W> fmt::Debug for SessionMachine<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMachine")
            .field("state", &self.state)
            .field("queued", &self.queue.len())
            .field("failures", &self.failures)
            .finish()
    }
}

impl<W> SessionMachine<W> {
    pub fn new(display_name: impl Into<String>, tuning: SessionTuning) -> Self {
        Self {
            state: SessionState::Closed,
            display_name: display_name.into(),
            tuning,
            queue: VecDeque::new(),
            last_activity: None,
            grace_deadline: None,
            idle_deadline: None,
            connect_deadline: None,
            failures: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of picks waiting for readiness.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Consecutive failed connection attempts.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    pub fn grace_deadline(&self) -> Option<Instant> {
        self.grace_deadline
    }

    pub fn idle_deadline(&self) -> Option<Instant> {
        self.idle_deadline
    }

    /// When a backoff-deferred connection attempt is due.
    pub fn connect_deadline(&self) -> Option<Instant> {
        self.connect_deadline
    }

    pub fn handle(&mut self, event: Event<W>, now: Instant) -> Vec<Action<W>> {
        match event {
            Event::Send { waiter, data } => self.on_send(waiter, data, now),
            Event::ConnectDue => self.on_connect_due(now),
            Event::Opened => self.on_opened(now),
            Event::OpenFailed { reason } => self.on_open_failed(&reason),
            Event::Frame { text } => self.on_frame(&text, now),
            Event::GraceElapsed => self.on_grace_elapsed(now),
            Event::IdleElapsed => self.on_idle_elapsed(now),
            Event::LinkClosed => self.on_link_closed(now),
            Event::Teardown => self.on_teardown(),
        }
    }

    fn on_send(&mut self, waiter: W, data: PickData, now: Instant) -> Vec<Action<W>> {
        match self.state {
            SessionState::Ready => {
                self.touch(now);
                vec![Action::Transmit { frame: Outbound::Pick(data), waiter: Some(waiter) }]
            }
            SessionState::Closed => {
                self.queue.push_back((waiter, data));
                self.begin_connect(now)
            }
            SessionState::Connecting | SessionState::Announcing | SessionState::Closing => {
                self.queue.push_back((waiter, data));
                vec![]
            }
        }
    }

    fn on_connect_due(&mut self, now: Instant) -> Vec<Action<W>> {
        match self.connect_deadline {
            Some(due) if self.state == SessionState::Connecting && now >= due => {
                self.connect_deadline = None;
                vec![Action::Connect]
            }
            _ => vec![],
        }
    }

    fn on_opened(&mut self, now: Instant) -> Vec<Action<W>> {
        if self.state != SessionState::Connecting || self.connect_deadline.is_some() {
            return vec![];
        }
        self.state = SessionState::Announcing;
        self.failures = 0;
        self.grace_deadline = Some(now + self.tuning.grace);
        vec![Action::Transmit {
            frame: Outbound::Announce { name: self.display_name.clone() },
            waiter: None,
        }]
    }

    fn on_open_failed(&mut self, reason: &str) -> Vec<Action<W>> {
        if self.state != SessionState::Connecting {
            return vec![];
        }
        self.failures = self.failures.saturating_add(1);
        self.settle_closed();
        self.fail_queue(&format!("cannot connect to room server: {reason}"))
    }

    fn on_frame(&mut self, text: &str, now: Instant) -> Vec<Action<W>> {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(err = %e, "ignoring malformed session frame");
                return vec![];
            }
        };
        let action = value.get("action").and_then(|a| a.as_str());
        if self.state == SessionState::Announcing && action == Some(ANNOUNCE_ACTION) {
            return self.become_ready(now);
        }
        vec![]
    }

    fn on_grace_elapsed(&mut self, now: Instant) -> Vec<Action<W>> {
        match self.grace_deadline {
            Some(due) if self.state == SessionState::Announcing && now >= due => {
                self.become_ready(now)
            }
            _ => vec![],
        }
    }

    fn on_idle_elapsed(&mut self, now: Instant) -> Vec<Action<W>> {
        if self.state != SessionState::Ready {
            return vec![];
        }
        let last = self.last_activity.unwrap_or(now);
        if now.saturating_duration_since(last) >= self.tuning.idle {
            tracing::info!(idle_ms = self.tuning.idle.as_millis() as u64, "session idle, closing");
            self.state = SessionState::Closing;
            self.idle_deadline = None;
            vec![Action::CloseLink]
        } else {
            self.idle_deadline = Some(last + self.tuning.idle);
            vec![]
        }
    }

    fn on_link_closed(&mut self, now: Instant) -> Vec<Action<W>> {
        match self.state {
            SessionState::Announcing => {
                self.failures = self.failures.saturating_add(1);
                self.settle_closed();
                self.fail_queue("connection closed before the session was ready")
            }
            SessionState::Ready => {
                tracing::info!("session connection closed");
                self.settle_closed();
                vec![]
            }
            SessionState::Closing => {
                self.settle_closed();
                if self.queue.is_empty() {
                    vec![]
                } else {
                    self.begin_connect(now)
                }
            }
            SessionState::Closed | SessionState::Connecting => vec![],
        }
    }

    fn on_teardown(&mut self) -> Vec<Action<W>> {
        let mut actions = match self.state {
            SessionState::Announcing | SessionState::Ready => vec![Action::CloseLink],
            SessionState::Closed | SessionState::Connecting | SessionState::Closing => vec![],
        };
        self.settle_closed();
        self.failures = 0;
        actions.extend(self.fail_queue("session shut down"));
        actions
    }

    fn begin_connect(&mut self, now: Instant) -> Vec<Action<W>> {
        self.state = SessionState::Connecting;
        if self.failures == 0 {
            self.connect_deadline = None;
            return vec![Action::Connect];
        }
        let delay = self.backoff();
        tracing::debug!(
            backoff_ms = delay.as_millis() as u64,
            failures = self.failures,
            "deferring reconnect"
        );
        self.connect_deadline = Some(now + delay);
        vec![]
    }

    /// Capped exponential backoff for the current failure count.
    pub fn backoff(&self) -> Duration {
        if self.failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(self.failures - 1).unwrap_or(u32::MAX);
        self.tuning.backoff_base.saturating_mul(factor).min(self.tuning.backoff_max)
    }

    fn become_ready(&mut self, now: Instant) -> Vec<Action<W>> {
        self.state = SessionState::Ready;
        self.grace_deadline = None;
        self.touch(now);
        self.queue
            .drain(..)
            .map(|(waiter, data)| Action::Transmit {
                frame: Outbound::Pick(data),
                waiter: Some(waiter),
            })
            .collect()
    }

    fn touch(&mut self, now: Instant) {
        self.last_activity = Some(now);
        self.idle_deadline = Some(now + self.tuning.idle);
    }

    fn settle_closed(&mut self) {
        self.state = SessionState::Closed;
        self.grace_deadline = None;
        self.idle_deadline = None;
        self.connect_deadline = None;
    }

    fn fail_queue(&mut self, message: &str) -> Vec<Action<W>> {
        self.queue
            .drain(..)
            .map(|(waiter, _)| Action::Resolve {
                waiter,
                result: Err(DispatchError::connection_failed(message)),
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
