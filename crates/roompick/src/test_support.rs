// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for unit and integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::transport::link::{ConnectFuture, Connector, Link, LinkCommand, LinkEvent};
use crate::transport::machine::ANNOUNCE_ACTION;

/// What the next [`FakeConnector::connect`] call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPlan {
    Accept,
    Refuse,
    /// Never resolves; exercises the connect timeout.
    Hang,
}

/// In-memory connector. Each accepted connect hands the far end of the
/// link to the test as a [`FakePeer`].
#[derive(Debug)]
pub struct FakeConnector {
    peers: mpsc::UnboundedSender<FakePeer>,
    plans: Mutex<VecDeque<ConnectPlan>>,
    connects: AtomicU32,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakePeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector =
            Arc::new(Self { peers, plans: Mutex::new(VecDeque::new()), connects: AtomicU32::new(0) });
        (connector, rx)
    }

    /// Queue plans for upcoming connects; unplanned connects are accepted.
    pub fn plan(&self, plans: &[ConnectPlan]) {
        self.plans.lock().unwrap_or_else(|e| e.into_inner()).extend(plans.iter().copied());
    }

    /// Number of connection attempts made so far.
    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    fn connect(&self, url: String) -> ConnectFuture {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let plan = self
            .plans
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(ConnectPlan::Accept);

        match plan {
            ConnectPlan::Refuse => Box::pin(async { anyhow::bail!("connection refused") }),
            ConnectPlan::Hang => Box::pin(std::future::pending()),
            ConnectPlan::Accept => {
                let (out_tx, out_rx) = mpsc::unbounded_channel();
                let (in_tx, in_rx) = mpsc::unbounded_channel();
                let _ = self.peers.send(FakePeer { url, commands: out_rx, events: in_tx });
                Box::pin(async move { Ok(Link { outbound: out_tx, inbound: in_rx }) })
            }
        }
    }
}

/// The server side of a fake link.
#[derive(Debug)]
pub struct FakePeer {
    pub url: String,
    pub commands: mpsc::UnboundedReceiver<LinkCommand>,
    pub events: mpsc::UnboundedSender<LinkEvent>,
}

impl FakePeer {
    /// Next command from the client, or an error after `timeout`.
    pub async fn next_command(&mut self, timeout: Duration) -> anyhow::Result<LinkCommand> {
        match tokio::time::timeout(timeout, self.commands.recv()).await {
            Ok(Some(cmd)) => Ok(cmd),
            Ok(None) => anyhow::bail!("link dropped"),
            Err(_) => anyhow::bail!("no command within {timeout:?}"),
        }
    }

    /// Next text frame from the client, parsed as JSON.
    pub async fn next_frame(&mut self, timeout: Duration) -> anyhow::Result<serde_json::Value> {
        match self.next_command(timeout).await? {
            LinkCommand::Text(text) => Ok(serde_json::from_str(&text)?),
            LinkCommand::Close => anyhow::bail!("expected a frame, got close"),
        }
    }

    /// Acknowledge the announce frame.
    pub fn ack_announce(&self) {
        let ack = serde_json::json!({ "action": ANNOUNCE_ACTION, "data": { "ok": true } });
        let _ = self.events.send(LinkEvent::Text(ack.to_string()));
    }

    /// Report the socket as closed.
    pub fn close(&self) {
        let _ = self.events.send(LinkEvent::Closed);
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
