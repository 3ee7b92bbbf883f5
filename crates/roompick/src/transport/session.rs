// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session transport: one actor task owns the socket and drives
//! [`SessionMachine`] from commands, socket events and timers.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SessionTuning;
use crate::error::DispatchError;
use crate::request::{PickBody, PickData};
use crate::status::{epoch_ms, SessionStatus};

use super::link::{Connector, Link, LinkCommand, LinkEvent};
use super::machine::{Action, Event, SessionMachine, SessionState};
use super::{SendFuture, Transport};

type Waiter = oneshot::Sender<Result<(), DispatchError>>;

enum Command {
    Send { data: PickData, reply: Waiter },
    Teardown { done: oneshot::Sender<()> },
}

/// Handle to the shared session. Cheap to clone; all clones talk to the
/// same actor.
#[derive(Clone)]
pub struct SessionTransport {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<SessionState>,
}

impl std::fmt::Debug for SessionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTransport").field("state", &self.state()).finish()
    }
}

impl SessionTransport {
    /// Spawn the session actor. No connection is made until the first send.
    pub fn spawn(
        url: String,
        display_name: String,
        tuning: SessionTuning,
        connector: Arc<dyn Connector>,
        shutdown: CancellationToken,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Closed);
        let actor = SessionActor {
            url,
            tuning,
            connector,
            machine: SessionMachine::new(display_name, tuning),
            link: None,
            connecting: None,
            state_tx,
        };
        tokio::spawn(actor.run(cmd_rx, shutdown));
        Self { cmd_tx, state_rx }
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Deliver one pick. Resolves once the frame is handed to the socket.
    pub async fn send_pick(&self, data: PickData) -> Result<(), DispatchError> {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Send { data, reply }).is_err() {
            return Err(DispatchError::connection_failed("session shut down"));
        }
        rx.await.unwrap_or_else(|_| Err(DispatchError::connection_failed("session shut down")))
    }

    /// Force-close from any state. Later calls are no-ops.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Teardown { done }).is_ok() {
            let _ = rx.await;
        }
    }
}

impl Transport for SessionTransport {
    fn send(&self, body: PickBody) -> SendFuture<'_> {
        Box::pin(async move {
            self.send_pick(PickData::from(&body)).await?;
            Ok(None)
        })
    }

    fn status(&self) -> SessionStatus {
        SessionStatus::Session(self.state())
    }
}

struct SessionActor {
    url: String,
    tuning: SessionTuning,
    connector: Arc<dyn Connector>,
    machine: SessionMachine<Waiter>,
    /// The only live socket, owned exclusively here.
    link: Option<Link>,
    connecting: Option<JoinHandle<anyhow::Result<Link>>>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        loop {
            let grace = self.machine.grace_deadline();
            let idle = self.machine.idle_deadline();
            let connect_due = self.machine.connect_deadline();

            let event = tokio::select! {
                _ = shutdown.cancelled() => {
                    self.teardown();
                    break;
                }
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Send { data, reply }) => Event::Send { waiter: reply, data },
                    Some(Command::Teardown { done }) => {
                        self.teardown();
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.teardown();
                        break;
                    }
                },
                result = join_connect(&mut self.connecting) => match result {
                    Ok(link) => {
                        tracing::debug!("session socket open");
                        self.link = Some(link);
                        Event::Opened
                    }
                    Err(e) => {
                        tracing::warn!(err = %e, "session connect failed");
                        Event::OpenFailed { reason: e.to_string() }
                    }
                },
                ev = recv_link(&mut self.link) => match ev {
                    Some(LinkEvent::Text(text)) => Event::Frame { text },
                    Some(LinkEvent::Closed) | None => {
                        self.link = None;
                        Event::LinkClosed
                    }
                },
                _ = sleep_until(grace) => Event::GraceElapsed,
                _ = sleep_until(idle) => Event::IdleElapsed,
                _ = sleep_until(connect_due) => Event::ConnectDue,
            };

            self.step(event);
        }
        tracing::debug!("session actor stopped");
    }

    fn step(&mut self, event: Event<Waiter>) {
        let before = self.machine.state();
        let actions = self.machine.handle(event, Instant::now());
        self.apply(actions);
        self.publish(before);
    }

    fn apply(&mut self, actions: Vec<Action<Waiter>>) {
        let mut lost = false;
        for action in actions {
            match action {
                Action::Connect => self.start_connect(),
                Action::Transmit { frame, waiter } => {
                    let text = frame.to_frame(epoch_ms());
                    let sent = match self.link {
                        Some(ref link) => link.outbound.send(LinkCommand::Text(text)).is_ok(),
                        None => false,
                    };
                    lost |= !sent;
                    if let Some(waiter) = waiter {
                        let result = if sent {
                            Ok(())
                        } else {
                            Err(DispatchError::connection_failed("session connection lost"))
                        };
                        let _ = waiter.send(result);
                    }
                }
                Action::CloseLink => {
                    if let Some(ref link) = self.link {
                        let _ = link.outbound.send(LinkCommand::Close);
                    }
                }
                Action::Resolve { waiter, result } => {
                    let _ = waiter.send(result);
                }
            }
        }

        if lost && self.link.take().is_some() {
            let actions = self.machine.handle(Event::LinkClosed, Instant::now());
            self.apply(actions);
        }
    }

    fn start_connect(&mut self) {
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let timeout = self.tuning.connect_timeout;
        tracing::debug!("opening session socket");
        self.connecting = Some(tokio::spawn(async move {
            match tokio::time::timeout(timeout, connector.connect(url)).await {
                Ok(result) => result,
                Err(_) => anyhow::bail!("timed out after {}ms", timeout.as_millis()),
            }
        }));
    }

    /// Settle to `Closed`: abort any in-flight connect, close the socket at
    /// most once, fail queued waiters. The link is dropped so no further
    /// socket events are observed.
    fn teardown(&mut self) {
        if let Some(task) = self.connecting.take() {
            task.abort();
        }
        let before = self.machine.state();
        let actions = self.machine.handle(Event::Teardown, Instant::now());
        self.apply(actions);
        self.link = None;
        self.publish(before);
    }

    fn publish(&self, before: SessionState) {
        let after = self.machine.state();
        if before != after {
            tracing::debug!(from = %before, to = %after, "session state");
            self.state_tx.send_replace(after);
        }
    }
}

async fn join_connect(task: &mut Option<JoinHandle<anyhow::Result<Link>>>) -> anyhow::Result<Link> {
    let result = match task {
        Some(handle) => handle.await,
        None => return std::future::pending().await,
    };
    *task = None;
    match result {
        Ok(inner) => inner,
        Err(e) => Err(anyhow::anyhow!("connect task failed: {e}")),
    }
}

async fn recv_link(link: &mut Option<Link>) -> Option<LinkEvent> {
    match link {
        Some(link) => link.inbound.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at.into()).await,
        None => std::future::pending().await,
    }
}
