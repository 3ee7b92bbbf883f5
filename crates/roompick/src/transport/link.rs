// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket abstraction for the session transport.
//!
//! A [`Link`] is a pair of channels to a pump task that owns the actual
//! socket. The session actor only ever sees the channels, which lets tests
//! swap in an in-memory [`Connector`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// How long to wait for the server's close reply after we close.
const CLOSE_DRAIN: Duration = Duration::from_secs(2);

/// Commands sent to the pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    Text(String),
    Close,
}

/// Events reported by the pump. `Closed` is always the last event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Text(String),
    Closed,
}

/// An open connection, as seen by its owner.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::UnboundedSender<LinkCommand>,
    pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

pub type ConnectFuture = Pin<Box<dyn Future<Output = anyhow::Result<Link>> + Send>>;

/// Opens links to a URL. Object-safe for use as `Arc<dyn Connector>`.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: String) -> ConnectFuture;
}

/// WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: String) -> ConnectFuture {
        Box::pin(async move {
            let (ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            tokio::spawn(pump(ws, out_rx, in_tx));
            Ok(Link { outbound: out_tx, inbound: in_rx })
        })
    }
}

async fn pump(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut out_rx: mpsc::UnboundedReceiver<LinkCommand>,
    in_tx: mpsc::UnboundedSender<LinkEvent>,
) {
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            cmd = out_rx.recv() => {
                match cmd {
                    Some(LinkCommand::Text(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            tracing::debug!(err = %e, "session socket write failed");
                            break;
                        }
                    }
                    Some(LinkCommand::Close) | None => {
                        if let Err(e) = write.close().await {
                            tracing::debug!(err = %e, "session socket close failed");
                            break;
                        }
                        // Wait for the close handshake so the server sees a clean close.
                        let _ = tokio::time::timeout(CLOSE_DRAIN, async {
                            while let Some(Ok(msg)) = read.next().await {
                                if msg.is_close() {
                                    break;
                                }
                            }
                        })
                        .await;
                        break;
                    }
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = in_tx.send(LinkEvent::Text(text.to_string()));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("session socket closed by server");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(err = %e, "session socket error");
                        break;
                    }
                    _ => {} // ping/pong/binary ignored
                }
            }
        }
    }

    let _ = in_tx.send(LinkEvent::Closed);
}
