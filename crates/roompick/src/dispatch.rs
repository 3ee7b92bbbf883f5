// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatcher: the entry point UI triggers call.
//!
//! Each submit takes a fresh settings snapshot, validates it, hands the pick
//! to the transport for the configured mode and records the outcome. There
//! are no retries here; one submit is at most one delivery attempt.

use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{RoomConfig, SessionTuning, TransportMode};
use crate::endpoint;
use crate::error::{DispatchError, ErrorKind};
use crate::request::{MediaSource, PickBody, SongRequest};
use crate::status::{epoch_ms, LastOutcome, SessionStatus, StatusBoard};
use crate::store::SettingsStore;
use crate::transport::http::{probe_room, OneShotTransport, RoomProbe};
use crate::transport::link::{Connector, WsConnector};
use crate::transport::session::SessionTransport;
use crate::transport::{SessionState, Transport};

const ACCEPTED: &str = "request accepted";

/// Uniform result of one submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub ok: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl DispatchOutcome {
    fn accepted(server_payload: Option<Value>) -> Self {
        Self { ok: true, message: ACCEPTED.to_owned(), server_payload, error_kind: None }
    }

    fn failed(err: DispatchError) -> Self {
        Self { ok: false, message: err.message, server_payload: None, error_kind: Some(err.kind) }
    }

    fn summary(&self) -> LastOutcome {
        LastOutcome::new(epoch_ms(), self.ok, self.message.clone(), self.error_kind)
    }
}

/// Caller-facing response of [`Dispatcher::request_song`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Identity of a live session; a snapshot that differs needs a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionKey {
    url: String,
    display_name: String,
}

pub struct Dispatcher {
    store: Arc<SettingsStore>,
    status: StatusBoard,
    tuning: SessionTuning,
    http: Client,
    connector: Arc<dyn Connector>,
    session: Mutex<Option<(SessionKey, Arc<SessionTransport>)>>,
    /// Parent of every session actor's token; cancelled on drop.
    cancel: CancellationToken,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("store", &self.store.path())
            .field("tuning", &self.tuning)
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher using the real WebSocket connector.
    pub fn new(store: Arc<SettingsStore>, tuning: SessionTuning) -> Self {
        Self::with_connector(store, tuning, Arc::new(WsConnector))
    }

    pub fn with_connector(
        store: Arc<SettingsStore>,
        tuning: SessionTuning,
        connector: Arc<dyn Connector>,
    ) -> Self {
        crate::ensure_crypto();
        let http = Client::builder().timeout(tuning.http_timeout).build().unwrap_or_default();
        Self {
            status: StatusBoard::new(Some(Arc::clone(&store))),
            store,
            tuning,
            http,
            connector,
            session: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Submit one request. Every call records exactly one outcome.
    pub async fn submit(&self, request: SongRequest) -> DispatchOutcome {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("dispatch", %request_id, source = %request.source);

        async {
            let outcome = match self.deliver(&request).await {
                Ok(payload) => {
                    tracing::info!("request accepted");
                    DispatchOutcome::accepted(payload)
                }
                Err(e) => {
                    tracing::warn!(kind = %e.kind, err = %e.message, "request failed");
                    DispatchOutcome::failed(e)
                }
            };
            self.status.record(outcome.summary());
            outcome
        }
        .instrument(span)
        .await
    }

    /// Caller-facing form of [`Self::submit`]: failures become `Err`.
    pub async fn request_song(
        &self,
        media_id: Option<&str>,
        media_name: Option<&str>,
        source: Option<MediaSource>,
    ) -> Result<SongResponse, DispatchError> {
        let outcome = self.submit(SongRequest::new(media_id, media_name, source)).await;
        if outcome.ok {
            return Ok(SongResponse {
                success: true,
                message: outcome.message,
                data: outcome.server_payload,
            });
        }
        let kind = outcome.error_kind.unwrap_or(ErrorKind::ServerRejected);
        Err(DispatchError::new(kind, outcome.message))
    }

    /// Check the configured room via `/house/enter`.
    pub async fn test_connection(&self) -> Result<RoomProbe, DispatchError> {
        let config = self.snapshot()?;
        probe_room(&self.http, &config.endpoint, &config.room_id, &config.room_password).await
    }

    pub fn last_outcome(&self) -> Option<LastOutcome> {
        self.status.last_outcome()
    }

    /// Push notifications of every recorded outcome.
    pub fn subscribe(&self) -> broadcast::Receiver<LastOutcome> {
        self.status.subscribe()
    }

    /// Session state for the configured mode; `n/a` in one-shot mode.
    pub async fn session_state(&self) -> SessionStatus {
        let mode = self.store.load().map(|s| s.transport_mode).unwrap_or_default();
        if mode == TransportMode::OneShot {
            return SessionStatus::NotApplicable;
        }
        match self.session.lock().await.as_ref() {
            Some((_, session)) => session.status(),
            None => SessionStatus::Session(SessionState::Closed),
        }
    }

    /// External teardown: close any live session and stop its actor. The
    /// next session-mode submit opens a fresh one.
    pub async fn shutdown(&self) {
        self.retire_session().await;
    }

    fn snapshot(&self) -> Result<RoomConfig, DispatchError> {
        let config = self
            .store
            .room_config()
            .map_err(|e| DispatchError::config_incomplete(format!("settings unreadable: {e:#}")))?;
        config.validate()?;
        Ok(config)
    }

    async fn deliver(&self, request: &SongRequest) -> Result<Option<Value>, DispatchError> {
        let config = self.snapshot()?;
        let body = PickBody::new(&config, request);
        let transport = self.transport_for(&config).await?;
        transport.send(body).await
    }

    async fn transport_for(&self, config: &RoomConfig) -> Result<Arc<dyn Transport>, DispatchError> {
        let transport: Arc<dyn Transport> = match config.mode {
            TransportMode::OneShot => {
                self.retire_session().await;
                Arc::new(OneShotTransport::new(self.http.clone(), &config.endpoint))
            }
            TransportMode::Session => self.session_for(config).await?,
        };
        Ok(transport)
    }

    /// Get the live session for `config`, replacing one built for
    /// different room settings.
    async fn session_for(&self, config: &RoomConfig) -> Result<Arc<SessionTransport>, DispatchError> {
        let url = endpoint::session_url(&config.endpoint, &config.room_id, &config.room_password)
            .map_err(|e| DispatchError::connection_failed(format!("invalid session URL: {e}")))?;
        let key = SessionKey { url, display_name: config.display_name.clone() };

        let mut slot = self.session.lock().await;
        if let Some((ref live, ref session)) = *slot {
            if *live == key {
                return Ok(Arc::clone(session));
            }
        }
        if let Some((_, old)) = slot.take() {
            tracing::info!("room settings changed, replacing session");
            old.shutdown().await;
        }

        let session = Arc::new(SessionTransport::spawn(
            key.url.clone(),
            key.display_name.clone(),
            self.tuning,
            Arc::clone(&self.connector),
            self.cancel.child_token(),
        ));
        *slot = Some((key, Arc::clone(&session)));
        Ok(session)
    }

    async fn retire_session(&self) {
        let old = self.session.lock().await.take();
        if let Some((_, session)) = old {
            session.shutdown().await;
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
