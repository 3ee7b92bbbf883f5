// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery of picks to the room server: stateless HTTP or a shared session.

pub mod http;
pub mod link;
pub mod machine;
pub mod session;

use std::future::Future;
use std::pin::Pin;

use crate::error::DispatchError;
use crate::request::PickBody;
use crate::status::SessionStatus;

pub use machine::SessionState;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of one send: the server's JSON payload when the transport has one.
pub type SendFuture<'a> = BoxFuture<'a, Result<Option<serde_json::Value>, DispatchError>>;

/// A way of delivering picks. Object-safe for use as `Arc<dyn Transport>`.
pub trait Transport: Send + Sync {
    /// Deliver one pick. At most one attempt; failures are always classified.
    fn send(&self, body: PickBody) -> SendFuture<'_>;

    /// Liveness as reported to observers.
    fn status(&self) -> SessionStatus;
}
