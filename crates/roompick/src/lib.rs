// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Roompick: request songs for a shared listening room over one-shot HTTP
//! or a kept-warm WebSocket session.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod request;
pub mod status;
pub mod store;
pub mod test_support;
pub mod transport;

use std::sync::Once;

use crate::config::Cli;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Run one CLI command and return the process exit code.
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    command::execute(cli).await
}
