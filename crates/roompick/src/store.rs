// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable settings store: one JSON object keyed by field name, written
//! atomically.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::config::{RoomConfig, SetArgs, TransportMode};
use crate::endpoint;
use crate::request::Site;
use crate::status::LastOutcome;

const SETTINGS_FILE: &str = "settings.json";

/// Everything persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSettings {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub room_password: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub transport_mode: TransportMode,
    #[serde(default = "enabled")]
    pub bilibili_enabled: bool,
    #[serde(default = "enabled")]
    pub netease_enabled: bool,
    /// Epoch millis of the last accepted request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_dispatch_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<LastOutcome>,
}

fn enabled() -> bool {
    true
}

impl Default for StoredSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            room_id: String::new(),
            room_password: String::new(),
            display_name: String::new(),
            contact: String::new(),
            transport_mode: TransportMode::default(),
            bilibili_enabled: true,
            netease_enabled: true,
            last_dispatch_at: None,
            last_outcome: None,
        }
    }
}

impl StoredSettings {
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            endpoint: self.endpoint.trim().to_owned(),
            room_id: self.room_id.trim().to_owned(),
            room_password: self.room_password.trim().to_owned(),
            display_name: self.display_name.trim().to_owned(),
            contact: self.contact.trim().to_owned(),
            mode: self.transport_mode,
        }
    }

    pub fn site_enabled(&self, site: Site) -> bool {
        match site {
            Site::Bilibili => self.bilibili_enabled,
            Site::Netease => self.netease_enabled,
        }
    }

    /// Merge CLI values in. Refuses results with an empty endpoint or room
    /// id, or a malformed endpoint.
    pub fn apply(&mut self, args: &SetArgs) -> anyhow::Result<()> {
        let mut next = self.clone();
        if let Some(ref v) = args.endpoint {
            next.endpoint = v.trim().to_owned();
        }
        if let Some(ref v) = args.room_id {
            next.room_id = v.trim().to_owned();
        }
        if let Some(ref v) = args.room_password {
            next.room_password = v.trim().to_owned();
        }
        if let Some(ref v) = args.display_name {
            next.display_name = v.trim().to_owned();
        }
        if let Some(ref v) = args.contact {
            next.contact = v.trim().to_owned();
        }
        if let Some(mode) = args.mode {
            next.transport_mode = mode;
        }
        if let Some(on) = args.bilibili {
            next.bilibili_enabled = on;
        }
        if let Some(on) = args.netease {
            next.netease_enabled = on;
        }

        if next.endpoint.is_empty() || next.room_id.is_empty() {
            anyhow::bail!("endpoint and room id are both required");
        }
        if !endpoint::is_valid_endpoint(&next.endpoint) {
            anyhow::bail!("invalid endpoint: {} (expected [http(s)://]host[:port])", next.endpoint);
        }

        *self = next;
        Ok(())
    }

    /// Copy with the room password masked, for display.
    pub fn redacted(&self) -> Self {
        let mut shown = self.clone();
        if !shown.room_password.is_empty() {
            shown.room_password = "********".to_owned();
        }
        shown
    }
}

/// File-backed settings store.
///
/// Read-modify-write cycles are serialized within the process.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SettingsStore {
    /// Open the store under `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self { path: dir.join(SETTINGS_FILE), lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing file yields defaults.
    pub fn load(&self) -> anyhow::Result<StoredSettings> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read()
    }

    /// Load the room settings snapshot used for one dispatch.
    pub fn room_config(&self) -> anyhow::Result<RoomConfig> {
        Ok(self.load()?.room_config())
    }

    /// Apply `f` to the stored settings and persist the result.
    pub fn update<F>(&self, f: F) -> anyhow::Result<StoredSettings>
    where
        F: FnOnce(&mut StoredSettings) -> anyhow::Result<()>,
    {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut settings = self.read()?;
        f(&mut settings)?;
        self.write(&settings)?;
        Ok(settings)
    }

    /// Persist the outcome of a dispatch; accepted requests also bump
    /// `lastDispatchAt`.
    pub fn record_outcome(&self, outcome: &LastOutcome) -> anyhow::Result<()> {
        self.update(|s| {
            if outcome.success {
                s.last_dispatch_at = Some(outcome.timestamp);
            }
            s.last_outcome = Some(outcome.clone());
            Ok(())
        })?;
        Ok(())
    }

    fn read(&self) -> anyhow::Result<StoredSettings> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredSettings::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write via a unique temp file then rename, so readers never see a
    /// partial file.
    fn write(&self, settings: &StoredSettings) -> anyhow::Result<()> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let json = serde_json::to_string_pretty(settings)?;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!("{SETTINGS_FILE}.{}.{}.tmp", std::process::id(), seq);
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
