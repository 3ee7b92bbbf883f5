// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Song requests and the wire bodies built from them.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::RoomConfig;

/// Catalog a media identifier comes from.
///
/// `db` requests identify by video name/code, `wy` requests by catalog id.
/// Unknown tags are passed through verbatim.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MediaSource {
    #[default]
    Db,
    Wy,
    Other(String),
}

impl MediaSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Db => "db",
            Self::Wy => "wy",
            Self::Other(tag) => tag,
        }
    }

    /// Site whose toggle gates requests from this source.
    pub fn site(&self) -> Option<Site> {
        match self {
            Self::Db => Some(Site::Bilibili),
            Self::Wy => Some(Site::Netease),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaSource {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_owned()))
    }
}

impl From<String> for MediaSource {
    fn from(tag: String) -> Self {
        match tag.to_lowercase().as_str() {
            "" | "db" => Self::Db,
            "wy" => Self::Wy,
            _ => Self::Other(tag),
        }
    }
}

impl From<MediaSource> for String {
    fn from(source: MediaSource) -> Self {
        source.as_str().to_owned()
    }
}

/// Site a request originates from, each with its own on/off toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Bilibili,
    Netease,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bilibili => f.write_str("bilibili"),
            Self::Netease => f.write_str("netease"),
        }
    }
}

/// A single user request for a song, built fresh per action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRequest {
    pub media_id: String,
    pub media_name: String,
    pub source: MediaSource,
}

impl SongRequest {
    pub fn new(media_id: Option<&str>, media_name: Option<&str>, source: Option<MediaSource>) -> Self {
        Self {
            media_id: media_id.unwrap_or_default().to_owned(),
            media_name: media_name.unwrap_or_default().to_owned(),
            source: source.unwrap_or_default(),
        }
    }

    /// True when the request carries an id or a name to look the song up by.
    pub fn is_identifiable(&self) -> bool {
        !self.media_id.trim().is_empty() || !self.media_name.trim().is_empty()
    }
}

/// Requesting user as sent to the room server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickUser {
    pub name: String,
    pub email: String,
}

/// `POST /music/pick` body.
///
/// Every field is always present; missing settings become empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickBody {
    pub house_id: String,
    pub password: String,
    pub user: PickUser,
    pub id: String,
    pub name: String,
    pub source: MediaSource,
}

impl PickBody {
    pub fn new(config: &RoomConfig, request: &SongRequest) -> Self {
        Self {
            house_id: config.room_id.clone(),
            password: config.room_password.clone(),
            user: PickUser { name: config.display_name.clone(), email: config.contact.clone() },
            id: request.media_id.clone(),
            name: request.media_name.clone(),
            source: request.source.clone(),
        }
    }
}

/// Data of a session-mode `/music/pick` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickData {
    pub name: String,
    pub source: MediaSource,
}

impl From<&PickBody> for PickData {
    fn from(body: &PickBody) -> Self {
        let name = if body.name.is_empty() { body.id.clone() } else { body.name.clone() };
        Self { name, source: body.source.clone() }
    }
}

/// `POST /house/enter` body used by the connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterBody {
    pub id: String,
    pub password: String,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
