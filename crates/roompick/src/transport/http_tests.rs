// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use reqwest::StatusCode;

use super::{rejection_message, RoomProbe};

#[yare::parameterized(
    error_field    = { 404, r#"{"error":"room not found"}"#, "room not found" },
    message_field  = { 403, r#"{"message":"queue is full"}"#, "queue is full" },
    error_first    = { 400, r#"{"error":"bad id","message":"ignored"}"#, "bad id" },
    empty_error    = { 400, r#"{"error":"","message":"fallback"}"#, "fallback" },
    non_string     = { 500, r#"{"error":{"code":1}}"#, "server error (500)" },
    not_json       = { 502, "<html>Bad Gateway</html>", "server error (502)" },
    empty_body     = { 503, "", "server error (503)" },
)]
fn rejection_messages(status: u16, body: &str, expected: &str) {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rejection_message(status, body.as_bytes()), expected);
}

#[test]
fn probe_display() {
    assert_eq!(RoomProbe::Reachable.to_string(), "room reachable");
    assert_eq!(RoomProbe::RoomNotFound.to_string(), "connected, but room not found");
    assert_eq!(RoomProbe::WrongPassword.to_string(), "connected, but room password is wrong");
}
