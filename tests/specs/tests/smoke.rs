// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the real `roompick` binary against a
//! mock room server.

use std::time::Duration;

use serde_json::json;

use roompick_specs::{free_port, MockRoom, Roompick};

const TIMEOUT: Duration = Duration::from_secs(10);

// -- config -------------------------------------------------------------------

#[tokio::test]
async fn config_set_persists_and_redacts() -> anyhow::Result<()> {
    let room = MockRoom::start().await?;
    let app = Roompick::new()?;

    let shown = app.configure(&room, "one-shot").await?.json()?;
    assert_eq!(shown["roomId"], "lobby");
    assert_eq!(shown["roomPassword"], "********");
    assert_eq!(shown["transportMode"], "one-shot");

    let out = app.run(&["config", "show"]).await?;
    assert_eq!(out.code(), Some(0));
    assert_eq!(out.json()?["endpoint"], room.endpoint());

    let raw = std::fs::read_to_string(app.state_dir().join("settings.json"))?;
    let raw: serde_json::Value = serde_json::from_str(&raw)?;
    assert_eq!(raw["roomPassword"], "pw");
    Ok(())
}

#[tokio::test]
async fn config_set_rejects_bad_endpoint() -> anyhow::Result<()> {
    let app = Roompick::new()?;

    let out = app
        .run(&["config", "set", "--endpoint", "http://bad host/", "--room-id", "lobby"])
        .await?;
    assert_eq!(out.code(), Some(1));
    assert!(out.stderr.contains("invalid endpoint"), "{}", out.stderr);
    assert!(!app.state_dir().join("settings.json").exists());
    Ok(())
}

// -- request ------------------------------------------------------------------

#[tokio::test]
async fn one_shot_request_round_trip() -> anyhow::Result<()> {
    let room = MockRoom::start().await?;
    let app = Roompick::new()?;
    app.configure(&room, "one-shot").await?;

    let out = app.run(&["request", "--id", "BV1xx", "--name", "Song A"]).await?;
    assert_eq!(out.code(), Some(0), "{}", out.stderr);
    let reply: serde_json::Value = serde_json::from_str(out.stdout.trim())?;
    assert_eq!(reply, json!({ "success": true, "message": "request accepted", "data": { "ok": true } }));

    let picks = room.with_log(|log| log.picks.clone());
    assert_eq!(
        picks,
        vec![json!({
            "houseId": "lobby",
            "password": "pw",
            "user": { "name": "dj", "email": "dj@example.com" },
            "id": "BV1xx",
            "name": "Song A",
            "source": "db",
        })]
    );

    let status = app.run(&["status"]).await?.json()?;
    assert_eq!(status["mode"], "one-shot");
    assert_eq!(status["sessionState"], "n/a");
    assert_eq!(status["lastOutcome"]["success"], true);
    assert!(status["lastDispatchAt"].is_u64());
    Ok(())
}

#[tokio::test]
async fn rejected_request_exits_nonzero() -> anyhow::Result<()> {
    let room = MockRoom::start().await?;
    let app = Roompick::new()?;
    app.configure(&room, "one-shot").await?;

    let out = app.run(&["request", "--name", "reject"]).await?;
    assert_eq!(out.code(), Some(1));
    let reply: serde_json::Value = serde_json::from_str(out.stdout.trim())?;
    assert_eq!(reply["error"], "room not found");
    assert_eq!(reply["errorKind"], "SERVER_REJECTED");

    let status = app.run(&["status"]).await?.json()?;
    assert_eq!(status["lastOutcome"]["errorKind"], "SERVER_REJECTED");
    assert!(status.get("lastDispatchAt").is_none());
    Ok(())
}

#[tokio::test]
async fn unconfigured_request_fails_fast() -> anyhow::Result<()> {
    let app = Roompick::new()?;

    let out = app.run(&["request", "--name", "Song"]).await?;
    assert_eq!(out.code(), Some(1));
    let reply: serde_json::Value = serde_json::from_str(out.stdout.trim())?;
    assert_eq!(reply["errorKind"], "CONFIG_INCOMPLETE");
    Ok(())
}

#[tokio::test]
async fn unidentifiable_request_is_refused() -> anyhow::Result<()> {
    let room = MockRoom::start().await?;
    let app = Roompick::new()?;
    app.configure(&room, "one-shot").await?;

    let out = app.run(&["request", "--source", "wy"]).await?;
    assert_eq!(out.code(), Some(2));
    assert!(room.with_log(|log| log.picks.is_empty()));
    Ok(())
}

#[tokio::test]
async fn unreachable_room_server_is_reported() -> anyhow::Result<()> {
    let app = Roompick::new()?;
    let endpoint = format!("http://127.0.0.1:{}", free_port()?);
    app.run(&["config", "set", "--endpoint", &endpoint, "--room-id", "lobby"]).await?;

    let out = app.run(&["request", "--name", "Song"]).await?;
    assert_eq!(out.code(), Some(1));
    let reply: serde_json::Value = serde_json::from_str(out.stdout.trim())?;
    assert_eq!(reply["errorKind"], "NETWORK_UNREACHABLE");
    Ok(())
}

// -- session mode -------------------------------------------------------------

#[tokio::test]
async fn session_request_announces_then_picks() -> anyhow::Result<()> {
    let room = MockRoom::start().await?;
    let app = Roompick::new()?;
    app.configure(&room, "session").await?;

    let out = app.run(&["request", "--name", "Song A", "--source", "wy"]).await?;
    assert_eq!(out.code(), Some(0), "{}", out.stderr);

    let seen = room.wait_session(3, TIMEOUT).await?;
    assert_eq!(seen[0]["query"], json!({ "houseId": "lobby", "housePwd": "pw" }));
    assert_eq!(seen[1]["action"], "/setting/name");
    assert_eq!(seen[1]["data"]["name"], "dj");
    assert_eq!(seen[2]["action"], "/music/pick");
    assert_eq!(seen[2]["data"], json!({ "name": "Song A", "source": "wy" }));
    assert!(room.with_log(|log| log.picks.is_empty()));
    Ok(())
}

#[tokio::test]
async fn listen_keeps_one_session_warm() -> anyhow::Result<()> {
    let room = MockRoom::start().await?;
    let app = Roompick::new()?;
    app.configure(&room, "session").await?;

    let mut listen = app.listen()?;
    for name in ["first", "second", "third"] {
        let reply = listen.request(&json!({ "name": name })).await?;
        assert_eq!(reply["success"], true, "{reply}");
    }
    let bad = listen.request(&json!({ "source": "db" })).await?;
    assert_eq!(bad["error"], "request needs an id or a name");
    let status = listen.finish().await?;
    assert!(status.success());

    let seen = room.wait_session(5, TIMEOUT).await?;
    let sockets = seen.iter().filter(|v| v.get("query").is_some()).count();
    assert_eq!(sockets, 1);
    let names: Vec<_> = seen
        .iter()
        .filter(|v| v["action"] == "/music/pick")
        .map(|v| v["data"]["name"].clone())
        .collect();
    assert_eq!(names, vec![json!("first"), json!("second"), json!("third")]);
    Ok(())
}

// -- connection test ----------------------------------------------------------

#[tokio::test]
async fn connection_test_reports_room_state() -> anyhow::Result<()> {
    let room = MockRoom::start().await?;
    let app = Roompick::new()?;
    app.configure(&room, "one-shot").await?;

    let out = app.run(&["test"]).await?;
    assert_eq!(out.code(), Some(0));
    assert_eq!(out.stdout.trim(), "room reachable");

    app.run(&["config", "set", "--room-password", "nope"]).await?;
    let out = app.run(&["test"]).await?;
    assert_eq!(out.code(), Some(0));
    assert_eq!(out.stdout.trim(), "connected, but room password is wrong");

    let enters = room.with_log(|log| log.enters.clone());
    assert_eq!(enters[0], json!({ "id": "lobby", "password": "pw" }));
    Ok(())
}
