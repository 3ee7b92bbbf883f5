// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::{http_url, is_valid_endpoint, normalize, session_url};

#[yare::parameterized(
    bare_host      = { "host.example", "https://host.example" },
    host_with_port = { "host.example:1234", "https://host.example:1234" },
    insecure       = { "http://host", "http://host" },
    secure         = { "https://host:8443", "https://host:8443" },
    empty          = { "", "https://" },
)]
fn normalize_cases(raw: &str, expected: &str) {
    assert_eq!(normalize(raw), expected);
}

proptest! {
    #[test]
    fn normalize_is_idempotent(raw in ".{0,40}") {
        let once = normalize(&raw);
        prop_assert_eq!(normalize(&once), once);
    }
}

#[yare::parameterized(
    domain           = { "music.example.com", true },
    domain_port      = { "music.example.com:8080", true },
    https_url        = { "https://music.example.com", true },
    http_url_port    = { "http://10.0.0.2:3000", true },
    trailing_path    = { "https://music.example.com/api", false },
    other_scheme     = { "ftp://music.example.com", false },
    spaces           = { "music example", false },
    empty            = { "", false },
)]
fn endpoint_validation(raw: &str, valid: bool) {
    assert_eq!(is_valid_endpoint(raw), valid);
}

#[test]
fn http_url_joins_without_double_slash() {
    assert_eq!(http_url("room.example/", "/music/pick"), "https://room.example/music/pick");
    assert_eq!(http_url("http://127.0.0.1:9", "/house/enter"), "http://127.0.0.1:9/house/enter");
}

#[test]
fn session_url_uses_secure_websocket_by_default() -> anyhow::Result<()> {
    let url = session_url("room.example:8080", "r1", "pw")?;
    assert_eq!(url, "wss://room.example:8080/server?houseId=r1&housePwd=pw");
    Ok(())
}

#[test]
fn session_url_keeps_insecure_scheme() -> anyhow::Result<()> {
    let url = session_url("http://127.0.0.1:3000", "lobby", "")?;
    assert_eq!(url, "ws://127.0.0.1:3000/server?houseId=lobby&housePwd=");
    Ok(())
}

#[test]
fn session_url_encodes_query_values() -> anyhow::Result<()> {
    let url = session_url("room.example", "a&b", "p w")?;
    assert_eq!(url, "wss://room.example/server?houseId=a%26b&housePwd=p+w");
    Ok(())
}
