// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio_tungstenite::tungstenite::Message;

use super::*;

#[yare::parameterized(
    plain          = { "http://127.0.0.1:3000", "ws://127.0.0.1:3000/ws", "http://127.0.0.1:3000/api/v1/settings" },
    trailing_slash = { "http://host:80/", "ws://host:80/ws", "http://host:80/api/v1/settings" },
    tls            = { "https://player.example", "wss://player.example/ws", "https://player.example/api/v1/settings" },
)]
fn urls_derive_from_base(server: &str, ws: &str, settings: &str) {
    let connector = match WsConnector::new(server) {
        Ok(c) => c,
        Err(e) => panic!("{server}: {e}"),
    };
    assert_eq!(connector.ws_url(), ws);
    assert_eq!(connector.settings_url(), settings);
}

#[test]
fn non_http_base_rejected() {
    assert!(WsConnector::new("ftp://host").is_err());
    assert!(WsConnector::new("localhost:3000").is_err());
}

fn text(value: serde_json::Value) -> Result<Message, String> {
    Ok(Message::Text(value.to_string().into()))
}

#[test]
fn setting_update_decodes_to_view() -> anyhow::Result<()> {
    let frame = text(serde_json::json!({
        "type": "setting_update",
        "setting": {
            "has_selection": true,
            "selection_type": "playlist",
            "selection_uri": "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M",
            "autoplay": false,
            "loop": true,
            "updated_at": 42,
            "available": true
        }
    }));
    let Some(Ok(view)) = decode_push(frame) else {
        anyhow::bail!("expected a view");
    };
    assert_eq!(view.updated_at, 42);
    assert!(view.loop_playback);
    assert!(!view.autoplay);
    Ok(())
}

#[yare::parameterized(
    welcome = { serde_json::json!({"type": "welcome", "subscriber": "s", "channels": ["public"]}) },
    pong    = { serde_json::json!({"type": "pong"}) },
    error   = { serde_json::json!({"type": "error", "code": "MALFORMED_INPUT", "message": "bad"}) },
    unknown = { serde_json::json!({"type": "mystery"}) },
)]
fn other_frames_are_skipped(value: serde_json::Value) {
    assert!(decode_push(text(value)).is_none());
}

#[test]
fn close_and_errors_end_the_session() {
    assert!(matches!(decode_push(Ok(Message::Close(None))), Some(Err(_))));
    assert_eq!(
        decode_push(Err("reset by peer".to_owned())),
        Some(Err(TransportError("reset by peer".to_owned())))
    );
}

#[test]
fn binary_frames_are_ignored() {
    assert!(decode_push(Ok(Message::Binary(vec![1, 2, 3].into()))).is_none());
}
