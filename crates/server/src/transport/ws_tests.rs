// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::hub::BroadcastHub;
use crate::test_support::AnyhowExt;
use crate::transport::ws::{handle_client_message, ClientMessage, ServerMessage};

#[test]
fn ping_pong_serialization() -> anyhow::Result<()> {
    let json = serde_json::to_string(&ClientMessage::Ping {}).anyhow()?;
    assert!(json.contains("\"type\":\"ping\""));

    let json = serde_json::to_string(&ServerMessage::Pong {}).anyhow()?;
    assert!(json.contains("\"type\":\"pong\""));
    Ok(())
}

#[test]
fn client_messages_parse() -> anyhow::Result<()> {
    let msg: ClientMessage = serde_json::from_str(r#"{"type":"join","channel":"ops"}"#)?;
    assert_eq!(msg, ClientMessage::Join { channel: "ops".to_owned() });
    let msg: ClientMessage = serde_json::from_str(r#"{"type":"leave","channel":"ops"}"#)?;
    assert_eq!(msg, ClientMessage::Leave { channel: "ops".to_owned() });
    Ok(())
}

#[test]
fn setting_update_is_tagged() -> anyhow::Result<()> {
    let msg = ServerMessage::SettingUpdate {
        setting: crate::settings::view::SettingsView::unavailable(),
    };
    let json: serde_json::Value = serde_json::to_value(&msg)?;
    assert_eq!(json["type"], "setting_update");
    assert_eq!(json["setting"]["available"], false);
    Ok(())
}

#[test]
fn join_and_leave_round_trip() {
    let hub = BroadcastHub::new(4);
    let sub = hub.connect();

    let reply = handle_client_message(&sub, ClientMessage::Join { channel: "ops".to_owned() });
    assert_eq!(reply, ServerMessage::Joined { channel: "ops".to_owned() });
    assert_eq!(sub.channels(), vec!["ops".to_owned(), "public".to_owned()]);

    let reply = handle_client_message(&sub, ClientMessage::Leave { channel: "ops".to_owned() });
    assert_eq!(reply, ServerMessage::Left { channel: "ops".to_owned() });
    assert_eq!(sub.channels(), vec!["public".to_owned()]);
}

#[test]
fn leaving_public_is_an_error() {
    let hub = BroadcastHub::new(4);
    let sub = hub.connect();
    let reply =
        handle_client_message(&sub, ClientMessage::Leave { channel: "public".to_owned() });
    match reply {
        ServerMessage::Error { code, .. } => assert_eq!(code, "MALFORMED_INPUT"),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(sub.channels(), vec!["public".to_owned()]);
}

#[test]
fn invalid_channel_name_is_an_error() {
    let hub = BroadcastHub::new(4);
    let sub = hub.connect();
    let reply = handle_client_message(&sub, ClientMessage::Join { channel: "no spaces".to_owned() });
    assert!(matches!(reply, ServerMessage::Error { .. }), "{reply:?}");
}
