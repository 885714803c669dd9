// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live subscriber registry and channel fan-out.
//!
//! Delivery is fire-and-forget: a frame reaches the subscribers joined to its
//! channel at publish time and is never queued for anyone else. Each
//! subscriber owns a bounded FIFO queue; a full or closed queue drops the
//! frame for that subscriber only.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::settings::view::SettingsView;
use crate::transport::ws::ServerMessage;

/// Channel every subscriber joins on connect; carries settings updates only.
pub const PUBLIC_CHANNEL: &str = "public";

/// Event name of a settings update on [`PUBLIC_CHANNEL`].
pub const SETTING_UPDATE_EVENT: &str = "setting:update";

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

const MAX_CHANNEL_LEN: usize = 64;

/// A pre-encoded JSON text frame shared by every recipient.
pub type Frame = Arc<str>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("invalid channel name {0:?}")]
    InvalidChannel(String),
    #[error("channel {0:?} is reserved for settings updates")]
    ReservedChannel(String),
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connected: usize,
    /// Member count per channel.
    pub channels: BTreeMap<String, usize>,
}

struct Member {
    tx: mpsc::Sender<Frame>,
    channels: HashSet<String>,
}

pub struct BroadcastHub {
    members: RwLock<HashMap<Uuid, Member>>,
    queue_capacity: usize,
}

impl BroadcastHub {
    pub fn new(queue_capacity: usize) -> Arc<Self> {
        Arc::new(Self { members: RwLock::new(HashMap::new()), queue_capacity: queue_capacity.max(1) })
    }

    /// Register a subscriber joined to [`PUBLIC_CHANNEL`].
    ///
    /// The subscriber stays registered for as long as the returned
    /// [`Subscription`] lives.
    pub fn connect(self: &Arc<Self>) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let channels = HashSet::from([PUBLIC_CHANNEL.to_owned()]);
        self.members.write().insert(id, Member { tx, channels });
        tracing::debug!(subscriber = %id, "subscriber connected");
        Subscription { id, hub: Arc::clone(self), rx }
    }

    /// Add `id` to `channel`. Joining twice is a no-op.
    pub fn join(&self, id: Uuid, channel: &str) -> Result<(), HubError> {
        validate_channel(channel)?;
        if let Some(member) = self.members.write().get_mut(&id) {
            member.channels.insert(channel.to_owned());
        }
        Ok(())
    }

    /// Remove `id` from `channel`. [`PUBLIC_CHANNEL`] cannot be left.
    pub fn leave(&self, id: Uuid, channel: &str) -> Result<(), HubError> {
        validate_channel(channel)?;
        if channel == PUBLIC_CHANNEL {
            return Err(HubError::ReservedChannel(channel.to_owned()));
        }
        if let Some(member) = self.members.write().get_mut(&id) {
            member.channels.remove(channel);
        }
        Ok(())
    }

    /// Channels `id` currently belongs to, sorted.
    pub fn channels_of(&self, id: Uuid) -> Vec<String> {
        let members = self.members.read();
        let mut channels: Vec<String> =
            members.get(&id).map(|m| m.channels.iter().cloned().collect()).unwrap_or_default();
        channels.sort();
        channels
    }

    /// Push a settings view to every subscriber on [`PUBLIC_CHANNEL`].
    pub fn publish(&self, view: &SettingsView) -> PublishReport {
        let frame = match encode(&ServerMessage::SettingUpdate { setting: view.clone() }) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(err = %e, "dropping settings update");
                return PublishReport::default();
            }
        };
        let report = self.deliver(PUBLIC_CHANNEL, frame);
        tracing::debug!(
            event = SETTING_UPDATE_EVENT,
            updated_at = view.updated_at,
            delivered = report.delivered,
            dropped = report.dropped,
            "published settings update"
        );
        report
    }

    /// Send an application event on a named channel other than
    /// [`PUBLIC_CHANNEL`].
    pub fn emit(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<PublishReport, HubError> {
        validate_channel(channel)?;
        if channel == PUBLIC_CHANNEL {
            return Err(HubError::ReservedChannel(channel.to_owned()));
        }
        let frame = encode(&ServerMessage::Event {
            channel: channel.to_owned(),
            event: event.to_owned(),
            payload,
        })?;
        Ok(self.deliver(channel, frame))
    }

    pub fn connected(&self) -> usize {
        self.members.read().len()
    }

    pub fn stats(&self) -> HubStats {
        let members = self.members.read();
        let mut channels = BTreeMap::new();
        for member in members.values() {
            for ch in &member.channels {
                *channels.entry(ch.clone()).or_insert(0) += 1;
            }
        }
        HubStats { connected: members.len(), channels }
    }

    fn deliver(&self, channel: &str, frame: Frame) -> PublishReport {
        let mut report = PublishReport::default();
        let mut closed = Vec::new();
        {
            let members = self.members.read();
            for (id, member) in members.iter().filter(|(_, m)| m.channels.contains(channel)) {
                match member.tx.try_send(Arc::clone(&frame)) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        report.dropped += 1;
                        tracing::warn!(subscriber = %id, channel, "subscriber queue full, frame dropped");
                    }
                    Err(TrySendError::Closed(_)) => {
                        report.dropped += 1;
                        closed.push(*id);
                    }
                }
            }
        }
        if !closed.is_empty() {
            let mut members = self.members.write();
            for id in &closed {
                members.remove(id);
                tracing::debug!(subscriber = %id, "pruned closed subscriber");
            }
        }
        report
    }

    fn remove(&self, id: Uuid) {
        if self.members.write().remove(&id).is_some() {
            tracing::debug!(subscriber = %id, "subscriber disconnected");
        }
    }
}

/// A connected subscriber. Dropping it leaves every channel.
pub struct Subscription {
    id: Uuid,
    hub: Arc<BroadcastHub>,
    rx: mpsc::Receiver<Frame>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next frame in publish order. `None` once the hub dropped this
    /// subscriber.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    pub fn join(&self, channel: &str) -> Result<(), HubError> {
        self.hub.join(self.id, channel)
    }

    pub fn leave(&self, channel: &str) -> Result<(), HubError> {
        self.hub.leave(self.id, channel)
    }

    pub fn channels(&self) -> Vec<String> {
        self.hub.channels_of(self.id)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}

/// Channel names are 1..=64 chars of `[A-Za-z0-9_:-]`.
pub fn validate_channel(name: &str) -> Result<(), HubError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_CHANNEL_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-'));
    if valid {
        Ok(())
    } else {
        Err(HubError::InvalidChannel(name.to_owned()))
    }
}

fn encode(msg: &ServerMessage) -> Result<Frame, HubError> {
    serde_json::to_string(msg).map(Frame::from).map_err(|e| HubError::Encode(e.to_string()))
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
