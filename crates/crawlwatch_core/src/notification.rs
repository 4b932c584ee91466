use serde::Deserialize;

use crate::TargetId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    /// Handshake acknowledgement sent when the channel opens.
    Connection,
    /// Something about a target's crawl changed; re-check it.
    CrawlUpdate,
    /// Keep-alive.
    Ping,
    /// Anything else the server may add later.
    Unknown(String),
}

impl NotificationKind {
    fn from_wire(kind: &str) -> Self {
        match kind {
            "connection" => NotificationKind::Connection,
            "crawl_update" => NotificationKind::CrawlUpdate,
            "ping" => NotificationKind::Ping,
            other => NotificationKind::Unknown(other.to_string()),
        }
    }
}

/// A push message. Only ever a hint to re-check; never applied as a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub target_id: Option<TargetId>,
    pub user_id: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed push payload: {reason}")]
pub struct MalformedMessage {
    pub reason: String,
}

#[derive(Deserialize)]
struct WireNotification {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    target_id: Option<String>,
    /// Older backends name the target `url_id`; some send both.
    #[serde(default)]
    url_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

impl Notification {
    pub fn new(kind: NotificationKind) -> Self {
        Self {
            kind,
            target_id: None,
            user_id: None,
            timestamp: None,
        }
    }

    pub fn crawl_update(target_id: impl Into<TargetId>) -> Self {
        Self {
            target_id: Some(target_id.into()),
            ..Self::new(NotificationKind::CrawlUpdate)
        }
    }

    /// Parses one `data:` payload. An empty `target_id` counts as absent.
    pub fn parse(payload: &str) -> Result<Self, MalformedMessage> {
        let wire: WireNotification =
            serde_json::from_str(payload).map_err(|err| MalformedMessage {
                reason: err.to_string(),
            })?;
        let target_id = present(wire.target_id)
            .or_else(|| present(wire.url_id))
            .map(TargetId::from);
        Ok(Self {
            kind: NotificationKind::from_wire(&wire.kind),
            target_id,
            user_id: wire.user_id,
            timestamp: wire.timestamp,
        })
    }
}

fn present(id: Option<String>) -> Option<String> {
    id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())
}
