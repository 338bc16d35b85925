use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::retry::ReconnectPolicy;

/// Opaque server-assigned notification identity.
///
/// The server may serialize ids as JSON strings or integers; both normalize to
/// the same textual form so DOM attributes and API payloads compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for NotificationId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for NotificationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(value) => Self(value.to_string()),
            RawId::Text(value) => Self(value),
        })
    }
}

/// One notification as returned by the check-notifications endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "mensagem")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Server-formatted timestamp, displayed verbatim.
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "lida", default)]
    pub read: bool,
}

/// Body of `GET <check-notifications-url>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NotificationListResponse {
    #[serde(rename = "notificacoes", default)]
    pub notifications: Vec<Notification>,
}

/// Body of `POST <mark-read-url>` when marking a single notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkReadRequest {
    pub notification_id: NotificationId,
}

/// Response of `POST <mark-read-url>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkReadResponse {
    #[serde(default)]
    pub status: String,
}

/// Push-channel lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live session (initial, between retries, or after giving up).
    Disconnected,
    /// A session open is in flight.
    Connecting,
    /// Session is open and delivering events.
    Connected,
}

/// Typed inbound push-channel message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PushEvent {
    /// Authoritative unread count (`notification_count`).
    NotificationCount {
        count: u64,
        /// Pending-confirmation count sent alongside on connect.
        pendencias_count: Option<u64>,
    },
    /// A new notification was dispatched to this viewer (`new_notification`).
    NewNotification {
        count: Option<u64>,
        message: String,
        link: Option<String>,
    },
    /// Pending-confirmation update forwarded verbatim to the page (`pendencia_update`).
    PendenciaUpdate { payload: serde_json::Value },
    /// Server acknowledgement of an outbound `mark_read` (`notifications_marked_read`).
    MarkedRead { success: bool },
    /// Any other well-formed message type.
    Other { kind: String },
}

/// Outbound push-channel message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundMessage {
    MarkRead {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notification_id: Option<NotificationId>,
    },
    GetCount,
}

/// Level of the administration → department → section cascade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CascadeLevel {
    Administration,
    Department,
    Section,
}

/// One `<option>` of a cascading select field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Badge mutation computed by the render adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum BadgePatch {
    /// Host template did not render a badge; create one showing `text`.
    Create { text: String },
    /// Show the existing badge with `text`.
    Update { text: String },
    /// Hide the badge (zero unread).
    Hide,
}

/// One dropdown row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowView {
    /// Notification id, exposed as the row's `data-id` attribute.
    pub data_id: NotificationId,
    pub message: String,
    pub timestamp_text: String,
    /// Navigation affordance target (`"#"` when the notification has no link).
    pub href: String,
    pub unread_marker: bool,
}

/// Dropdown list contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ListView {
    Empty { message: String },
    Rows(Vec<RowView>),
}

/// Transient toast surfaced for `new_notification` pushes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastView {
    pub text: String,
    /// Click target; `None` when the link is absent or a placeholder.
    pub link: Option<String>,
    pub duration_ms: u64,
}

/// Which part of a dropdown row was clicked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClickTarget {
    /// The explicit navigation affordance; the host navigates natively.
    ActionLink,
    /// Anywhere else on the row.
    RowBody,
}

/// Notification subsystem configuration injected by the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub push_url: String,
    pub mark_read_url: String,
    pub check_notifications_url: String,
    pub csrf_token: String,
    /// Push connection is opened only for authenticated viewers.
    pub is_authenticated: bool,
    /// Session cookie forwarded on HTTP requests and the WebSocket upgrade.
    pub session_cookie: Option<String>,
    /// Whether the host template already rendered a badge element.
    pub badge_mounted: bool,
    pub reconnect: ReconnectPolicy,
    pub toast_duration_ms: u64,
}

/// Endpoints serving `<option>` fragments for the cascading selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeEndpoints {
    pub departments_url: String,
    pub sections_url: String,
    pub session_cookie: Option<String>,
}

/// Full client configuration; absent parts disable the matching subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientConfig {
    pub notifications: Option<NotificationConfig>,
    pub cascade: Option<CascadeEndpoints>,
}

/// Command channel input accepted by the client runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClientCommand {
    /// Toggle the notification dropdown.
    BellClicked,
    /// Document-level click; closes the dropdown unless it landed inside it.
    DocumentClicked { inside_dropdown: bool },
    /// Click on a dropdown row.
    ItemClicked {
        id: NotificationId,
        target: ClickTarget,
    },
    /// Click on a toast.
    ToastClicked { link: Option<String> },
    /// Mark every notification read.
    MarkAllRead,
    /// Re-fetch the notification list.
    RefreshList,
    /// Value change on a cascading select; `None` means cleared.
    SelectChanged {
        level: CascadeLevel,
        value: Option<String>,
    },
    /// Stop the push connection and the runtime loop.
    Shutdown,
}

/// Event channel output emitted by the client runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClientEvent {
    /// Push-channel lifecycle transition.
    ConnectionChanged {
        state: ConnectionState,
        attempt: u32,
    },
    /// A reconnect was scheduled after a close.
    ReconnectScheduled { attempt: u32, delay_ms: u64 },
    /// Reconnect attempts exhausted; no further retries.
    ConnectivityLost { attempts: u32 },
    BadgeChanged(BadgePatch),
    ListChanged(ListView),
    Toast(ToastView),
    DropdownToggled { open: bool },
    /// Client-initiated navigation request.
    Navigate { url: String },
    /// Payload re-broadcast to the rest of the page.
    PageBroadcast { payload: serde_json::Value },
    /// Replacement option list for one cascade level.
    OptionsReplaced {
        level: CascadeLevel,
        options: Vec<SelectOption>,
    },
    /// Non-fatal error indicator.
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_ids_accept_strings_and_integers() {
        let list: NotificationListResponse = serde_json::from_str(
            r#"{"notificacoes":[{"id":7,"mensagem":"a","lida":false},{"id":"7","mensagem":"b","lida":true}]}"#,
        )
        .expect("list should decode");

        assert_eq!(list.notifications[0].id, list.notifications[1].id);
        assert_eq!(list.notifications[0].id.as_str(), "7");
    }

    #[test]
    fn missing_notification_key_decodes_as_empty_list() {
        let list: NotificationListResponse =
            serde_json::from_str("{}").expect("empty object should decode");
        assert!(list.notifications.is_empty());
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let item: Notification = serde_json::from_str(r#"{"id":1,"mensagem":"hello"}"#)
            .expect("minimal notification should decode");
        assert_eq!(item.link, None);
        assert_eq!(item.timestamp, None);
        assert!(!item.read);
    }

    #[test]
    fn outbound_mark_read_omits_missing_id() {
        let all = serde_json::to_value(OutboundMessage::MarkRead {
            notification_id: None,
        })
        .expect("encode");
        assert_eq!(all, serde_json::json!({"action": "mark_read"}));

        let one = serde_json::to_value(OutboundMessage::MarkRead {
            notification_id: Some(NotificationId::from(42)),
        })
        .expect("encode");
        assert_eq!(
            one,
            serde_json::json!({"action": "mark_read", "notification_id": "42"})
        );
    }
}
