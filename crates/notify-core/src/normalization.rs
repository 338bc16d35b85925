use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    error::{ClientError, ErrorCategory},
    types::{ClientEvent, MarkReadResponse, PushEvent},
};

/// Status value the mark-read endpoint returns on success.
pub const STATUS_OK: &str = "ok";

/// Mark-read request result before it is applied to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkReadOutcome {
    /// Server answered `{"status": "ok"}`.
    Confirmed,
    /// Any other status, HTTP error, or transport failure.
    Rejected { error: ClientError },
}

#[derive(Deserialize)]
struct CountPayload {
    count: u64,
    #[serde(default)]
    pendencias_count: Option<u64>,
}

#[derive(Deserialize)]
struct NewNotificationPayload {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    link: Option<String>,
}

/// Parse one inbound push frame into a typed event.
pub fn parse_push_event(text: &str) -> Result<PushEvent, ClientError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| ClientError::malformed_payload(err.to_string()))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::malformed_payload("push message has no 'type' field"))?
        .to_owned();

    let event = match kind.as_str() {
        "notification_count" => {
            let payload: CountPayload = decode(value, &kind)?;
            PushEvent::NotificationCount {
                count: payload.count,
                pendencias_count: payload.pendencias_count,
            }
        }
        "new_notification" => {
            let payload: NewNotificationPayload = decode(value, &kind)?;
            PushEvent::NewNotification {
                count: payload.count,
                message: payload.message,
                link: payload.link.filter(|link| !link.trim().is_empty()),
            }
        }
        "pendencia_update" => PushEvent::PendenciaUpdate { payload: value },
        "notifications_marked_read" => PushEvent::MarkedRead {
            success: value
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        _ => PushEvent::Other { kind },
    };

    Ok(event)
}

/// Convert a mark-read response (or failure) into a store decision.
pub fn normalize_mark_read(result: Result<MarkReadResponse, ClientError>) -> MarkReadOutcome {
    match result {
        Ok(response) if response.status == STATUS_OK => MarkReadOutcome::Confirmed,
        Ok(response) => MarkReadOutcome::Rejected {
            error: ClientError::new(
                ErrorCategory::Protocol,
                "mark_read_rejected",
                format!("server answered status '{}'", response.status),
            ),
        },
        Err(error) => MarkReadOutcome::Rejected { error },
    }
}

/// Convert an error into the non-fatal indicator event.
pub fn normalize_error_event(error: ClientError) -> ClientEvent {
    ClientEvent::Error {
        code: error.code,
        message: error.message,
    }
}

fn decode<T: DeserializeOwned>(value: Value, kind: &str) -> Result<T, ClientError> {
    serde_json::from_value(value)
        .map_err(|err| ClientError::malformed_payload(format!("invalid '{kind}' payload: {err}")))
}
