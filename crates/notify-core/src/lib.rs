//! Core contract of the SGA notification client.
//!
//! This crate defines the command/event protocol, the push-channel lifecycle
//! model, the notification store and its view projections, and the cascading
//! selector model. It performs no I/O.

/// Command/event channels and the host view snapshot.
pub mod channel;
/// Administration → department → section select model.
pub mod cascade;
/// Stable client error types and HTTP classification helpers.
pub mod error;
/// Push payload parsing and mark-read outcome normalization.
pub mod normalization;
/// Unread count and notification list reconciliation.
pub mod reconciler;
/// Pure projections from store state to host views.
pub mod render;
/// Reconnect backoff policy.
pub mod retry;
/// Push-channel lifecycle state machine.
pub mod state_machine;
/// Host-facing protocol types (commands, events, payloads).
pub mod types;

pub use cascade::{
    CascadeForm, CascadeStep, OptionsRequest, parse_options_fragment, placeholder_options,
};
pub use channel::{ClientChannelError, ClientChannels, EventStream, ViewSnapshot};
pub use error::{ClientError, ErrorCategory, classify_http_status};
pub use normalization::{
    MarkReadOutcome, normalize_error_event, normalize_mark_read, parse_push_event,
};
pub use reconciler::{ListState, NotificationStore, PendingMark};
pub use retry::ReconnectPolicy;
pub use state_machine::{CloseDecision, ConnectionStateMachine};
pub use types::{
    BadgePatch, CascadeEndpoints, CascadeLevel, ClickTarget, ClientCommand, ClientConfig,
    ClientEvent, ConnectionState, ListView, MarkReadRequest, MarkReadResponse, Notification,
    NotificationConfig, NotificationId, NotificationListResponse, OutboundMessage, PushEvent,
    RowView, SelectOption, ToastView,
};
