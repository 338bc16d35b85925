//! Command and event plumbing between a host and the client runtime.
//!
//! Events describing what is on screen (badge, list, dropdown, connection) are
//! folded into a [`ViewSnapshot`] as they are emitted. A host that attaches late
//! starts from the current view, and a batch of view events is never observed
//! half-applied.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::types::{BadgePatch, ClientCommand, ClientEvent, ConnectionState, ListView};

pub type EventStream = broadcast::Receiver<ClientEvent>;

#[derive(Debug, Error)]
pub enum ClientChannelError {
    #[error("client runtime has stopped")]
    RuntimeStopped,
}

/// Last rendered state of every host-visible widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub badge: Option<BadgePatch>,
    pub list: Option<ListView>,
    pub dropdown_open: bool,
    pub connection: ConnectionState,
}

impl Default for ViewSnapshot {
    fn default() -> Self {
        Self {
            badge: None,
            list: None,
            dropdown_open: false,
            connection: ConnectionState::Disconnected,
        }
    }
}

impl ViewSnapshot {
    fn record(&mut self, event: &ClientEvent) {
        match event {
            ClientEvent::BadgeChanged(patch) => self.badge = Some(patch.clone()),
            ClientEvent::ListChanged(view) => self.list = Some(view.clone()),
            ClientEvent::DropdownToggled { open } => self.dropdown_open = *open,
            ClientEvent::ConnectionChanged { state, .. } => self.connection = *state,
            _ => {}
        }
    }

    /// Events that redraw this snapshot on a blank host.
    pub fn replay(&self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        if self.connection != ConnectionState::Disconnected {
            events.push(ClientEvent::ConnectionChanged {
                state: self.connection,
                attempt: 0,
            });
        }
        if let Some(patch) = &self.badge {
            events.push(ClientEvent::BadgeChanged(patch.clone()));
        }
        if let Some(view) = &self.list {
            events.push(ClientEvent::ListChanged(view.clone()));
        }
        if self.dropdown_open {
            events.push(ClientEvent::DropdownToggled { open: true });
        }
        events
    }
}

#[derive(Debug)]
struct EventHub {
    tx: broadcast::Sender<ClientEvent>,
    view: ViewSnapshot,
}

impl EventHub {
    fn publish(&mut self, event: ClientEvent) {
        self.view.record(&event);
        // No subscribers is fine; the snapshot still advances.
        let _ = self.tx.send(event);
    }
}

/// Handles shared by the runtime, its connection manager and the host.
#[derive(Clone, Debug)]
pub struct ClientChannels {
    command_tx: mpsc::Sender<ClientCommand>,
    hub: Arc<Mutex<EventHub>>,
}

impl ClientChannels {
    pub fn new(
        command_buffer: usize,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<ClientCommand>) {
        let (command_tx, command_rx) = mpsc::channel(command_buffer.max(1));
        let (tx, _) = broadcast::channel(event_buffer.max(1));
        let hub = EventHub {
            tx,
            view: ViewSnapshot::default(),
        };

        (
            Self {
                command_tx,
                hub: Arc::new(Mutex::new(hub)),
            },
            command_rx,
        )
    }

    pub async fn send_command(&self, command: ClientCommand) -> Result<(), ClientChannelError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ClientChannelError::RuntimeStopped)
    }

    /// Resolves once the runtime dropped its command receiver.
    pub async fn closed(&self) {
        self.command_tx.closed().await;
    }

    pub fn subscribe(&self) -> EventStream {
        self.hub().tx.subscribe()
    }

    /// Current view plus a stream starting right after it.
    pub fn attach(&self) -> (ViewSnapshot, EventStream) {
        let hub = self.hub();
        (hub.view.clone(), hub.tx.subscribe())
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.hub().view.clone()
    }

    pub fn emit(&self, event: ClientEvent) {
        self.hub().publish(event);
    }

    /// Emit several events as one update: `attach` sees all of them or none.
    pub fn emit_all(&self, events: impl IntoIterator<Item = ClientEvent>) {
        let mut hub = self.hub();
        for event in events {
            hub.publish(event);
        }
    }

    fn hub(&self) -> MutexGuard<'_, EventHub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
