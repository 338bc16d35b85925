use std::time::Duration;

use crate::{
    error::ClientError,
    retry::ReconnectPolicy,
    types::{ClientEvent, ConnectionState},
};

/// What the connection manager should do after a session closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Wait `delay`, then open a new session.
    Reconnect { attempt: u32, delay: Duration },
    /// Attempts exhausted; the machine is now terminal.
    GiveUp { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    attempts: u32,
    terminal: bool,
    policy: ReconnectPolicy,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

impl ConnectionStateMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            terminal: false,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Start opening a session.
    ///
    /// Returns `Ok(None)` when a session is already opening or open, so
    /// concurrent callers never produce a second session.
    pub fn begin_connect(&mut self) -> Result<Option<ClientEvent>, ClientError> {
        if self.terminal {
            return Err(ClientError::invalid_state(self.state, "connect"));
        }
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => Ok(None),
            ConnectionState::Disconnected => Ok(Some(self.transition(ConnectionState::Connecting))),
        }
    }

    pub fn on_open(&mut self) -> Result<ClientEvent, ClientError> {
        if self.state != ConnectionState::Connecting {
            return Err(ClientError::invalid_state(self.state, "on_open"));
        }
        self.attempts = 0;
        Ok(self.transition(ConnectionState::Connected))
    }

    /// Record a close (or failed open) and decide whether to retry.
    pub fn on_close(&mut self) -> CloseDecision {
        self.state = ConnectionState::Disconnected;

        let next = self.attempts.saturating_add(1);
        if self.terminal || !self.policy.allows_attempt(next) {
            self.terminal = true;
            return CloseDecision::GiveUp {
                attempts: self.attempts,
            };
        }

        self.attempts = next;
        CloseDecision::Reconnect {
            attempt: next,
            delay: self.policy.delay_for_attempt(next),
        }
    }

    /// Explicit shutdown; no reconnect will follow.
    pub fn on_shutdown(&mut self) -> ClientEvent {
        self.terminal = true;
        self.transition(ConnectionState::Disconnected)
    }

    fn transition(&mut self, next: ConnectionState) -> ClientEvent {
        self.state = next;
        ClientEvent::ConnectionChanged {
            state: next,
            attempt: self.attempts,
        }
    }
}
