use std::sync::Arc;

use notify_core::{
    ClientChannels, ClientError, ClientEvent, CloseDecision, ConnectionState,
    ConnectionStateMachine, OutboundMessage, PushEvent, ReconnectPolicy, parse_push_event,
};
use notify_platform::Scheduler;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::push::{PushFrame, PushSession, PushTransport};

#[derive(Debug)]
struct RunningPushTask {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

enum SessionEnd {
    Cancelled,
    Closed,
}

/// Owns the single push session of a client and its reconnect loop.
///
/// Other components never touch the session; they request sends through
/// [`ConnectionManager::send`].
pub struct ConnectionManager {
    transport: Arc<dyn PushTransport>,
    scheduler: Arc<dyn Scheduler>,
    channels: ClientChannels,
    push_tx: mpsc::Sender<PushEvent>,
    state_machine: Arc<Mutex<ConnectionStateMachine>>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    running: Mutex<Option<RunningPushTask>>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        scheduler: Arc<dyn Scheduler>,
        policy: ReconnectPolicy,
        channels: ClientChannels,
        push_tx: mpsc::Sender<PushEvent>,
    ) -> Self {
        Self {
            transport,
            scheduler,
            channels,
            push_tx,
            state_machine: Arc::new(Mutex::new(ConnectionStateMachine::new(policy))),
            outbound: Arc::new(Mutex::new(None)),
            running: Mutex::new(None),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.state_machine.lock().await.state()
    }

    /// Start the push session task.
    ///
    /// A no-op while a session is opening, open, or waiting to reconnect.
    /// Fails once the manager gave up or was disconnected.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut guard = self.running.lock().await;
        if let Some(running) = guard.as_ref()
            && !running.task.is_finished()
        {
            trace!("push task already running; connect ignored");
            return Ok(());
        }

        let Some(event) = self.state_machine.lock().await.begin_connect()? else {
            return Ok(());
        };
        self.channels.emit(event);

        let stop = CancellationToken::new();
        let worker = PushWorker {
            transport: Arc::clone(&self.transport),
            scheduler: Arc::clone(&self.scheduler),
            channels: self.channels.clone(),
            push_tx: self.push_tx.clone(),
            state_machine: Arc::clone(&self.state_machine),
            outbound: Arc::clone(&self.outbound),
        };
        let task = tokio::spawn(worker.run(stop.child_token()));

        *guard = Some(RunningPushTask { stop, task });
        Ok(())
    }

    /// Best-effort outbound message; dropped with a log when not connected.
    pub async fn send(&self, message: OutboundMessage) {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failed to encode outbound push message");
                return;
            }
        };

        match self.outbound.lock().await.as_ref() {
            Some(tx) => {
                if tx.send(text).is_err() {
                    debug!("push session closed before outbound message was queued");
                }
            }
            None => debug!(?message, "push channel not connected; outbound message dropped"),
        }
    }

    /// Stop the session task; no reconnect follows.
    pub async fn disconnect(&self) {
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            running.stop.cancel();
            let _ = running.task.await;
        }

        let event = self.state_machine.lock().await.on_shutdown();
        self.channels.emit(event);
        info!("push channel disconnected");
    }
}

struct PushWorker {
    transport: Arc<dyn PushTransport>,
    scheduler: Arc<dyn Scheduler>,
    channels: ClientChannels,
    push_tx: mpsc::Sender<PushEvent>,
    state_machine: Arc<Mutex<ConnectionStateMachine>>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
}

impl PushWorker {
    async fn run(self, stop: CancellationToken) {
        loop {
            let opened = tokio::select! {
                _ = stop.cancelled() => return,
                opened = self.transport.connect() => opened,
            };

            match opened {
                Ok(mut session) => {
                    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                    *self.outbound.lock().await = Some(outbound_tx);
                    let event = match self.state_machine.lock().await.on_open() {
                        Ok(event) => event,
                        Err(err) => {
                            warn!(code = %err.code, "push session opened in unexpected state");
                            *self.outbound.lock().await = None;
                            session.close().await;
                            return;
                        }
                    };
                    self.channels.emit(event);

                    let end = self.run_session(session.as_mut(), outbound_rx, &stop).await;
                    *self.outbound.lock().await = None;
                    if let SessionEnd::Cancelled = end {
                        session.close().await;
                        return;
                    }
                }
                Err(err) => warn!(code = %err.code, message = %err.message, "push connect failed"),
            }

            let decision = self.state_machine.lock().await.on_close();
            match decision {
                CloseDecision::Reconnect { attempt, delay } => {
                    info!(attempt, delay_ms = delay.as_millis() as u64, "push reconnect scheduled");
                    self.channels.emit(ClientEvent::ConnectionChanged {
                        state: ConnectionState::Disconnected,
                        attempt,
                    });
                    self.channels.emit(ClientEvent::ReconnectScheduled {
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                    });

                    tokio::select! {
                        _ = stop.cancelled() => return,
                        _ = self.scheduler.sleep(delay) => {}
                    }

                    match self.state_machine.lock().await.begin_connect() {
                        Ok(Some(event)) => self.channels.emit(event),
                        Ok(None) => {}
                        Err(err) => {
                            debug!(code = %err.code, "reconnect abandoned");
                            return;
                        }
                    }
                }
                CloseDecision::GiveUp { attempts } => {
                    error!(attempts, "push reconnect attempts exhausted; giving up");
                    self.channels.emit(ClientEvent::ConnectionChanged {
                        state: ConnectionState::Disconnected,
                        attempt: attempts,
                    });
                    self.channels.emit(ClientEvent::ConnectivityLost { attempts });
                    return;
                }
            }
        }
    }

    async fn run_session(
        &self,
        session: &mut dyn PushSession,
        mut outbound_rx: mpsc::UnboundedReceiver<String>,
        stop: &CancellationToken,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                _ = stop.cancelled() => return SessionEnd::Cancelled,
                Some(text) = outbound_rx.recv() => {
                    if let Err(err) = session.send_text(text).await {
                        warn!(code = %err.code, message = %err.message, "push send failed");
                    }
                }
                frame = session.next_frame() => match frame {
                    None => {
                        debug!("push stream ended");
                        return SessionEnd::Closed;
                    }
                    Some(Ok(PushFrame::Text(text))) => {
                        if !self.dispatch_text(&text, stop).await {
                            return SessionEnd::Cancelled;
                        }
                    }
                    Some(Ok(PushFrame::Close { code })) => {
                        info!(?code, "push session closed by server");
                        return SessionEnd::Closed;
                    }
                    Some(Ok(PushFrame::Other)) => {}
                    Some(Err(err)) => {
                        warn!(code = %err.code, message = %err.message, "push transport error");
                        return SessionEnd::Closed;
                    }
                },
            }
        }
    }

    /// Forward one text frame to the runtime. Returns `false` when cancelled
    /// while waiting for room in the push queue.
    async fn dispatch_text(&self, text: &str, stop: &CancellationToken) -> bool {
        let event = match parse_push_event(text) {
            Ok(event) => event,
            Err(err) => {
                warn!(message = %err.message, "dropping malformed push payload");
                return true;
            }
        };

        trace!(?event, "push event received");
        tokio::select! {
            _ = stop.cancelled() => {
                debug!("push event dropped on shutdown");
                false
            }
            sent = self.push_tx.send(event) => {
                if sent.is_err() {
                    debug!("runtime stopped; push event dropped");
                }
                true
            }
        }
    }
}
