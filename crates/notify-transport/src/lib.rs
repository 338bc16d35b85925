//! I/O half of the SGA notification client.
//!
//! [`spawn_runtime`] starts a task that owns the notification store, the push
//! connection manager and the cascading selector form. Hosts talk to it only
//! through [`ClientRuntimeHandle`]: commands in, rendered views out.

pub mod api;
pub mod connection;
pub mod push;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use notify_core::{
    BadgePatch, CascadeForm, CascadeLevel, ClickTarget, ClientChannelError, ClientChannels,
    ClientCommand, ClientConfig, ClientError, ClientEvent, EventStream, ListState, MarkReadOutcome,
    MarkReadResponse, Notification, NotificationConfig, NotificationId, NotificationStore,
    OptionsRequest, OutboundMessage, PendingMark, PushEvent, ViewSnapshot, normalize_error_event,
    normalize_mark_read, parse_options_fragment, placeholder_options,
    render::{is_navigable, render_badge, render_list, render_toast},
};
use notify_platform::{Scheduler, TokioScheduler};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

pub use api::{HttpNotificationApi, HttpOptionsApi, NotificationApi, OptionsApi};
pub use connection::ConnectionManager;
pub use push::{PushFrame, PushSession, PushTransport, WsPushTransport};

const COMMAND_BUFFER: usize = 128;
const EVENT_BUFFER: usize = 512;
const PUSH_BUFFER: usize = 256;

/// Injectable I/O seams of the runtime.
pub struct RuntimeDeps {
    pub notification_api: Option<Arc<dyn NotificationApi>>,
    pub options_api: Option<Arc<dyn OptionsApi>>,
    pub push_transport: Option<Arc<dyn PushTransport>>,
    pub scheduler: Arc<dyn Scheduler>,
}

impl RuntimeDeps {
    /// Production HTTP and WebSocket implementations for `config`.
    ///
    /// The push transport is only built for authenticated viewers.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let notification_api = match config.notifications.as_ref() {
            Some(notifications) => {
                Some(Arc::new(HttpNotificationApi::new(notifications)?) as Arc<dyn NotificationApi>)
            }
            None => None,
        };
        let push_transport = match config.notifications.as_ref() {
            Some(notifications) if notifications.is_authenticated => {
                let transport = WsPushTransport::new(
                    &notifications.push_url,
                    notifications.session_cookie.clone(),
                )?;
                Some(Arc::new(transport) as Arc<dyn PushTransport>)
            }
            _ => None,
        };
        let options_api = match config.cascade.as_ref() {
            Some(endpoints) => {
                Some(Arc::new(HttpOptionsApi::new(endpoints)?) as Arc<dyn OptionsApi>)
            }
            None => None,
        };

        Ok(Self {
            notification_api,
            options_api,
            push_transport,
            scheduler: Arc::new(TokioScheduler),
        })
    }
}

#[derive(Clone, Debug)]
pub struct ClientRuntimeHandle {
    channels: ClientChannels,
}

impl ClientRuntimeHandle {
    pub async fn send(&self, command: ClientCommand) -> Result<(), ClientChannelError> {
        self.channels.send_command(command).await
    }

    pub fn subscribe(&self) -> EventStream {
        self.channels.subscribe()
    }

    /// Current views plus the events that follow them.
    pub fn attach(&self) -> (ViewSnapshot, EventStream) {
        self.channels.attach()
    }

    /// Resolves once the runtime loop has exited.
    pub async fn stopped(&self) {
        self.channels.closed().await;
    }
}

pub fn spawn_runtime(config: ClientConfig) -> Result<ClientRuntimeHandle, ClientError> {
    let deps = RuntimeDeps::from_config(&config)?;
    Ok(spawn_runtime_with(config, deps))
}

pub fn spawn_runtime_with(config: ClientConfig, deps: RuntimeDeps) -> ClientRuntimeHandle {
    let (channels, command_rx) = ClientChannels::new(COMMAND_BUFFER, EVENT_BUFFER);
    let (push_tx, push_rx) = mpsc::channel(PUSH_BUFFER);
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();

    let notifications = match (config.notifications, deps.notification_api) {
        (Some(notification_config), Some(api)) => {
            let connection = match deps.push_transport {
                Some(transport) if notification_config.is_authenticated => {
                    Some(ConnectionManager::new(
                        transport,
                        Arc::clone(&deps.scheduler),
                        notification_config.reconnect,
                        channels.clone(),
                        push_tx,
                    ))
                }
                _ => None,
            };
            Some(NotificationState {
                badge_mounted: notification_config.badge_mounted,
                config: notification_config,
                api,
                connection,
                store: NotificationStore::new(),
                dropdown_open: false,
                channels: channels.clone(),
                completion_tx: completion_tx.clone(),
            })
        }
        _ => None,
    };
    let cascade = match (config.cascade, deps.options_api) {
        (Some(_), Some(api)) => Some(CascadeState {
            api,
            form: CascadeForm::default(),
            channels: channels.clone(),
            completion_tx: completion_tx.clone(),
        }),
        _ => None,
    };

    let runtime = ClientRuntime {
        command_rx,
        push_rx,
        completion_rx,
        notifications,
        cascade,
    };
    tokio::spawn(async move {
        runtime.run().await;
    });

    ClientRuntimeHandle { channels }
}

/// Result of an HTTP call spawned off the runtime loop.
enum Completion {
    MarkRead {
        mark: PendingMark,
        id: Option<NotificationId>,
        result: Result<MarkReadResponse, ClientError>,
    },
    ListFetched(Result<Vec<Notification>, ClientError>),
    OptionsLoaded {
        request: OptionsRequest,
        result: Result<String, ClientError>,
    },
}

struct ClientRuntime {
    command_rx: mpsc::Receiver<ClientCommand>,
    push_rx: mpsc::Receiver<PushEvent>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    notifications: Option<NotificationState>,
    cascade: Option<CascadeState>,
}

impl ClientRuntime {
    async fn run(mut self) {
        if let Some(notifications) = self.notifications.as_mut() {
            notifications.start().await;
        }

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(ClientCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.push_rx.recv() => {
                    if let Some(notifications) = self.notifications.as_mut() {
                        notifications.handle_push(event);
                    }
                }
                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion).await;
                }
            }
        }

        self.push_rx.close();
        if let Some(notifications) = self.notifications.as_ref() {
            notifications.stop().await;
        }
        info!("client runtime stopped");
    }

    fn handle_command(&mut self, command: ClientCommand) {
        trace!(?command, "client command");
        match command {
            ClientCommand::SelectChanged { level, value } => match self.cascade.as_mut() {
                Some(cascade) => cascade.on_change(level, value),
                None => debug!("cascading selector disabled; select change ignored"),
            },
            command => match self.notifications.as_mut() {
                Some(notifications) => notifications.handle_command(command),
                None => debug!(?command, "notification subsystem disabled; command ignored"),
            },
        }
    }

    async fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::MarkRead { mark, id, result } => {
                if let Some(notifications) = self.notifications.as_mut() {
                    notifications.mark_read_completed(mark, id, result).await;
                }
            }
            Completion::ListFetched(result) => {
                if let Some(notifications) = self.notifications.as_mut() {
                    notifications.list_fetched(result);
                }
            }
            Completion::OptionsLoaded { request, result } => {
                if let Some(cascade) = self.cascade.as_mut() {
                    cascade.options_loaded(request, result);
                }
            }
        }
    }
}

struct NotificationState {
    config: NotificationConfig,
    api: Arc<dyn NotificationApi>,
    connection: Option<ConnectionManager>,
    store: NotificationStore,
    badge_mounted: bool,
    dropdown_open: bool,
    channels: ClientChannels,
    completion_tx: mpsc::UnboundedSender<Completion>,
}

impl NotificationState {
    fn handle_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::BellClicked => self.toggle_dropdown(),
            ClientCommand::DocumentClicked { inside_dropdown } => {
                if self.dropdown_open && !inside_dropdown {
                    self.set_dropdown(false);
                }
            }
            ClientCommand::ItemClicked { id, target } => self.item_clicked(id, target),
            ClientCommand::ToastClicked { link } => self.navigate_to(link.as_deref()),
            ClientCommand::MarkAllRead => self.mark_all_read(),
            ClientCommand::RefreshList => self.request_refresh(),
            ClientCommand::SelectChanged { .. } | ClientCommand::Shutdown => {}
        }
    }

    async fn start(&mut self) {
        if !self.config.is_authenticated {
            debug!("viewer not authenticated; push channel and list fetch skipped");
            return;
        }

        self.request_refresh();
        if let Some(connection) = self.connection.as_ref()
            && let Err(err) = connection.connect().await
        {
            warn!(code = %err.code, message = %err.message, "push connect rejected");
        }
    }

    async fn stop(&self) {
        if let Some(connection) = self.connection.as_ref() {
            connection.disconnect().await;
        }
    }

    fn toggle_dropdown(&mut self) {
        let open = !self.dropdown_open;
        self.set_dropdown(open);
        if open && self.store.list_state() != ListState::Known {
            self.request_refresh();
        }
    }

    fn set_dropdown(&mut self, open: bool) {
        self.dropdown_open = open;
        self.channels.emit(ClientEvent::DropdownToggled { open });
    }

    fn item_clicked(&mut self, id: NotificationId, target: ClickTarget) {
        let link = self.store.get(&id).and_then(|item| item.link.clone());
        if self.store.get(&id).is_none() {
            debug!(notification_id = %id, "click on unknown notification");
        }

        if let Some(mark) = self.store.mark_read_locally(&id) {
            self.publish_views();
            self.spawn_mark_read(mark, Some(id));
        }

        if target == ClickTarget::RowBody {
            self.navigate_to(link.as_deref());
        }
    }

    fn mark_all_read(&mut self) {
        match self.store.mark_all_read_locally() {
            Some(mark) => {
                self.publish_views();
                self.spawn_mark_read(mark, None);
            }
            None => debug!("nothing unread; mark-all skipped"),
        }
    }

    fn navigate_to(&self, link: Option<&str>) {
        if let Some(url) = link.filter(|link| is_navigable(Some(*link))) {
            self.channels.emit(ClientEvent::Navigate {
                url: url.to_owned(),
            });
        }
    }

    fn request_refresh(&self) {
        let api = Arc::clone(&self.api);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_notifications().await;
            let _ = completion_tx.send(Completion::ListFetched(result));
        });
    }

    fn spawn_mark_read(&self, mark: PendingMark, id: Option<NotificationId>) {
        let api = Arc::clone(&self.api);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = api.mark_read(id.as_ref()).await;
            let _ = completion_tx.send(Completion::MarkRead { mark, id, result });
        });
    }

    async fn mark_read_completed(
        &mut self,
        mark: PendingMark,
        id: Option<NotificationId>,
        result: Result<MarkReadResponse, ClientError>,
    ) {
        match normalize_mark_read(result) {
            MarkReadOutcome::Confirmed => {
                self.store.confirm(mark);
                if let Some(connection) = self.connection.as_ref() {
                    connection
                        .send(OutboundMessage::MarkRead {
                            notification_id: id,
                        })
                        .await;
                }
            }
            MarkReadOutcome::Rejected { error } => {
                warn!(
                    code = %error.code,
                    message = %error.message,
                    notification_id = ?id.as_ref().map(NotificationId::as_str),
                    "mark-read failed; rolling back"
                );
                if self.store.rollback(mark) {
                    self.publish_views();
                }
                self.channels.emit(normalize_error_event(error));
            }
        }
    }

    fn list_fetched(&mut self, result: Result<Vec<Notification>, ClientError>) {
        match result {
            Ok(items) => {
                self.store.apply_server_list(items);
                self.publish_views();
            }
            Err(error) => {
                if error.is_transient() {
                    info!(
                        code = %error.code,
                        message = %error.message,
                        "notification list fetch failed; next push or refresh retries"
                    );
                } else {
                    warn!(
                        code = %error.code,
                        message = %error.message,
                        "notification list fetch failed"
                    );
                }
                self.channels.emit(normalize_error_event(error));
            }
        }
    }

    fn handle_push(&mut self, event: PushEvent) {
        match event {
            PushEvent::NotificationCount {
                count,
                pendencias_count,
            } => {
                trace!(count, ?pendencias_count, "count push");
                let stale = self.store.apply_server_count(count);
                self.publish_badge();
                if stale {
                    debug!(count, "pushed count disagrees with list; refreshing");
                    self.request_refresh();
                }
            }
            PushEvent::NewNotification {
                count,
                message,
                link,
            } => {
                if let Some(count) = count {
                    self.store.apply_server_count(count);
                    self.publish_badge();
                }
                self.channels.emit(ClientEvent::Toast(render_toast(
                    &message,
                    link.as_deref(),
                    self.config.toast_duration_ms,
                )));
                self.request_refresh();
                self.channels.emit(ClientEvent::PageBroadcast {
                    payload: json!({
                        "type": "new_notification",
                        "count": count,
                        "message": message,
                        "link": link,
                    }),
                });
            }
            PushEvent::PendenciaUpdate { payload } => {
                self.channels.emit(ClientEvent::PageBroadcast { payload });
            }
            PushEvent::MarkedRead { success } => {
                debug!(success, "server acknowledged push mark_read");
            }
            PushEvent::Other { kind } => debug!(%kind, "ignoring push message"),
        }
    }

    fn badge_event(&mut self) -> ClientEvent {
        let patch = render_badge(self.store.unread_count(), self.badge_mounted);
        if matches!(patch, BadgePatch::Create { .. }) {
            self.badge_mounted = true;
        }
        ClientEvent::BadgeChanged(patch)
    }

    fn publish_badge(&mut self) {
        let event = self.badge_event();
        self.channels.emit(event);
    }

    /// Badge and list go out as one update.
    fn publish_views(&mut self) {
        let mut events = vec![self.badge_event()];
        if self.store.list_state() != ListState::Unknown {
            events.push(ClientEvent::ListChanged(render_list(self.store.items())));
        }
        self.channels.emit_all(events);
    }
}

struct CascadeState {
    api: Arc<dyn OptionsApi>,
    form: CascadeForm,
    channels: ClientChannels,
    completion_tx: mpsc::UnboundedSender<Completion>,
}

impl CascadeState {
    fn on_change(&mut self, level: CascadeLevel, value: Option<String>) {
        let step = self.form.on_change(level, value);
        for reset in step.reset {
            self.channels.emit(ClientEvent::OptionsReplaced {
                level: reset,
                options: placeholder_options(),
            });
        }

        let Some(request) = step.fetch else {
            return;
        };
        let api = Arc::clone(&self.api);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = api.load_options(&request).await;
            let _ = completion_tx.send(Completion::OptionsLoaded { request, result });
        });
    }

    fn options_loaded(&mut self, request: OptionsRequest, result: Result<String, ClientError>) {
        let html = match result {
            Ok(html) => html,
            Err(error) => {
                warn!(
                    code = %error.code,
                    message = %error.message,
                    child = ?request.child,
                    "loading dependent options failed; keeping current options"
                );
                return;
            }
        };

        let options = parse_options_fragment(&html);
        if self.form.apply_options(&request, options.clone()) {
            self.channels.emit(ClientEvent::OptionsReplaced {
                level: request.child,
                options,
            });
        } else {
            debug!(
                child = ?request.child,
                parent_value = %request.parent_value,
                "discarding options for a parent that is no longer selected"
            );
        }
    }
}
