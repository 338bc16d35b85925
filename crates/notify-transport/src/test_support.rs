use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use notify_core::{
    ClientError, ClientEvent, ErrorCategory, EventStream, MarkReadResponse, Notification,
    NotificationId, OptionsRequest,
};
use tokio::{
    sync::{Semaphore, mpsc},
    time::timeout,
};

use crate::{
    api::{NotificationApi, OptionsApi},
    push::{PushFrame, PushSession, PushTransport},
};

pub(crate) enum Script {
    Fail,
    Open(FakeSession),
}

/// Test side of an open fake session. Dropping `frames` ends the session.
pub(crate) struct SessionControl {
    pub frames: mpsc::UnboundedSender<PushFrame>,
    pub sent: Arc<Mutex<Vec<String>>>,
}

impl SessionControl {
    pub fn push_text(&self, text: &str) {
        self.frames
            .send(PushFrame::Text(text.to_owned()))
            .expect("fake session is open");
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("sent").clone()
    }

    pub async fn wait_sent(&self, count: usize) -> Vec<String> {
        timeout(Duration::from_secs(2), async {
            loop {
                let sent = self.sent();
                if sent.len() >= count {
                    return sent;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("outbound delivery timeout")
    }
}

pub(crate) fn open_script() -> (Script, SessionControl) {
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let session = FakeSession {
        frames: frames_rx,
        sent: Arc::clone(&sent),
    };
    (
        Script::Open(session),
        SessionControl {
            frames: frames_tx,
            sent,
        },
    )
}

pub(crate) struct FakeTransport {
    scripts: Mutex<VecDeque<Script>>,
    connects: AtomicUsize,
}

impl FakeTransport {
    /// Transport that plays `scripts` in order, then fails every connect.
    pub fn with(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn connect(&self) -> Result<Box<dyn PushSession>, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().expect("scripts").pop_front();
        match script {
            Some(Script::Open(session)) => Ok(Box::new(session)),
            Some(Script::Fail) | None => Err(ClientError::new(
                ErrorCategory::Network,
                "push_connect_error",
                "connection refused",
            )),
        }
    }
}

pub(crate) struct FakeSession {
    frames: mpsc::UnboundedReceiver<PushFrame>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl PushSession for FakeSession {
    async fn next_frame(&mut self) -> Option<Result<PushFrame, ClientError>> {
        self.frames.recv().await.map(Ok)
    }

    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        self.sent.lock().expect("sent").push(text);
        Ok(())
    }

    async fn close(&mut self) {}
}

/// Blocks calls while held; released calls all proceed.
#[derive(Default)]
struct Gate(Mutex<Option<Arc<Semaphore>>>);

impl Gate {
    fn hold(&self) {
        *self.0.lock().expect("gate") = Some(Arc::new(Semaphore::new(0)));
    }

    fn release(&self) {
        if let Some(semaphore) = self.0.lock().expect("gate").take() {
            semaphore.close();
        }
    }

    async fn pass(&self) {
        let semaphore = self.0.lock().expect("gate").clone();
        if let Some(semaphore) = semaphore {
            // Closing the semaphore wakes every waiter with an error.
            let _ = semaphore.acquire().await;
        }
    }
}

pub(crate) struct FakeNotificationApi {
    list: Mutex<Vec<Notification>>,
    mark_status: Mutex<String>,
    marks: Mutex<Vec<Option<NotificationId>>>,
    fetches: AtomicUsize,
    mark_gate: Gate,
    fetch_gate: Gate,
}

impl FakeNotificationApi {
    pub fn with_list(list: Vec<Notification>) -> Arc<Self> {
        Arc::new(Self {
            list: Mutex::new(list),
            mark_status: Mutex::new("ok".to_owned()),
            marks: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            mark_gate: Gate::default(),
            fetch_gate: Gate::default(),
        })
    }

    /// Keep mark-read calls in flight until [`Self::release_marks`].
    pub fn hold_marks(&self) {
        self.mark_gate.hold();
    }

    pub fn release_marks(&self) {
        self.mark_gate.release();
    }

    pub fn hold_fetches(&self) {
        self.fetch_gate.hold();
    }

    pub fn set_list(&self, list: Vec<Notification>) {
        *self.list.lock().expect("list") = list;
    }

    pub fn set_mark_status(&self, status: &str) {
        *self.mark_status.lock().expect("status") = status.to_owned();
    }

    pub fn marks(&self) -> Vec<Option<NotificationId>> {
        self.marks.lock().expect("marks").clone()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationApi for FakeNotificationApi {
    async fn mark_read(
        &self,
        id: Option<&NotificationId>,
    ) -> Result<MarkReadResponse, ClientError> {
        self.marks.lock().expect("marks").push(id.cloned());
        self.mark_gate.pass().await;
        Ok(MarkReadResponse {
            status: self.mark_status.lock().expect("status").clone(),
        })
    }

    async fn fetch_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_gate.pass().await;
        Ok(self.list.lock().expect("list").clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeOptionsApi {
    requests: Mutex<Vec<OptionsRequest>>,
}

impl FakeOptionsApi {
    pub fn requests(&self) -> Vec<OptionsRequest> {
        self.requests.lock().expect("requests").clone()
    }
}

#[async_trait]
impl OptionsApi for FakeOptionsApi {
    async fn load_options(&self, request: &OptionsRequest) -> Result<String, ClientError> {
        self.requests.lock().expect("requests").push(request.clone());
        Ok(format!(
            r#"<option value="">---------</option><option value="{0}1">Child of {0}</option>"#,
            request.parent_value
        ))
    }
}

pub(crate) fn notification(id: u64, read: bool) -> Notification {
    Notification {
        id: NotificationId::from(id),
        message: format!("Documento {id}"),
        link: Some(format!("/doc/{id}")),
        timestamp: Some("12/03/2025 10:00".to_owned()),
        read,
    }
}

/// Receive events until one matches `wanted`.
pub(crate) async fn wait_for(
    events: &mut EventStream,
    wanted: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    timeout(Duration::from_secs(2), async {
        loop {
            let event = events.recv().await.expect("event receive");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event timeout")
}
