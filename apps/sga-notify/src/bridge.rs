//! Terminal bridge: stdin gestures become runtime commands, events become lines.

use std::{error::Error, fmt};

use notify_core::{
    BadgePatch, CascadeLevel, ClickTarget, ClientCommand, ClientEvent, EventStream, ListView,
    NotificationId, ViewSnapshot,
};
use notify_transport::ClientRuntimeHandle;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, warn};

pub const HELP: &str = "\
gestures:
  bell                 toggle the notification dropdown
  inside | outside     click inside / outside the dropdown
  open <id>            click a dropdown row
  link <id>            click a row's action link
  toast [link]         click a toast, following <link> when given
  read-all             mark every notification read
  refresh              re-fetch the notification list
  select <adm|dep|sec> [value]
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureError {
    Unknown(String),
    MissingArgument(&'static str),
}

impl fmt::Display for GestureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(word) => write!(f, "unknown gesture '{word}'"),
            Self::MissingArgument(name) => write!(f, "missing argument <{name}>"),
        }
    }
}

impl Error for GestureError {}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_gesture(line: &str) -> Result<Option<ClientCommand>, GestureError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest = words.next();

    let command = match verb {
        "bell" => ClientCommand::BellClicked,
        "inside" => ClientCommand::DocumentClicked {
            inside_dropdown: true,
        },
        "outside" => ClientCommand::DocumentClicked {
            inside_dropdown: false,
        },
        "open" | "link" => ClientCommand::ItemClicked {
            id: NotificationId::new(rest.ok_or(GestureError::MissingArgument("id"))?),
            target: if verb == "open" {
                ClickTarget::RowBody
            } else {
                ClickTarget::ActionLink
            },
        },
        "toast" => ClientCommand::ToastClicked {
            link: rest.map(str::to_owned),
        },
        "read-all" => ClientCommand::MarkAllRead,
        "refresh" => ClientCommand::RefreshList,
        "select" => {
            let level = match rest.ok_or(GestureError::MissingArgument("level"))? {
                "adm" => CascadeLevel::Administration,
                "dep" => CascadeLevel::Department,
                "sec" => CascadeLevel::Section,
                other => return Err(GestureError::Unknown(other.to_owned())),
            };
            ClientCommand::SelectChanged {
                level,
                value: words.next().map(str::to_owned),
            }
        }
        "quit" | "exit" => ClientCommand::Shutdown,
        other => return Err(GestureError::Unknown(other.to_owned())),
    };
    Ok(Some(command))
}

/// Render one event as terminal output.
pub fn describe_event(event: &ClientEvent) -> String {
    match event {
        ClientEvent::ConnectionChanged { state, attempt } => {
            format!("[push] {state:?} (attempt {attempt})")
        }
        ClientEvent::ReconnectScheduled { attempt, delay_ms } => {
            format!("[push] reconnecting in {delay_ms} ms (attempt {attempt})")
        }
        ClientEvent::ConnectivityLost { attempts } => {
            format!("[push] gave up after {attempts} attempts; restart to reconnect")
        }
        ClientEvent::BadgeChanged(BadgePatch::Hide) => "[badge] hidden".to_owned(),
        ClientEvent::BadgeChanged(BadgePatch::Create { text } | BadgePatch::Update { text }) => {
            format!("[badge] {text}")
        }
        ClientEvent::ListChanged(ListView::Empty { message }) => format!("[list] {message}"),
        ClientEvent::ListChanged(ListView::Rows(rows)) => {
            let mut out = format!("[list] {} item(s)", rows.len());
            for row in rows {
                let marker = if row.unread_marker { '*' } else { ' ' };
                out.push_str(&format!(
                    "\n  {marker} {:>6}  {}  ({})  -> {}",
                    row.data_id.as_str(),
                    row.message,
                    row.timestamp_text,
                    row.href
                ));
            }
            out
        }
        ClientEvent::Toast(toast) => match toast.link.as_deref() {
            Some(link) => format!("[toast] {} -> {link}", toast.text),
            None => format!("[toast] {}", toast.text),
        },
        ClientEvent::DropdownToggled { open } => {
            format!("[dropdown] {}", if *open { "open" } else { "closed" })
        }
        ClientEvent::Navigate { url } => format!("[navigate] {url}"),
        ClientEvent::PageBroadcast { payload } => format!("[page] {payload}"),
        ClientEvent::OptionsReplaced { level, options } => {
            let labels: Vec<String> = options
                .iter()
                .map(|option| format!("{}={}", option.value, option.label))
                .collect();
            format!("[select {level:?}] {}", labels.join(", "))
        }
        ClientEvent::Error { code, message } => format!("[error] {code}: {message}"),
    }
}

/// Print the current views, then every event until the runtime drops its sender.
pub async fn print_events(view: ViewSnapshot, mut events: EventStream) {
    for event in view.replay() {
        println!("{}", describe_event(&event));
    }
    loop {
        match events.recv().await {
            Ok(event) => println!("{}", describe_event(&event)),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Forward stdin gestures until `quit` or end of input, then shut the runtime down.
pub async fn read_gestures(handle: &ClientRuntimeHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "failed to read stdin");
                break;
            }
        };

        match parse_gesture(&line) {
            Ok(Some(ClientCommand::Shutdown)) => break,
            Ok(Some(command)) => {
                debug!(?command, "forwarding gesture");
                if handle.send(command).await.is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(err) => eprintln!("{err}\n{HELP}"),
        }
    }

    let _ = handle.send(ClientCommand::Shutdown).await;
}
