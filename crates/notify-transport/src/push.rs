//! Push-channel transport seam and its WebSocket implementation.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use notify_core::{ClientError, ErrorCategory};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::header::{COOKIE, HeaderValue},
    },
};
use tracing::{debug, info};
use url::Url;

/// One inbound frame, reduced to what the connection manager acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFrame {
    Text(String),
    /// Close frame; `code` is absent when the peer sent none.
    Close { code: Option<u16> },
    /// Binary, ping, pong and raw frames.
    Other,
}

/// Opens push sessions.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn PushSession>, ClientError>;
}

/// A single open push session.
#[async_trait]
pub trait PushSession: Send {
    /// Next inbound frame; `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<PushFrame, ClientError>>;

    async fn send_text(&mut self, text: String) -> Result<(), ClientError>;

    async fn close(&mut self);
}

#[derive(Debug, Clone)]
pub struct WsPushTransport {
    url: Url,
    session_cookie: Option<String>,
}

impl WsPushTransport {
    pub fn new(push_url: &str, session_cookie: Option<String>) -> Result<Self, ClientError> {
        let url = Url::parse(push_url).map_err(|err| {
            ClientError::new(
                ErrorCategory::Config,
                "invalid_url",
                format!("invalid push_url '{push_url}': {err}"),
            )
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ClientError::new(
                ErrorCategory::Config,
                "invalid_url",
                format!("push_url must use ws or wss, got '{}'", url.scheme()),
            ));
        }

        Ok(Self {
            url,
            session_cookie,
        })
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    async fn connect(&self) -> Result<Box<dyn PushSession>, ClientError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|err| map_ws_error("push_request_error", err))?;
        if let Some(cookie) = self.session_cookie.as_deref() {
            let value = HeaderValue::from_str(cookie).map_err(|err| {
                ClientError::new(ErrorCategory::Config, "invalid_session_cookie", err.to_string())
            })?;
            request.headers_mut().insert(COOKIE, value);
        }

        debug!(url = %self.url, "opening push session");
        let (stream, response) = connect_async(request)
            .await
            .map_err(|err| map_ws_error("push_connect_error", err))?;
        info!(url = %self.url, status = %response.status(), "push session open");

        Ok(Box::new(WsPushSession { stream }))
    }
}

struct WsPushSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushSession for WsPushSession {
    async fn next_frame(&mut self) -> Option<Result<PushFrame, ClientError>> {
        let message = match self.stream.next().await? {
            Ok(message) => message,
            Err(err) => return Some(Err(map_ws_error("push_receive_error", err))),
        };

        let frame = match message {
            Message::Text(text) => PushFrame::Text(text.as_str().to_owned()),
            Message::Close(frame) => PushFrame::Close {
                code: frame.map(|frame| u16::from(frame.code)),
            },
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                PushFrame::Other
            }
        };
        Some(Ok(frame))
    }

    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|err| map_ws_error("push_send_error", err))
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            debug!(error = %err, "push session close handshake failed");
        }
    }
}

fn map_ws_error(code: &str, err: tokio_tungstenite::tungstenite::Error) -> ClientError {
    ClientError::new(ErrorCategory::Network, code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_url_must_be_a_websocket_url() {
        let err = WsPushTransport::new("https://sga.example.org/ws/", None)
            .expect_err("http scheme is rejected");
        assert_eq!(err.code, "invalid_url");

        WsPushTransport::new("wss://sga.example.org/ws/notificacoes/", Some("sessionid=abc".into()))
            .expect("wss accepted");
    }

    #[tokio::test]
    async fn invalid_cookie_is_reported_before_connecting() {
        let transport =
            WsPushTransport::new("ws://127.0.0.1:9/ws/", Some("bad\ncookie".into())).expect("url");
        let err = match transport.connect().await {
            Ok(_) => panic!("connect should fail"),
            Err(err) => err,
        };
        assert_eq!(err.code, "invalid_session_cookie");
    }
}
