//! HTTP side of the client: mark-read, list refresh and cascade option loading.

use async_trait::async_trait;
use notify_core::{
    CascadeEndpoints, CascadeLevel, ClientError, ErrorCategory, MarkReadRequest,
    MarkReadResponse, Notification, NotificationConfig, NotificationId, NotificationListResponse,
    OptionsRequest, classify_http_status,
};
use reqwest::{
    Client, RequestBuilder, Response,
    header::{CONTENT_TYPE, COOKIE},
};
use tracing::{debug, trace};
use url::Url;

const CSRF_HEADER: &str = "X-CSRFToken";
const USER_AGENT: &str = concat!("sga-notify/", env!("CARGO_PKG_VERSION"));

/// Server endpoints consumed by the notification subsystem.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Mark one notification read, or all of them when `id` is `None`.
    async fn mark_read(&self, id: Option<&NotificationId>) -> Result<MarkReadResponse, ClientError>;

    /// Fetch the current notification list.
    async fn fetch_notifications(&self) -> Result<Vec<Notification>, ClientError>;
}

/// Server endpoint returning `<option>` fragments for the cascade.
#[async_trait]
pub trait OptionsApi: Send + Sync {
    async fn load_options(&self, request: &OptionsRequest) -> Result<String, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpNotificationApi {
    client: Client,
    mark_read_url: Url,
    check_notifications_url: Url,
    csrf_token: String,
    session_cookie: Option<String>,
}

impl HttpNotificationApi {
    pub fn new(config: &NotificationConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client()?,
            mark_read_url: parse_url("mark_read_url", &config.mark_read_url)?,
            check_notifications_url: parse_url(
                "check_notifications_url",
                &config.check_notifications_url,
            )?,
            csrf_token: config.csrf_token.clone(),
            session_cookie: config.session_cookie.clone(),
        })
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn mark_read(
        &self,
        id: Option<&NotificationId>,
    ) -> Result<MarkReadResponse, ClientError> {
        let mut request = self
            .client
            .post(self.mark_read_url.clone())
            .header(CSRF_HEADER, &self.csrf_token)
            .header(CONTENT_TYPE, "application/json");
        if let Some(id) = id {
            request = request.json(&MarkReadRequest {
                notification_id: id.clone(),
            });
        }

        debug!(notification_id = ?id.map(NotificationId::as_str), "posting mark-read");
        let response = send(with_cookie(request, self.session_cookie.as_deref())).await?;
        response.json::<MarkReadResponse>().await.map_err(map_decode_error)
    }

    async fn fetch_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        let request = self.client.get(self.check_notifications_url.clone());
        let response = send(with_cookie(request, self.session_cookie.as_deref())).await?;
        let body = response
            .json::<NotificationListResponse>()
            .await
            .map_err(map_decode_error)?;
        trace!(count = body.notifications.len(), "fetched notification list");
        Ok(body.notifications)
    }
}

#[derive(Debug, Clone)]
pub struct HttpOptionsApi {
    client: Client,
    departments_url: Url,
    sections_url: Url,
    session_cookie: Option<String>,
}

impl HttpOptionsApi {
    pub fn new(endpoints: &CascadeEndpoints) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client()?,
            departments_url: parse_url("departments_url", &endpoints.departments_url)?,
            sections_url: parse_url("sections_url", &endpoints.sections_url)?,
            session_cookie: endpoints.session_cookie.clone(),
        })
    }

    fn url_for(&self, level: CascadeLevel) -> Result<Url, ClientError> {
        match level {
            CascadeLevel::Department => Ok(self.departments_url.clone()),
            CascadeLevel::Section => Ok(self.sections_url.clone()),
            CascadeLevel::Administration => Err(ClientError::new(
                ErrorCategory::Internal,
                "no_options_endpoint",
                "administration options are not loaded dynamically",
            )),
        }
    }
}

#[async_trait]
impl OptionsApi for HttpOptionsApi {
    async fn load_options(&self, request: &OptionsRequest) -> Result<String, ClientError> {
        let url = self.url_for(request.child)?;
        let builder = self
            .client
            .get(url)
            .query(&[(request.param, request.parent_value.as_str())]);

        debug!(
            child = ?request.child,
            param = request.param,
            parent_value = %request.parent_value,
            "loading dependent options"
        );
        let response = send(with_cookie(builder, self.session_cookie.as_deref())).await?;
        response.text().await.map_err(map_transport_error)
    }
}

fn build_client() -> Result<Client, ClientError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|err| {
            ClientError::new(
                ErrorCategory::Config,
                "http_client_build_error",
                err.to_string(),
            )
        })
}

fn parse_url(field: &str, value: &str) -> Result<Url, ClientError> {
    Url::parse(value).map_err(|err| {
        ClientError::new(
            ErrorCategory::Config,
            "invalid_url",
            format!("invalid {field} '{value}': {err}"),
        )
    })
}

fn with_cookie(request: RequestBuilder, cookie: Option<&str>) -> RequestBuilder {
    match cookie {
        Some(cookie) => request.header(COOKIE, cookie),
        None => request,
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
    let response = request.send().await.map_err(map_transport_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(ClientError::new(
        classify_http_status(status.as_u16()),
        "http_status_error",
        format!("server answered HTTP {status}"),
    ))
}

fn map_transport_error(err: reqwest::Error) -> ClientError {
    ClientError::new(ErrorCategory::Network, "http_transport_error", err.to_string())
}

fn map_decode_error(err: reqwest::Error) -> ClientError {
    if err.is_decode() {
        ClientError::new(ErrorCategory::Serialization, "http_decode_error", err.to_string())
    } else {
        map_transport_error(err)
    }
}
