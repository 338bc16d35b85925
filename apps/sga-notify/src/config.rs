//! Environment-backed runtime configuration for `sga-notify`.

use std::{env, error::Error, fmt};

use notify_core::{CascadeEndpoints, ClientConfig, NotificationConfig, ReconnectPolicy};
use url::Url;

const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 3_000;
const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_TOAST_DURATION_MS: u64 = 6_000;

const NOTIFICATION_KEYS: [&str; 4] = [
    "SGA_WS_URL",
    "SGA_MARK_READ_URL",
    "SGA_CHECK_NOTIFICATIONS_URL",
    "SGA_CSRF_TOKEN",
];

/// Runtime configuration used by the terminal host.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub client: ClientConfig,
    /// One message per subsystem left disabled by missing settings.
    pub disabled: Vec<String>,
}

impl AppConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut disabled = Vec::new();

        let push_url = optional_url("SGA_WS_URL", &["ws", "wss"], &mut lookup)?;
        let mark_read_url = optional_url("SGA_MARK_READ_URL", &["http", "https"], &mut lookup)?;
        let check_notifications_url =
            optional_url("SGA_CHECK_NOTIFICATIONS_URL", &["http", "https"], &mut lookup)?;
        let csrf_token = optional_trimmed_env("SGA_CSRF_TOKEN", &mut lookup);
        let is_authenticated = parse_optional_bool("SGA_AUTHENTICATED", false, &mut lookup)?;
        let badge_mounted = parse_optional_bool("SGA_BADGE_MOUNTED", false, &mut lookup)?;
        let session_cookie = optional_trimmed_env("SGA_SESSION_COOKIE", &mut lookup);

        let base_delay_ms = parse_positive_u64(
            "SGA_RECONNECT_BASE_DELAY_MS",
            DEFAULT_RECONNECT_BASE_DELAY_MS,
            &mut lookup,
        )?;
        let max_attempts = parse_positive_u32(
            "SGA_RECONNECT_MAX_ATTEMPTS",
            DEFAULT_RECONNECT_MAX_ATTEMPTS,
            &mut lookup,
        )?;
        let toast_duration_ms = parse_positive_u64(
            "SGA_TOAST_DURATION_MS",
            DEFAULT_TOAST_DURATION_MS,
            &mut lookup,
        )?;

        let notifications = match (push_url, mark_read_url, check_notifications_url, csrf_token) {
            (
                Some(push_url),
                Some(mark_read_url),
                Some(check_notifications_url),
                Some(csrf_token),
            ) => {
                Some(NotificationConfig {
                    push_url,
                    mark_read_url,
                    check_notifications_url,
                    csrf_token,
                    is_authenticated,
                    session_cookie: session_cookie.clone(),
                    badge_mounted,
                    reconnect: ReconnectPolicy::new(base_delay_ms, max_attempts),
                    toast_duration_ms,
                })
            }
            _ => {
                let missing: Vec<&str> = NOTIFICATION_KEYS
                    .into_iter()
                    .filter(|key| optional_trimmed_env(key, &mut lookup).is_none())
                    .collect();
                disabled.push(format!(
                    "notifications disabled: missing {}",
                    missing.join(", ")
                ));
                None
            }
        };

        let departments_url =
            optional_url("SGA_LOAD_DEPARTMENTS_URL", &["http", "https"], &mut lookup)?;
        let sections_url = optional_url("SGA_LOAD_SECTIONS_URL", &["http", "https"], &mut lookup)?;
        let cascade = match (departments_url, sections_url) {
            (Some(departments_url), Some(sections_url)) => Some(CascadeEndpoints {
                departments_url,
                sections_url,
                session_cookie,
            }),
            (None, None) => None,
            (Some(_), None) => {
                disabled
                    .push("cascading selector disabled: missing SGA_LOAD_SECTIONS_URL".to_owned());
                None
            }
            (None, Some(_)) => {
                disabled
                    .push("cascading selector disabled: missing SGA_LOAD_DEPARTMENTS_URL".to_owned());
                None
            }
        };

        Ok(Self {
            client: ClientConfig {
                notifications,
                cascade,
            },
            disabled,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn optional_trimmed_env<F>(key: &str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn optional_url<F>(
    key: &'static str,
    schemes: &[&str],
    lookup: &mut F,
) -> Result<Option<String>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(None);
    };
    let url = Url::parse(&value).map_err(|err| ConfigError::InvalidValue {
        key,
        value: value.clone(),
        reason: err.to_string(),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidValue {
            key,
            value,
            reason: format!("scheme must be one of {}", schemes.join("/")),
        });
    }
    Ok(Some(value))
}

fn parse_optional_bool<F>(
    key: &'static str,
    default: bool,
    lookup: &mut F,
) -> Result<bool, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected a boolean (true/false)".to_owned(),
        }),
    }
}

fn parse_positive_u64<F>(
    key: &'static str,
    default: u64,
    lookup: &mut F,
) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    match value.parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "must be at least 1".to_owned(),
        }),
        Ok(parsed) => Ok(parsed),
        Err(err) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        }),
    }
}

fn parse_positive_u32<F>(
    key: &'static str,
    default: u32,
    lookup: &mut F,
) -> Result<u32, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let parsed = parse_positive_u64(key, u64::from(default), lookup)?;
    u32::try_from(parsed).map_err(|err| ConfigError::InvalidValue {
        key,
        value: parsed.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const COMPLETE: [(&str, &str); 4] = [
        ("SGA_WS_URL", "wss://sga.example.org/ws/notificacoes/"),
        (
            "SGA_MARK_READ_URL",
            "https://sga.example.org/notificacoes/marcar-como-lidas/",
        ),
        (
            "SGA_CHECK_NOTIFICATIONS_URL",
            "https://sga.example.org/notificacoes/verificar/",
        ),
        ("SGA_CSRF_TOKEN", "  token  "),
    ];

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn parses_complete_notification_config_with_defaults() {
        let cfg = config_from_pairs(&COMPLETE).expect("config should parse");

        let notifications = cfg.client.notifications.expect("notifications enabled");
        assert_eq!(notifications.csrf_token, "token");
        assert!(!notifications.is_authenticated);
        assert!(!notifications.badge_mounted);
        assert_eq!(notifications.reconnect, ReconnectPolicy::new(3_000, 5));
        assert_eq!(notifications.toast_duration_ms, DEFAULT_TOAST_DURATION_MS);
        assert!(cfg.client.cascade.is_none());
        assert!(cfg.disabled.is_empty());
    }

    #[test]
    fn missing_required_keys_disable_notifications_with_one_message() {
        let cfg = config_from_pairs(&[("SGA_WS_URL", "ws://localhost:8000/ws/notificacoes/")])
            .expect("partial config is not an error");

        assert!(cfg.client.notifications.is_none());
        assert_eq!(
            cfg.disabled,
            vec![
                "notifications disabled: missing SGA_MARK_READ_URL, SGA_CHECK_NOTIFICATIONS_URL, SGA_CSRF_TOKEN"
                    .to_owned()
            ]
        );
    }

    #[test]
    fn parses_authentication_cookie_and_tuning() {
        let mut pairs = COMPLETE.to_vec();
        pairs.extend([
            ("SGA_AUTHENTICATED", "yes"),
            ("SGA_SESSION_COOKIE", "sessionid=abc"),
            ("SGA_RECONNECT_BASE_DELAY_MS", "1000"),
            ("SGA_RECONNECT_MAX_ATTEMPTS", "3"),
            ("SGA_LOAD_DEPARTMENTS_URL", "https://sga.example.org/ajax/load-departamentos/"),
            ("SGA_LOAD_SECTIONS_URL", "https://sga.example.org/ajax/load-seccoes/"),
        ]);
        let cfg = config_from_pairs(&pairs).expect("config should parse");

        let notifications = cfg.client.notifications.expect("notifications enabled");
        assert!(notifications.is_authenticated);
        assert_eq!(notifications.session_cookie.as_deref(), Some("sessionid=abc"));
        assert_eq!(notifications.reconnect, ReconnectPolicy::new(1_000, 3));

        let cascade = cfg.client.cascade.expect("cascade enabled");
        assert_eq!(cascade.session_cookie.as_deref(), Some("sessionid=abc"));
    }

    #[test]
    fn half_configured_cascade_is_disabled() {
        let cfg = config_from_pairs(&[(
            "SGA_LOAD_DEPARTMENTS_URL",
            "https://sga.example.org/ajax/load-departamentos/",
        )])
        .expect("config should parse");

        assert!(cfg.client.cascade.is_none());
        assert!(
            cfg.disabled
                .iter()
                .any(|message| message.contains("SGA_LOAD_SECTIONS_URL"))
        );
    }

    #[test]
    fn rejects_zero_and_invalid_values() {
        let mut pairs = COMPLETE.to_vec();
        pairs.push(("SGA_RECONNECT_MAX_ATTEMPTS", "0"));
        let err = config_from_pairs(&pairs).expect_err("zero attempts should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "SGA_RECONNECT_MAX_ATTEMPTS",
                ..
            }
        ));

        let err = config_from_pairs(&[("SGA_AUTHENTICATED", "maybe")])
            .expect_err("invalid boolean should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "SGA_AUTHENTICATED",
                ..
            }
        ));
    }

    #[test]
    fn push_url_must_use_websocket_scheme() {
        let err = config_from_pairs(&[("SGA_WS_URL", "https://sga.example.org/ws/")])
            .expect_err("http push url should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "SGA_WS_URL",
                ..
            }
        ));
    }
}
