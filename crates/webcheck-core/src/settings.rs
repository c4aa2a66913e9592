//! Configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```json
//! {
//!   "MIN_REPEAT": 5,
//!   "REQUEST_TIMEOUT": 15,
//!   "DEFAULT_DOT_STYLE": true,
//!   "STARTUP_MESSAGE": true,
//!   "TELEGRAM": { "ENABLED": true, "TOKENS": ["123:abc"], "CHAT_IDS": ["42"] },
//!   "NTFY": { "ENABLED": true, "TOKENS": ["alerts"], "CHAT_URLS": ["https://ntfy.sh"] },
//!   "CUSTOM": {
//!     "ENABLED": true,
//!     "URLS": ["https://hooks.example.com/in"],
//!     "HEADERS": [{ "Authorization": "Bearer x" }],
//!     "PAYLOADS": [{ "title": "", "message": "", "priority": 5 }],
//!     "FORMAT_MESSAGES": ["markdown"]
//!   }
//! }
//! ```
//!
//! Global values that are missing or malformed fall back to their defaults;
//! a broken platform section is skipped. Only an unreadable file or a
//! document that is not an object is an error.

use std::ops::RangeInclusive;
use std::path::Path;

use serde::de::Deserializer;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{
    DotStyle, MonitorConfig, MAX_POLL_MINUTES, MIN_POLL_MINUTES, MIN_REQUEST_TIMEOUT_SECS,
};
use crate::document::read_document;
use crate::error::ConfigError;
use crate::format::MessageFormat;
use crate::notify::{Channel, CustomTarget, PayloadTemplate, Platform, Target};

#[derive(Debug, Clone)]
pub struct Settings {
    pub monitor: MonitorConfig,
    pub channels: Vec<Channel>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let document = read_document(path)?;
        Self::from_value(path, &document)
    }

    pub fn from_value(path: &Path, document: &Value) -> Result<Self, ConfigError> {
        let root = document.as_object().ok_or_else(|| ConfigError::Structure {
            path: path.to_path_buf(),
            message: "expected an object at the top level".into(),
        })?;

        let defaults = MonitorConfig::default();
        let monitor = MonitorConfig::default()
            .with_poll_minutes(read_integer(
                root,
                "MIN_REPEAT",
                defaults.poll_minutes(),
                MIN_POLL_MINUTES..=MAX_POLL_MINUTES,
            ))
            .with_request_timeout_secs(read_integer(
                root,
                "REQUEST_TIMEOUT",
                defaults.request_timeout.as_secs(),
                MIN_REQUEST_TIMEOUT_SECS..=u64::MAX,
            ))
            .with_dot_style(DotStyle::from_default_flag(read_bool(root, "DEFAULT_DOT_STYLE", true)))
            .with_startup_message(read_bool(root, "STARTUP_MESSAGE", defaults.startup_message))
            .with_max_concurrent_probes(
                usize::try_from(read_integer(
                    root,
                    "MAX_CONCURRENT_PROBES",
                    defaults.max_concurrent_probes as u64,
                    1..=u64::MAX,
                ))
                .unwrap_or(usize::MAX),
            );

        let channels = Platform::ALL
            .iter()
            .filter_map(|p| root.get(p.config_key()).map(|section| (*p, section)))
            .flat_map(|(platform, section)| parse_section(platform, section))
            .collect();

        Ok(Self { monitor, channels })
    }
}

fn read_integer(
    root: &Map<String, Value>,
    key: &str,
    default: u64,
    bounds: RangeInclusive<u64>,
) -> u64 {
    let (min, max) = (*bounds.start(), *bounds.end());
    let value = match root.get(key) {
        None => {
            debug!(key, default, "Setting not present, using default");
            return default;
        }
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };

    match value {
        Some(v) if v < min => {
            warn!(key, value = v, min, "Setting below minimum, clamping");
            min
        }
        Some(v) if v > max => {
            warn!(key, value = v, max, "Setting above maximum, clamping");
            max
        }
        Some(v) => v,
        None => {
            warn!(key, default, "Malformed setting, using default");
            default
        }
    }
}

fn read_bool(root: &Map<String, Value>, key: &str, default: bool) -> bool {
    match root.get(key) {
        None => default,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
        Some(_) => {
            warn!(key, default, "Malformed setting, using default");
            default
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
struct PlatformSection {
    #[serde(alias = "ON")]
    enabled: bool,
    format: Option<String>,
    #[serde(deserialize_with = "string_list")]
    tokens: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    chat_ids: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    server_urls: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    room_ids: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    chat_urls: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    user_keys: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    urls: Vec<String>,
    headers: Vec<Map<String, Value>>,
    payloads: Vec<Map<String, Value>>,
    #[serde(deserialize_with = "string_list")]
    format_messages: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    secrets: Vec<String>,
}

/// Accepts a list of strings or numbers (chat IDs are often numeric), or a
/// single scalar.
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    fn scalar<E: serde::de::Error>(value: Value) -> Result<String, E> {
        match value {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(E::custom(format!("expected string or number, got {}", other))),
        }
    }

    match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().map(scalar::<D::Error>).collect(),
        Value::Null => Ok(Vec::new()),
        other => scalar::<D::Error>(other).map(|s| vec![s]),
    }
}

fn parse_section(platform: Platform, value: &Value) -> Vec<Channel> {
    let section: PlatformSection = match PlatformSection::deserialize(value) {
        Ok(s) => s,
        Err(e) => {
            warn!(platform = %platform, error = %e, "Malformed platform section, skipping");
            return Vec::new();
        }
    };

    let format = section
        .format
        .as_deref()
        .map(MessageFormat::parse)
        .unwrap_or_else(|| platform.default_format());

    if platform == Platform::Custom {
        return custom_channels(&section, format);
    }

    let targets = platform_targets(platform, &section);
    if section.enabled && targets.is_empty() {
        warn!(platform = %platform, "Platform enabled but has no recipients");
    }
    vec![Channel::new(platform, targets)
        .with_format(format)
        .with_enabled(section.enabled)]
}

fn platform_targets(platform: Platform, s: &PlatformSection) -> Vec<Target> {
    let tokens = &s.tokens;
    match platform {
        Platform::Telegram => {
            check_lengths(platform, &[("TOKENS", tokens.len()), ("CHAT_IDS", s.chat_ids.len())]);
            tokens
                .iter()
                .zip(&s.chat_ids)
                .map(|(token, chat_id)| Target::Telegram {
                    token: token.clone(),
                    chat_id: chat_id.clone(),
                })
                .collect()
        }
        Platform::Discord => tokens
            .iter()
            .map(|token| Target::Discord { token: token.clone() })
            .collect(),
        Platform::Slack => tokens
            .iter()
            .map(|token| Target::Slack { token: token.clone() })
            .collect(),
        Platform::Pushbullet => tokens
            .iter()
            .map(|token| Target::Pushbullet { token: token.clone() })
            .collect(),
        Platform::Matrix => {
            check_lengths(
                platform,
                &[
                    ("TOKENS", tokens.len()),
                    ("SERVER_URLS", s.server_urls.len()),
                    ("ROOM_IDS", s.room_ids.len()),
                ],
            );
            tokens
                .iter()
                .zip(&s.server_urls)
                .zip(&s.room_ids)
                .map(|((token, server_url), room_id)| Target::Matrix {
                    server_url: server_url.clone(),
                    room_id: room_id.clone(),
                    token: token.clone(),
                })
                .collect()
        }
        Platform::Gotify => {
            check_lengths(platform, &[("TOKENS", tokens.len()), ("CHAT_URLS", s.chat_urls.len())]);
            tokens
                .iter()
                .zip(&s.chat_urls)
                .map(|(token, server_url)| Target::Gotify {
                    server_url: server_url.clone(),
                    token: token.clone(),
                })
                .collect()
        }
        Platform::Ntfy => {
            check_lengths(platform, &[("TOKENS", tokens.len()), ("CHAT_URLS", s.chat_urls.len())]);
            tokens
                .iter()
                .zip(&s.chat_urls)
                .map(|(topic, server_url)| Target::Ntfy {
                    server_url: server_url.clone(),
                    topic: topic.clone(),
                })
                .collect()
        }
        Platform::Pushover => {
            check_lengths(platform, &[("TOKENS", tokens.len()), ("USER_KEYS", s.user_keys.len())]);
            tokens
                .iter()
                .zip(&s.user_keys)
                .map(|(token, user_key)| Target::Pushover {
                    token: token.clone(),
                    user_key: user_key.clone(),
                })
                .collect()
        }
        Platform::Custom => Vec::new(),
    }
}

/// Every custom URL is its own channel since each may pick its own format.
fn custom_channels(s: &PlatformSection, section_format: MessageFormat) -> Vec<Channel> {
    if s.payloads.len() != s.urls.len() {
        warn!(
            urls = s.urls.len(),
            payloads = s.payloads.len(),
            "CUSTOM payload count differs from URL count; missing payloads send a plain text field"
        );
    }

    s.urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            let template = match s.payloads.get(i) {
                Some(payload) => PayloadTemplate::resolve(payload),
                None => PayloadTemplate::resolve(&text_only_template()),
            };
            let headers = s
                .headers
                .get(i)
                .map(|h| {
                    h.iter()
                        .map(|(name, value)| (name.clone(), header_value(value)))
                        .collect()
                })
                .unwrap_or_default();
            let format = s
                .format_messages
                .get(i)
                .map(|f| MessageFormat::parse(f))
                .unwrap_or(section_format);
            let secret = s.secrets.get(i).filter(|k| !k.is_empty()).cloned();

            Channel::new(
                Platform::Custom,
                vec![Target::Custom(CustomTarget {
                    url: url.clone(),
                    headers,
                    template,
                    secret,
                })],
            )
            .with_format(format)
            .with_enabled(s.enabled)
        })
        .collect()
}

fn text_only_template() -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("text".into(), Value::String(String::new()));
    m
}

fn header_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn check_lengths(platform: Platform, lists: &[(&str, usize)]) {
    if lists.windows(2).any(|w| w[0].1 != w[1].1) {
        let lengths: Vec<String> = lists.iter().map(|(k, n)| format!("{}={}", k, n)).collect();
        warn!(
            platform = %platform,
            lengths = %lengths.join(", "),
            "Recipient lists differ in length; extra entries are ignored"
        );
    }
}
