use std::fmt;

use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

use super::template::{PayloadTemplate, RenderedPayload};
use crate::format::{format_message, split_message, MessageFormat};

const SIGNATURE_HEADER: &str = "X-Signature-256";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Telegram,
    Discord,
    Slack,
    Matrix,
    Gotify,
    Ntfy,
    Pushbullet,
    Pushover,
    Custom,
}

impl Platform {
    pub const ALL: [Platform; 9] = [
        Platform::Telegram,
        Platform::Discord,
        Platform::Slack,
        Platform::Matrix,
        Platform::Gotify,
        Platform::Ntfy,
        Platform::Pushbullet,
        Platform::Pushover,
        Platform::Custom,
    ];

    /// Section name in the configuration file.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::Telegram => "TELEGRAM",
            Self::Discord => "DISCORD",
            Self::Slack => "SLACK",
            Self::Matrix => "MATRIX",
            Self::Gotify => "GOTIFY",
            Self::Ntfy => "NTFY",
            Self::Pushbullet => "PUSHBULLET",
            Self::Pushover => "PUSHOVER",
            Self::Custom => "CUSTOM",
        }
    }

    pub fn default_format(self) -> MessageFormat {
        match self {
            Self::Telegram | Self::Slack | Self::Custom => MessageFormat::Raw,
            Self::Discord | Self::Ntfy => MessageFormat::Markdown,
            Self::Matrix => MessageFormat::Html,
            Self::Gotify | Self::Pushbullet | Self::Pushover => MessageFormat::Text,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Telegram => "Telegram",
            Self::Discord => "Discord",
            Self::Slack => "Slack",
            Self::Matrix => "Matrix",
            Self::Gotify => "Gotify",
            Self::Ntfy => "Ntfy",
            Self::Pushbullet => "Pushbullet",
            Self::Pushover => "Pushover",
            Self::Custom => "Custom",
        };
        f.write_str(name)
    }
}

/// A single HTTP POST ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl OutboundRequest {
    fn json(url: impl Into<String>, payload: &Value) -> Self {
        Self {
            url: url.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: payload.to_string().into_bytes(),
        }
    }

    fn raw(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Generic webhook destination driven by a payload template.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomTarget {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub template: PayloadTemplate,
    /// Optional HMAC-SHA256 key; signs the body in `X-Signature-256`.
    pub secret: Option<String>,
}

/// One recipient of a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Telegram { token: String, chat_id: String },
    Discord { token: String },
    Slack { token: String },
    Matrix { server_url: String, room_id: String, token: String },
    Gotify { server_url: String, token: String },
    Ntfy { server_url: String, topic: String },
    Pushbullet { token: String },
    Pushover { token: String, user_key: String },
    Custom(CustomTarget),
}

impl Target {
    pub fn request(&self, message: &str, format: MessageFormat) -> OutboundRequest {
        match self {
            Self::Telegram { token, chat_id } => {
                let mut payload = json!({
                    "chat_id": chat_id,
                    "text": format_message(message, format),
                });
                let parse_mode = match format {
                    MessageFormat::Html => Some("HTML"),
                    MessageFormat::Text => None,
                    MessageFormat::Markdown | MessageFormat::Raw => Some("Markdown"),
                };
                if let Some(mode) = parse_mode {
                    payload["parse_mode"] = json!(mode);
                }
                OutboundRequest::json(
                    format!("https://api.telegram.org/bot{}/sendMessage", token),
                    &payload,
                )
            }
            Self::Discord { token } => OutboundRequest::json(
                webhook_url("https://discord.com/api/webhooks", token),
                &json!({ "content": format_message(message, format) }),
            ),
            Self::Slack { token } => OutboundRequest::json(
                webhook_url("https://hooks.slack.com/services", token),
                &json!({ "text": format_message(message, format) }),
            ),
            Self::Matrix {
                server_url,
                room_id,
                token,
            } => {
                let mut payload = json!({
                    "msgtype": "m.text",
                    "body": format_message(message, MessageFormat::Text),
                });
                if format == MessageFormat::Html {
                    payload["format"] = json!("org.matrix.custom.html");
                    payload["formatted_body"] = json!(format_message(message, format));
                }
                OutboundRequest::json(
                    format!(
                        "{}/_matrix/client/r0/rooms/{}/send/m.room.message?access_token={}",
                        trim_base(server_url),
                        room_id,
                        token
                    ),
                    &payload,
                )
            }
            Self::Gotify { server_url, token } => {
                let (title, body) = split_message(message);
                let mut text = format_message(&body, format);
                let mut payload = json!({ "title": title, "priority": 0 });
                if format == MessageFormat::Markdown {
                    text = text.replace('\n', "\n\n");
                    payload["extras"] =
                        json!({ "client::display": { "contentType": "text/markdown" } });
                }
                payload["message"] = json!(text);
                OutboundRequest::json(
                    format!("{}/message?token={}", trim_base(server_url), token),
                    &payload,
                )
            }
            Self::Ntfy { server_url, topic } => {
                let (title, body) = split_message(message);
                let mut request = OutboundRequest::raw(
                    format!("{}/{}", trim_base(server_url), topic),
                    format_message(&body, format).into_bytes(),
                );
                if !title.is_empty() {
                    request = request.with_header("Title", title);
                }
                if format == MessageFormat::Markdown {
                    request = request.with_header("Markdown", "yes");
                }
                request
            }
            Self::Pushbullet { token } => {
                let (title, body) = split_message(message);
                OutboundRequest::json(
                    "https://api.pushbullet.com/v2/pushes",
                    &json!({
                        "type": "note",
                        "title": title,
                        "body": format_message(&body, format),
                    }),
                )
                .with_header("Access-Token", token.as_str())
            }
            Self::Pushover { token, user_key } => {
                let (title, body) = split_message(message);
                let mut payload = json!({
                    "token": token,
                    "user": user_key,
                    "title": title,
                    "message": format_message(&body, format),
                });
                if format == MessageFormat::Html {
                    payload["html"] = json!(1);
                }
                OutboundRequest::json("https://api.pushover.net/1/messages.json", &payload)
            }
            Self::Custom(target) => target.request(message, format),
        }
    }
}

impl CustomTarget {
    fn request(&self, message: &str, format: MessageFormat) -> OutboundRequest {
        let mut request = match self.template.render(message, format) {
            RenderedPayload::Json(payload) => OutboundRequest::json(self.url.as_str(), &payload),
            RenderedPayload::Raw(bytes) => OutboundRequest::raw(self.url.as_str(), bytes),
        };
        for (name, value) in &self.headers {
            request = request.with_header(name.as_str(), value.as_str());
        }
        if let Some(secret) = &self.secret {
            let signature = sign_payload(&request.body, secret);
            request = request.with_header(SIGNATURE_HEADER, format!("sha256={}", signature));
        }
        request
    }
}

/// A configured notification destination: one platform, one output format,
/// and every recipient it fans out to.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub platform: Platform,
    pub enabled: bool,
    pub format: MessageFormat,
    pub targets: Vec<Target>,
}

impl Channel {
    pub fn new(platform: Platform, targets: Vec<Target>) -> Self {
        Self {
            platform,
            enabled: true,
            format: platform.default_format(),
            targets,
        }
    }

    pub fn with_format(mut self, format: MessageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn requests(&self, message: &str) -> Vec<OutboundRequest> {
        self.targets
            .iter()
            .map(|t| t.request(message, self.format))
            .collect()
    }
}

fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Webhook tokens may be given as the path suffix or as a full URL.
fn webhook_url(base: &str, token: &str) -> String {
    if token.starts_with("http://") || token.starts_with("https://") {
        token.to_string()
    } else {
        format!("{}/{}", base, token.trim_start_matches('/'))
    }
}

fn sign_payload(body: &[u8], secret: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
