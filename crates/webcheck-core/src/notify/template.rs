//! Payload templates for generic webhook channels.
//!
//! A template is a JSON object mapping field names to placeholder values.
//! Each field name is resolved once, at load time, into a [`FieldRole`].

use serde_json::{Map, Value};

use crate::format::{format_message, split_message, MessageFormat};

/// Field names that receive the formatted message body.
const BODY_FIELDS: &[&str] = &["text", "content", "message", "body", "formatted_body"];
const TITLE_FIELD: &str = "title";
/// Marks a template whose message goes out as raw bytes instead of JSON.
const DATA_FIELD: &str = "data";
const EXTRAS_FIELD: &str = "extras";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldRole {
    Title,
    Body,
    RawData,
    /// Forwarded as-is; its presence also double-spaces body paragraphs.
    Extras(Value),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PayloadTemplate {
    fields: Vec<(String, FieldRole)>,
}

/// What a rendered template should be sent as.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedPayload {
    Json(Value),
    Raw(Vec<u8>),
}

impl PayloadTemplate {
    pub fn resolve(template: &Map<String, Value>) -> Self {
        let fields = template
            .iter()
            .map(|(name, value)| {
                let role = match name.as_str() {
                    TITLE_FIELD => FieldRole::Title,
                    DATA_FIELD => FieldRole::RawData,
                    EXTRAS_FIELD => FieldRole::Extras(value.clone()),
                    n if BODY_FIELDS.contains(&n) => FieldRole::Body,
                    _ => FieldRole::Literal(value.clone()),
                };
                (name.clone(), role)
            })
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[(String, FieldRole)] {
        &self.fields
    }

    pub fn is_raw(&self) -> bool {
        self.has(|r| matches!(r, FieldRole::RawData))
    }

    pub fn has_title(&self) -> bool {
        self.has(|r| matches!(r, FieldRole::Title))
    }

    pub fn has_extras(&self) -> bool {
        self.has(|r| matches!(r, FieldRole::Extras(_)))
    }

    fn has(&self, pred: impl Fn(&FieldRole) -> bool) -> bool {
        self.fields.iter().any(|(_, role)| pred(role))
    }

    pub fn render(&self, message: &str, format: MessageFormat) -> RenderedPayload {
        let (header, body) = if self.has_title() {
            split_message(message)
        } else {
            (String::new(), message.to_string())
        };

        let mut text = format_message(&body, format);
        if self.has_extras() {
            text = text.replace('\n', "\n\n");
        }

        if self.is_raw() {
            return RenderedPayload::Raw(text.into_bytes());
        }

        let mut payload = Map::new();
        for (name, role) in &self.fields {
            let value = match role {
                FieldRole::Title => Value::String(header.clone()),
                FieldRole::Body => Value::String(text.clone()),
                FieldRole::Extras(v) | FieldRole::Literal(v) => v.clone(),
                FieldRole::RawData => continue,
            };
            payload.insert(name.clone(), value);
        }
        RenderedPayload::Json(Value::Object(payload))
    }
}
