//! Rendering of the semantic notification message into channel dialects.
//!
//! Messages are written with a single emphasis marker (`*bold*`) and `\n`
//! line breaks. The first line is the header, the rest is the body.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

const EMPHASIS: char = '*';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    Markdown,
    Html,
    Text,
    /// Single-asterisk emphasis passed through untouched.
    #[default]
    Raw,
}

impl MessageFormat {
    /// Parse a configured format selector. Unknown selectors fall back to `Raw`.
    pub fn parse(selector: &str) -> Self {
        match selector.trim().to_ascii_lowercase().as_str() {
            "markdown" => Self::Markdown,
            "html" => Self::Html,
            "text" => Self::Text,
            "raw" | "asterisk" | "raw-asterisk" => Self::Raw,
            other => {
                warn!(format = other, "Unknown message format, sending unformatted");
                Self::Raw
            }
        }
    }

    pub fn line_break(self) -> &'static str {
        match self {
            Self::Html => "<br>",
            _ => "\n",
        }
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Html => write!(f, "html"),
            Self::Text => write!(f, "text"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

pub fn format_message(message: &str, format: MessageFormat) -> String {
    match format {
        MessageFormat::Markdown => message.replace(EMPHASIS, "**"),
        MessageFormat::Html => to_html(message),
        MessageFormat::Text => strip_markup(message),
        MessageFormat::Raw => message.to_string(),
    }
}

pub fn strip_markup(message: &str) -> String {
    message.replace(EMPHASIS, "")
}

/// Split a semantic message into `(header, body)` at its first line break.
///
/// The header loses its emphasis markers; the body keeps them so it can be
/// formatted for the target channel afterwards.
pub fn split_message(message: &str) -> (String, String) {
    match message.split_once('\n') {
        Some((header, body)) => (strip_markup(header).trim().to_string(), body.trim().to_string()),
        None => (String::new(), message.trim().to_string()),
    }
}

fn to_html(message: &str) -> String {
    let mut out = String::with_capacity(message.len() + 16);
    for (i, fragment) in message.split(EMPHASIS).enumerate() {
        if i % 2 == 1 {
            out.push_str("<b>");
            out.push_str(fragment);
            out.push_str("</b>");
        } else {
            out.push_str(fragment);
        }
    }
    out.replace('\n', MessageFormat::Html.line_break())
}
