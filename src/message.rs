use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outbound chat message: free text, rich attachments, or both.
///
/// Unknown keys (`icon_emoji`, `username`, thread markers, ...) are captured
/// into `extra` and travel with every fragment so platform adapters can pass
/// them through opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One rendered attachment block. Field names follow the de-facto chat
/// attachment schema; anything we don't model lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A titled key/value row inside an attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<bool>,
}

impl ChatMessage {
    /// Plain-text message with no attachments.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Size oracle: byte length of the canonical JSON form. Every chunking
    /// decision must use this and nothing else, or the size invariant breaks.
    pub fn serialized_size(&self) -> usize {
        serde_json::to_string(self).map_or(usize::MAX, |s| s.len())
    }
}

impl Attachment {
    /// True when no attribute carries content (used to drop hollow fragments).
    pub fn is_empty(&self) -> bool {
        self.fallback.is_none()
            && self.pretext.is_none()
            && self.author_name.is_none()
            && self.author_link.is_none()
            && self.author_icon.is_none()
            && self.title.is_none()
            && self.title_link.is_none()
            && self.image_url.is_none()
            && self.thumb_url.is_none()
            && self.text.as_deref().is_none_or(str::is_empty)
            && self.fields.as_deref().is_none_or(<[Field]>::is_empty)
            && self.footer.is_none()
            && self.footer_icon.is_none()
            && self.ts.is_none()
            && self.color.is_none()
            && self.extra.is_empty()
    }
}

/// Byte width of `c` once it sits inside a JSON string literal, matching
/// serde_json's escaping: quote/backslash and common control characters become
/// two-byte escapes, the remaining control characters become `\uXXXX`.
fn json_escaped_len(c: char) -> usize {
    match c {
        '"' | '\\' | '\n' | '\r' | '\t' | '\u{08}' | '\u{0c}' => 2,
        c if (c as u32) < 0x20 => 6,
        c => c.len_utf8(),
    }
}

/// Split `text` into contiguous slices whose JSON-escaped byte length each
/// stays within `budget`, never cutting inside a character. A character wider
/// than the whole budget still gets its own slice so slicing always makes
/// progress (the caller's overflow fallback catches what truly cannot fit).
pub fn slice_text(text: &str, budget: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }

    let mut slices = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for ch in text.chars() {
        let width = json_escaped_len(ch);
        if !current.is_empty() && current_len + width > budget {
            slices.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(ch);
        current_len += width;
    }
    if !current.is_empty() {
        slices.push(current);
    }
    slices
}
