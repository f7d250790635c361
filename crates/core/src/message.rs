//! Message domain types sent to the generation service.
//!
//! A request is a short list of messages: the instruction block as a system
//! message and the inbound feed content as a user message. User messages may
//! carry an image part for the vision path.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person on the other side of the feed
    User,
    /// The generated reply
    Assistant,
    /// Instructions for the generator
    System,
}

/// Extra, non-text content attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// An image, carried as a `data:` URL or a remote URL.
    ImageUrl { url: String },
}

impl ContentPart {
    /// Encode raw image bytes as an inline `data:` URL part.
    pub fn image_bytes(bytes: &[u8]) -> Self {
        let mime = sniff_image_mime(bytes);
        Self::ImageUrl {
            url: format!("data:{mime};base64,{}", BASE64.encode(bytes)),
        }
    }
}

/// A single message in a generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Images attached to this message (vision requests only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<ContentPart>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            parts: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Attach an extra content part.
    pub fn with_part(mut self, part: ContentPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn has_image(&self) -> bool {
        !self.parts.is_empty()
    }
}

/// Best-effort MIME type from magic bytes; defaults to JPEG.
fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello!");
        assert!(!msg.has_image());
    }

    #[test]
    fn image_part_is_a_data_url() {
        let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a];
        let msg = Message::user("what is this?").with_part(ContentPart::image_bytes(&png));
        assert!(msg.has_image());
        let ContentPart::ImageUrl { url } = &msg.parts[0];
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn unknown_bytes_default_to_jpeg() {
        assert_eq!(sniff_image_mime(&[0xff, 0xd8, 0xff]), "image/jpeg");
        assert_eq!(sniff_image_mime(b"GIF89a"), "image/gif");
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::system("Be brief");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::System);
        assert_eq!(back.content, "Be brief");
    }
}
