//! Feed trait: the abstraction over a rendered chat feed.
//!
//! A feed surface is whatever shows the conversation (a browser tab, a
//! terminal, an in-memory script). The reply loop only ever asks it for a
//! snapshot of visible entries and drives its input box; it never assumes
//! any particular markup.

use std::fmt;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AdapterError;

/// Number of characters of an image reference kept verbatim in its key.
const IMAGE_REF_PREFIX_CHARS: usize = 48;

/// On-screen rectangle of a rendered entry, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One rendered message unit, re-read every cycle and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Visible text, trimmed. May be empty for image-only entries.
    #[serde(default)]
    pub text: String,

    /// Opaque locator of an attached image (URL, data URL or path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,

    /// Where the entry was drawn, when the adapter knows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Geometry>,
}

impl FeedEntry {
    /// A plain text entry.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            image_ref: None,
            position: None,
        }
    }

    /// An image entry with an optional caption.
    pub fn image(image_ref: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            text: caption.into().trim().to_string(),
            image_ref: Some(image_ref.into()),
            position: None,
        }
    }

    /// Attach the rendered position.
    pub fn with_position(mut self, position: Geometry) -> Self {
        self.position = Some(position);
        self
    }

    pub fn has_image(&self) -> bool {
        self.image_ref.is_some()
    }

    /// Neither text nor image: nothing to react to.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && !self.has_image()
    }

    /// The deduplication identity of this entry.
    pub fn key(&self) -> MessageKey {
        MessageKey::for_entry(self)
    }
}

/// Deduplication identity of a feed entry.
///
/// Text entries are keyed by their text, so the same words posted again
/// later are treated as the same message. Image entries combine a prefix of
/// the reference with a digest of the whole reference, so two different
/// images never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKey(pub String);

impl MessageKey {
    pub fn for_entry(entry: &FeedEntry) -> Self {
        match &entry.image_ref {
            None => Self(entry.text.clone()),
            Some(image_ref) => {
                let prefix: String = image_ref.chars().take(IMAGE_REF_PREFIX_CHARS).collect();
                let digest = Sha256::digest(image_ref.as_bytes());
                let short = hex::encode(&digest[..8]);
                Self(format!("[image:{prefix}#{short}]{}", entry.text))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Weak, position-derived guess about who authored an entry.
///
/// Never used to accept or ignore an entry on its own; the own-output set is
/// the authoritative self-echo guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderHint {
    LikelyPeer,
    LikelySelf,
    Unknown,
}

impl SenderHint {
    /// Chat clients draw the peer's bubbles on the left and our own on the
    /// right; `split_x` is the horizontal boundary between the two.
    pub fn from_geometry(geometry: Option<Geometry>, split_x: f64) -> Self {
        match geometry {
            Some(g) if g.width > 0.0 && g.x + g.width / 2.0 < split_x => Self::LikelyPeer,
            Some(g) if g.width > 0.0 => Self::LikelySelf,
            _ => Self::Unknown,
        }
    }
}

/// The feed/UI adapter boundary.
///
/// Implementations handle browser automation, terminals or scripted feeds.
/// All methods take `&self`; adapters synchronise internally.
#[async_trait]
pub trait FeedSurface: Send + Sync {
    /// Human-readable adapter name (e.g., "chromium", "console").
    fn name(&self) -> &str;

    /// Snapshot of the visible entries, most recent last. Must not mutate
    /// the feed.
    async fn read(&self) -> Result<Vec<FeedEntry>, AdapterError>;

    /// Empty the input box.
    async fn clear_input(&self) -> Result<(), AdapterError>;

    /// Type text into the input box.
    async fn type_input(&self, text: &str) -> Result<(), AdapterError>;

    /// Submit whatever is in the input box as one feed entry.
    async fn submit_input(&self) -> Result<(), AdapterError>;

    /// Where an entry is drawn, if the adapter can tell.
    async fn bounds(&self, entry: &FeedEntry) -> Option<Geometry> {
        entry.position
    }

    /// Raw bytes of the image attached to an entry.
    ///
    /// The default understands `data:` URLs and local file paths; adapters
    /// with an authenticated session override it for remote references.
    async fn load_image(&self, entry: &FeedEntry) -> Result<Vec<u8>, AdapterError> {
        let Some(image_ref) = entry.image_ref.as_deref() else {
            return Err(AdapterError::ImageUnavailable("entry has no image".into()));
        };

        if image_ref.starts_with("data:") {
            return decode_data_url(image_ref);
        }

        if image_ref.starts_with("http://") || image_ref.starts_with("https://") {
            return Err(AdapterError::ImageUnavailable(format!(
                "adapter '{}' cannot fetch remote images",
                self.name()
            )));
        }

        let path = image_ref.strip_prefix("file://").unwrap_or(image_ref);
        tokio::fs::read(path)
            .await
            .map_err(|e| AdapterError::ImageUnavailable(format!("{path}: {e}")))
    }
}

/// Decode a base64 `data:` URL into raw bytes.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, AdapterError> {
    let (_, payload) = url
        .split_once(";base64,")
        .ok_or_else(|| AdapterError::ImageUnavailable("data URL is not base64".into()))?;
    BASE64
        .decode(payload.trim())
        .map_err(|e| AdapterError::ImageUnavailable(format!("bad base64 payload: {e}")))
}
