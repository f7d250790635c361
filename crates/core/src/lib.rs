//! # feedreply Core
//!
//! Domain types, traits, and error definitions for the feedreply chat
//! auto-responder. This crate has **no framework dependencies**: it defines
//! the domain model that the feed adapters, generation providers and the
//! reply loop implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`FeedSurface`]: the rendered chat feed and its input box
//! - [`Provider`]: the AI generation service
//!
//! Implementations live in their respective crates, so the loop can be
//! exercised end-to-end against in-memory fakes.

pub mod error;
pub mod feed;
pub mod message;
pub mod provider;
pub mod reply;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{AdapterError, DeliveryError, Error, GenerationError, Result};
pub use feed::{FeedEntry, FeedSurface, Geometry, MessageKey, SenderHint};
pub use message::{ContentPart, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use reply::{Language, ReplyResult, detect_language};
pub use session::SessionStore;
