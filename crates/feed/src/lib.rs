//! Feed surface implementations for feedreply.
//!
//! Each adapter renders a conversation and exposes the read / type / submit
//! primitives of `feedreply_core::FeedSurface`.
//!
//! Available feeds:
//! - **Chromium**: a chat web client driven over the DevTools protocol
//! - **Console**: interactive terminal stand-in (stdin/stdout)
//! - **Memory**: scripted in-process feed for tests and demos

pub mod chromium;
pub mod console;
pub mod memory;

pub use chromium::{ChromiumFeed, ChromiumOptions};
pub use console::ConsoleFeed;
pub use memory::MemoryFeed;
