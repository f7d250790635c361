//! Generation provider implementations for feedreply.
//!
//! All providers implement the `feedreply_core::Provider` trait.
//! The router selects the correct provider based on configuration.

pub mod backend;
pub mod openai_compat;
pub mod router;

pub use backend::{SuggestBackendProvider, SuggestContext, SuggestRequest, SuggestResponse, Suggestion};
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
