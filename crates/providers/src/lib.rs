//! Completion and search providers for TaskPilot.
//!
//! All completion backends implement the `taskpilot_core::Provider` trait;
//! search backends implement [`WebSearch`].

pub mod openai_compat;
pub mod router;
pub mod search;

pub use openai_compat::{OpenAiCompatProvider, OPENAI_BASE_URL};
pub use router::{build_provider, ServerKeys};
pub use search::{SerperSearch, WebSearch};
