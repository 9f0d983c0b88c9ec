//! Diffsmith OpenAI
//!
//! [`TextSynthesizer`](diffsmith_core::TextSynthesizer) backed by an
//! OpenAI-compatible `/chat/completions` endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use diffsmith_core::LlmConfig;
//! use diffsmith_openai::OpenAiChatClient;
//!
//! let client = OpenAiChatClient::from_config(&LlmConfig::default())?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod client;
pub mod error;

pub use client::OpenAiChatClient;
pub use error::ClientError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
