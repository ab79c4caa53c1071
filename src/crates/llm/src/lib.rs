//! Streaming client for OpenAI-compatible chat completion APIs.
//!
//! The crate exposes a small [`ChatClient`] trait that returns the full text of
//! one completion, an [`OpenAiClient`] that always talks to the upstream in
//! streaming mode and accumulates the deltas, and helpers for attaching images
//! to a request with a text-only fallback for models that cannot see them.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::{ChatClient, ChatMessage, ChatRequest, OpenAiClient, RemoteLlmConfig};
//!
//! #[tokio::main]
//! async fn main() -> llm::Result<()> {
//!     let config = RemoteLlmConfig::new("sk-...", "https://api.openai.com", "gpt-4o");
//!     let client = OpenAiClient::new(config)?;
//!
//!     let request = ChatRequest::new(vec![
//!         ChatMessage::system("You are a test engineer."),
//!         ChatMessage::user("List three boundary cases for a login form."),
//!     ])
//!     .with_temperature(0.7);
//!
//!     let text = client.chat(request).await?;
//!     println!("{text}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod multimodal;
pub mod remote;
pub mod sse;

pub use client::ChatClient;
pub use config::RemoteLlmConfig;
pub use error::{LlmError, Result};
pub use message::{ChatMessage, ChatRequest, ContentPart, ImageUrl, MessageContent, Role};
pub use multimodal::{chat_with_fallback, encode_images, is_vision_unsupported};
pub use remote::OpenAiClient;
