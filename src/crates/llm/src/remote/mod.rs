//! Remote chat completion providers.
//!
//! Any endpoint that speaks the OpenAI chat-completions contract (OpenAI,
//! DeepSeek, Qwen, vLLM, LM Studio, ...) is served by [`OpenAiClient`].

pub mod openai;

pub use openai::OpenAiClient;
