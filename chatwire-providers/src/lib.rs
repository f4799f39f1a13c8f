//! Backend providers for chatwire.
//!
//! This crate provides one uniform interface over several chat backends:
//!
//! - **OpenAI**, **OpenRouter**, **DeepSeek**, **Groq** - chat-completions SSE
//! - **Messages** - message-content SSE with session-token exchange
//! - **Threads** - two-phase start/append calls with a numbered patch stream
//! - **Hub** - cookie-authenticated NDJSON stream with scraped history
//! - **Archive** - read-only conversation history
//!
//! Every outbound streaming call goes through a [`RequestQueue`]: FIFO,
//! single-flight and spaced by a minimum interval.
//!
//! ## Example
//!
//! ```rust,ignore
//! use chatwire_providers::{Backend, ProviderConfig, ProviderId, ProviderRegistry, RequestQueue};
//!
//! let registry = ProviderRegistry::new();
//! let config = ProviderConfig::from_env("OPENAI");
//! let queue = RequestQueue::new(config.min_interval());
//! registry.register(Backend::from_config(ProviderId::OpenAi, &config, queue)?);
//!
//! // Infer provider from model string
//! let (backend, model) = registry.infer_provider("openai:gpt-4o-mini")?;
//! ```
//!
//! ## Model Strings
//!
//! Models can be specified with provider prefixes:
//!
//! - `openai:gpt-4o` - OpenAI
//! - `openrouter:anthropic/claude-3.5-sonnet` - OpenRouter
//! - `groq:llama-3.3-70b-versatile` - Groq
//!
//! Or models can be inferred from their names:
//!
//! - `gpt-4o` → OpenAI
//! - `deepseek-chat` → DeepSeek
//! - `meta-llama/llama-3-8b` → OpenRouter

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod backends;
pub mod catalog;
pub mod config;
pub mod credential;
pub mod history;
mod provider;
pub mod queue;
mod registry;
pub mod transport;

// Re-exports
pub use backends::{
    ArchiveProvider, Backend, ChatCompletionsProvider, HubProvider, MessagesProvider,
    ThreadsProvider,
};
pub use config::{ProviderConfig, DEFAULT_MIN_INTERVAL};
pub use credential::{Credential, CredentialResolver};
pub use provider::*;
pub use queue::{QueueError, QueueHandle, RequestQueue};
pub use registry::*;
