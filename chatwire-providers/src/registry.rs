//! Provider identifiers and the registry.
//!
//! The set of backends is closed: [`ProviderId`] names every one of them and
//! the registry maps ids to configured [`Backend`]s. Supports:
//! - Lookup by id, name or alias
//! - Model string inference (e.g., "openrouter:anthropic/claude-3.5-sonnet")

use crate::backends::Backend;
use crate::provider::{Provider, ProviderError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Every backend the gateway can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// OpenAI chat completions.
    OpenAi,
    /// OpenRouter chat completions.
    OpenRouter,
    /// DeepSeek chat completions.
    DeepSeek,
    /// Groq chat completions.
    Groq,
    /// Message-content SSE backend with session-token exchange.
    Messages,
    /// Two-phase threads backend with a numbered patch stream.
    Threads,
    /// Cookie-authenticated NDJSON chat hub.
    Hub,
    /// Read-only conversation archive.
    Archive,
}

impl ProviderId {
    /// All providers, in a stable order.
    pub const ALL: [ProviderId; 8] = [
        ProviderId::OpenAi,
        ProviderId::OpenRouter,
        ProviderId::DeepSeek,
        ProviderId::Groq,
        ProviderId::Messages,
        ProviderId::Threads,
        ProviderId::Hub,
        ProviderId::Archive,
    ];

    /// Canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Groq => "groq",
            ProviderId::Messages => "messages",
            ProviderId::Threads => "threads",
            ProviderId::Hub => "hub",
            ProviderId::Archive => "archive",
        }
    }

    /// Alternate names accepted by [`FromStr`].
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            ProviderId::OpenAi => &["gpt", "openai-chat"],
            ProviderId::OpenRouter => &["or", "open-router"],
            ProviderId::DeepSeek => &["deep-seek"],
            ProviderId::Groq => &[],
            ProviderId::Messages => &[],
            ProviderId::Threads => &["thread"],
            ProviderId::Hub => &["chat-hub"],
            ProviderId::Archive => &["history"],
        }
    }

    /// Prefix of the environment variables configuring this provider.
    #[must_use]
    pub const fn env_prefix(self) -> &'static str {
        match self {
            ProviderId::OpenAi => "OPENAI",
            ProviderId::OpenRouter => "OPENROUTER",
            ProviderId::DeepSeek => "DEEPSEEK",
            ProviderId::Groq => "GROQ",
            ProviderId::Messages => "CHATWIRE_MESSAGES",
            ProviderId::Threads => "CHATWIRE_THREADS",
            ProviderId::Hub => "CHATWIRE_HUB",
            ProviderId::Archive => "CHATWIRE_ARCHIVE",
        }
    }

    /// Preset origin, for backends that have a public one.
    #[must_use]
    pub const fn default_base_url(self) -> Option<&'static str> {
        match self {
            ProviderId::OpenAi => Some("https://api.openai.com/v1"),
            ProviderId::OpenRouter => Some("https://openrouter.ai/api/v1"),
            ProviderId::DeepSeek => Some("https://api.deepseek.com/v1"),
            ProviderId::Groq => Some("https://api.groq.com/openai/v1"),
            ProviderId::Messages
            | ProviderId::Threads
            | ProviderId::Hub
            | ProviderId::Archive => None,
        }
    }

    /// Whether the backend speaks the chat-completions protocol.
    #[must_use]
    pub const fn is_chat_completions(self) -> bool {
        matches!(
            self,
            ProviderId::OpenAi | ProviderId::OpenRouter | ProviderId::DeepSeek | ProviderId::Groq
        )
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str() == name || id.aliases().contains(&name.as_str()))
            .ok_or_else(|| ProviderError::UnknownProvider(s.trim().to_string()))
    }
}

/// Registry for looking up configured backends.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<ProviderId, Arc<Backend>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, replacing any previous one with the same id.
    pub fn register(&self, backend: Backend) -> Arc<Backend> {
        let backend = Arc::new(backend);
        self.providers.write().insert(backend.id(), Arc::clone(&backend));
        backend
    }

    /// Get a backend by id.
    pub fn get(&self, id: ProviderId) -> Option<Arc<Backend>> {
        self.providers.read().get(&id).cloned()
    }

    /// Get a backend by name or alias.
    pub fn get_by_name(&self, name: &str) -> Result<Arc<Backend>, ProviderError> {
        let id: ProviderId = name.parse()?;
        self.get(id)
            .ok_or_else(|| ProviderError::NotConfigured(id.to_string()))
    }

    /// Check if a backend is registered.
    pub fn contains(&self, id: ProviderId) -> bool {
        self.providers.read().contains_key(&id)
    }

    /// Registered ids, in [`ProviderId::ALL`] order.
    pub fn list(&self) -> Vec<ProviderId> {
        let providers = self.providers.read();
        let mut ids: Vec<ProviderId> = providers.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Remove a backend.
    pub fn remove(&self, id: ProviderId) -> Option<Arc<Backend>> {
        self.providers.write().remove(&id)
    }

    /// Clear all backends.
    pub fn clear(&self) {
        self.providers.write().clear();
    }

    /// Resolve a model string (e.g., "openrouter:meta-llama/llama-3-8b").
    ///
    /// Returns the backend and the model name without the prefix.
    pub fn infer_provider(&self, model: &str) -> Result<(Arc<Backend>, String), ProviderError> {
        let (id, model_name) = parse_model_string(model)?;
        let backend = self
            .get(id)
            .ok_or_else(|| ProviderError::NotConfigured(id.to_string()))?;
        Ok((backend, model_name))
    }
}

/// Split a model string into a provider id and a bare model name.
///
/// An explicit `provider:model` prefix wins. Without one, the provider is
/// inferred from the model name.
pub fn parse_model_string(model: &str) -> Result<(ProviderId, String), ProviderError> {
    let model = model.trim();
    if let Some((prefix, rest)) = model.split_once(':') {
        if let Ok(id) = prefix.parse::<ProviderId>() {
            if rest.is_empty() {
                return Err(ProviderError::InvalidModelString(model.to_string()));
            }
            return Ok((id, rest.to_string()));
        }
    }

    infer_provider_from_model_name(model)
        .map(|id| (id, model.to_string()))
        .ok_or_else(|| ProviderError::InvalidModelString(model.to_string()))
}

/// Infer provider from model name.
pub fn infer_provider_from_model_name(model: &str) -> Option<ProviderId> {
    let model_lower = model.to_lowercase();

    // Vendor-prefixed ids are OpenRouter's naming scheme.
    if model_lower.contains('/') {
        return Some(ProviderId::OpenRouter);
    }

    if model_lower.starts_with("gpt-")
        || model_lower.starts_with("o1")
        || model_lower.starts_with("o3")
        || model_lower.starts_with("o4")
    {
        return Some(ProviderId::OpenAi);
    }

    if model_lower.starts_with("deepseek") {
        return Some(ProviderId::DeepSeek);
    }

    if model_lower.starts_with("llama")
        || model_lower.starts_with("mixtral")
        || model_lower.starts_with("gemma")
    {
        return Some(ProviderId::Groq);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{ArchiveProvider, ChatCompletionsProvider};
    use crate::config::ProviderConfig;
    use crate::queue::RequestQueue;
    use rstest::rstest;
    use std::time::Duration;

    fn queue() -> RequestQueue {
        RequestQueue::new(Duration::from_millis(1))
    }

    fn openai() -> Backend {
        Backend::ChatCompletions(
            ChatCompletionsProvider::from_config(ProviderId::OpenAi, &ProviderConfig::new(), queue())
                .unwrap(),
        )
    }

    #[rstest]
    #[case("openai", ProviderId::OpenAi)]
    #[case("gpt", ProviderId::OpenAi)]
    #[case(" OpenRouter ", ProviderId::OpenRouter)]
    #[case("or", ProviderId::OpenRouter)]
    #[case("deepseek", ProviderId::DeepSeek)]
    #[case("hub", ProviderId::Hub)]
    #[case("history", ProviderId::Archive)]
    fn test_parse_provider_id(#[case] name: &str, #[case] expected: ProviderId) {
        assert_eq!(name.parse::<ProviderId>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_provider() {
        assert_eq!(
            "anthropic".parse::<ProviderId>(),
            Err(ProviderError::UnknownProvider("anthropic".into()))
        );
    }

    #[test]
    fn test_names_roundtrip() {
        for id in ProviderId::ALL {
            assert_eq!(id.as_str().parse::<ProviderId>().unwrap(), id);
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.as_str()));
        }
    }

    #[test]
    fn test_registry_register_and_get() {
        let registry = ProviderRegistry::new();
        registry.register(openai());

        assert!(registry.contains(ProviderId::OpenAi));
        assert!(registry.get(ProviderId::OpenAi).is_some());
        assert!(registry.get_by_name("gpt").is_ok());
        assert!(matches!(
            registry.get_by_name("hub"),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_registry_list_and_remove() {
        let registry = ProviderRegistry::new();
        let archive = ArchiveProvider::from_config(
            &ProviderConfig::new().with_base_url("https://archive.example.com"),
            queue(),
        )
        .unwrap();
        registry.register(Backend::Archive(archive));
        registry.register(openai());

        assert_eq!(registry.list(), vec![ProviderId::OpenAi, ProviderId::Archive]);
        assert!(registry.remove(ProviderId::OpenAi).is_some());
        assert_eq!(registry.list(), vec![ProviderId::Archive]);
        registry.clear();
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_infer_provider_explicit() {
        let registry = ProviderRegistry::new();
        registry.register(openai());

        let (provider, model) = registry.infer_provider("openai:gpt-4o").unwrap();
        assert_eq!(provider.id(), ProviderId::OpenAi);
        assert_eq!(model, "gpt-4o");

        let (provider, model) = registry.infer_provider("gpt-4o-mini").unwrap();
        assert_eq!(provider.id(), ProviderId::OpenAi);
        assert_eq!(model, "gpt-4o-mini");
    }

    #[test]
    fn test_infer_provider_not_configured() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.infer_provider("openrouter:anthropic/claude-3.5-sonnet"),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[rstest]
    #[case("openrouter:anthropic/claude-3.5-sonnet", ProviderId::OpenRouter, "anthropic/claude-3.5-sonnet")]
    #[case("or:openai/gpt-4o", ProviderId::OpenRouter, "openai/gpt-4o")]
    #[case("meta-llama/llama-3-8b-instruct", ProviderId::OpenRouter, "meta-llama/llama-3-8b-instruct")]
    #[case("gpt-4o", ProviderId::OpenAi, "gpt-4o")]
    #[case("deepseek-chat", ProviderId::DeepSeek, "deepseek-chat")]
    #[case("llama-3.3-70b-versatile", ProviderId::Groq, "llama-3.3-70b-versatile")]
    #[case("llama3:8b", ProviderId::Groq, "llama3:8b")]
    fn test_parse_model_string(
        #[case] input: &str,
        #[case] provider: ProviderId,
        #[case] model: &str,
    ) {
        assert_eq!(
            parse_model_string(input).unwrap(),
            (provider, model.to_string())
        );
    }

    #[test]
    fn test_parse_model_string_invalid() {
        assert!(matches!(
            parse_model_string("mystery-model"),
            Err(ProviderError::InvalidModelString(_))
        ));
        assert!(matches!(
            parse_model_string("openai:"),
            Err(ProviderError::InvalidModelString(_))
        ));
    }
}
