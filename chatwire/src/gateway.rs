//! The gateway: configured backends behind one entry point.
//!
//! [`GatewayConfig`] lists which backends are enabled and how their request
//! queues are shared; [`Gateway`] builds them into a registry and routes
//! calls by provider name.

use chatwire_core::{
    Conversation, ConversationSummary, GatewayError, GatewayResult, ModelInfo, SendRequest,
};
use chatwire_providers::{
    Backend, Provider, ProviderConfig, ProviderError, ProviderId, ProviderRegistry, RequestQueue,
};
use chatwire_streaming::{ChatStream, StreamCallbacks};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Environment variable selecting the [`QueueScope`].
pub const QUEUE_SCOPE_ENV: &str = "CHATWIRE_QUEUE_SCOPE";

// ============================================================================
// Configuration
// ============================================================================

/// How request queues are shared between backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueScope {
    /// Every backend gets its own queue.
    #[default]
    PerProvider,
    /// Backends on the same host share one queue.
    PerHost,
}

impl FromStr for QueueScope {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "provider" | "per_provider" | "per-provider" => Ok(QueueScope::PerProvider),
            "host" | "per_host" | "per-host" => Ok(QueueScope::PerHost),
            other => Err(ProviderError::InvalidConfig(format!(
                "{QUEUE_SCOPE_ENV} must be `provider` or `host`, got `{other}`"
            ))),
        }
    }
}

/// Which backends to enable, and how.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Enabled backends.
    #[serde(default)]
    pub providers: BTreeMap<ProviderId, ProviderConfig>,
    /// Queue sharing.
    #[serde(default)]
    pub queue_scope: QueueScope,
}

impl GatewayConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable a backend.
    #[must_use]
    pub fn with_provider(mut self, id: ProviderId, config: ProviderConfig) -> Self {
        self.providers.insert(id, config);
        self
    }

    /// Set queue sharing.
    #[must_use]
    pub fn with_queue_scope(mut self, scope: QueueScope) -> Self {
        self.queue_scope = scope;
        self
    }

    /// Load from environment variables.
    ///
    /// A backend is enabled when any of its `{PREFIX}_*` variables is set
    /// (see [`ProviderId::env_prefix`]). An unrecognised
    /// `CHATWIRE_QUEUE_SCOPE` keeps the per-provider default.
    pub fn from_env() -> Self {
        let providers = ProviderId::ALL
            .into_iter()
            .map(|id| (id, ProviderConfig::from_env(id.env_prefix())))
            .filter(|(_, config)| !config.is_empty())
            .collect();
        let queue_scope = std::env::var(QUEUE_SCOPE_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        Self {
            providers,
            queue_scope,
        }
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Routes chat calls to configured backends.
#[derive(Debug, Default)]
pub struct Gateway {
    registry: ProviderRegistry,
}

impl Gateway {
    /// Build every backend in `config`.
    ///
    /// Fails if a backend is misconfigured (for example a self-hosted backend
    /// without a base URL).
    pub fn new(config: &GatewayConfig) -> Result<Self, ProviderError> {
        let registry = ProviderRegistry::new();
        let mut host_queues: HashMap<String, RequestQueue> = HashMap::new();

        for (&id, provider_config) in &config.providers {
            let queue = match config.queue_scope {
                QueueScope::PerProvider => RequestQueue::new(provider_config.min_interval()),
                QueueScope::PerHost => {
                    let base_url =
                        provider_config.resolve_base_url(id.default_base_url(), id.env_prefix())?;
                    let host = Url::parse(&base_url)
                        .ok()
                        .and_then(|url| url.host_str().map(str::to_string))
                        .unwrap_or(base_url);
                    host_queues
                        .entry(host)
                        .or_insert_with(|| RequestQueue::new(provider_config.min_interval()))
                        .clone()
                }
            };
            registry.register(Backend::from_config(id, provider_config, queue)?);
            debug!(provider = %id, scope = ?config.queue_scope, "Backend registered");
        }

        info!(providers = ?registry.list(), "Gateway ready");
        Ok(Self { registry })
    }

    /// Build from environment variables.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(&GatewayConfig::from_env())
    }

    /// The backend registry.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Look up a backend by name or alias.
    pub fn backend(&self, provider: &str) -> GatewayResult<Arc<Backend>> {
        Ok(self.registry.get_by_name(provider)?)
    }

    /// Start streaming a reply from `provider`.
    pub fn send(&self, provider: &str, request: SendRequest) -> GatewayResult<ChatStream> {
        self.backend(provider)?.send_message(request)
    }

    /// Start streaming a reply, picking the backend from a model string such
    /// as `"openrouter:meta-llama/llama-3-8b"` or `"gpt-4o"`.
    pub fn send_to_model(&self, model: &str, mut request: SendRequest) -> GatewayResult<ChatStream> {
        let (backend, model) = self.registry.infer_provider(model)?;
        request.model = Some(model);
        backend.send_message(request)
    }

    /// Stream a reply into `callbacks`.
    ///
    /// Exactly one of `on_done` and `on_error` is called, including when the
    /// request is rejected before any network call.
    pub async fn send_with_callbacks<C>(&self, provider: &str, request: SendRequest, callbacks: &mut C)
    where
        C: StreamCallbacks + ?Sized,
    {
        match self.send(provider, request) {
            Ok(stream) => stream.drive(callbacks).await,
            Err(e) => callbacks.on_error(&e),
        }
    }

    /// Models offered by `provider`.
    pub async fn list_models(&self, provider: &str, credential: &str) -> GatewayResult<Vec<ModelInfo>> {
        Ok(self.backend(provider)?.list_models(credential).await)
    }

    /// Conversations stored by `provider`.
    pub async fn list_conversations(
        &self,
        provider: &str,
        credential: &str,
        limit: usize,
    ) -> GatewayResult<Vec<ConversationSummary>> {
        self.backend(provider)?
            .list_conversations(credential, limit)
            .await
    }

    /// One stored conversation.
    pub async fn get_conversation(
        &self,
        provider: &str,
        credential: &str,
        id: &str,
    ) -> GatewayResult<Conversation> {
        if id.trim().is_empty() {
            return Err(GatewayError::invalid_request("conversation id must not be empty"));
        }
        self.backend(provider)?.get_conversation(credential, id).await
    }
}
