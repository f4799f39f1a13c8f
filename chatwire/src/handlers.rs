//! Router-agnostic handler bodies.
//!
//! Each handler takes the gateway, an [`AccountStore`] and already-extracted
//! parameters, and returns a [`HandlerResponse`] the surrounding web framework
//! turns into an HTTP response.

use crate::gateway::Gateway;
use async_trait::async_trait;
use chatwire_core::GatewayError;
use chatwire_providers::{Backend, Provider, ProviderId};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Default number of conversations listed per request.
pub const DEFAULT_SESSION_LIMIT: usize = 50;

/// Resolves the signed-in user's credential for a backend.
///
/// Implemented by the application, which owns credential storage.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Credential for `provider`, if the user has one.
    async fn credential(&self, provider: ProviderId) -> Option<String>;
}

/// Status code and JSON body of a handler result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl HandlerResponse {
    /// A 200 response.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// An error response with `{"error": message}`.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<GatewayError> for HandlerResponse {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::Unsupported { .. } => 501,
            GatewayError::Upstream { .. } | GatewayError::Transport(_) | GatewayError::MissingBody => 502,
            GatewayError::Timeout(_) => 504,
            _ => 500,
        };
        HandlerResponse::error(status, err.to_string())
    }
}

fn lookup(gateway: &Gateway, provider: &str) -> Result<(ProviderId, Arc<Backend>), HandlerResponse> {
    let id: ProviderId = provider
        .parse()
        .map_err(|e: chatwire_providers::ProviderError| HandlerResponse::error(404, e.to_string()))?;
    let backend = gateway
        .registry()
        .get(id)
        .ok_or_else(|| HandlerResponse::error(404, format!("Provider not configured: {id}")))?;
    Ok((id, backend))
}

/// List stored conversations: `{"sessions": [...]}`.
///
/// 404 for an unknown or unconfigured provider, 401 without a credential,
/// 501 when the backend keeps no history.
pub async fn list_sessions(
    gateway: &Gateway,
    accounts: &dyn AccountStore,
    provider: &str,
    limit: Option<usize>,
) -> HandlerResponse {
    let (id, backend) = match lookup(gateway, provider) {
        Ok(found) => found,
        Err(response) => return response,
    };
    let Some(credential) = accounts.credential(id).await else {
        return HandlerResponse::error(401, format!("No credential for {id}"));
    };

    let limit = limit.unwrap_or(DEFAULT_SESSION_LIMIT);
    match backend.list_conversations(&credential, limit).await {
        Ok(sessions) => HandlerResponse::ok(json!({ "sessions": sessions })),
        Err(e) => {
            warn!(provider = %id, error = %e, "Listing sessions failed");
            e.into()
        }
    }
}

/// List models: `{"models": [...]}`.
///
/// Never fails once the provider is found; a missing credential falls back to
/// the configured key or the static catalog.
pub async fn list_models(
    gateway: &Gateway,
    accounts: &dyn AccountStore,
    provider: &str,
) -> HandlerResponse {
    let (id, backend) = match lookup(gateway, provider) {
        Ok(found) => found,
        Err(response) => return response,
    };
    let credential = accounts.credential(id).await.unwrap_or_default();
    let models = backend.list_models(&credential).await;
    HandlerResponse::ok(json!({ "models": models }))
}
