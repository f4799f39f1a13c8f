//! Model catalog fetching and normalization.
//!
//! Backends describe their models in different shapes (REST lists, GraphQL
//! results, bare strings). Everything is normalized into [`ModelInfo`]; any
//! failure returns the backend's static fallback instead.

use crate::registry::ProviderId;
use chatwire_core::{GatewayError, GatewayResult, ModelInfo};
use reqwest::RequestBuilder;
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, warn};

/// Await `fetch`, falling back to `fallback()` on error or an empty result.
pub async fn fetch_or_fallback<Fut, F>(provider: ProviderId, fetch: Fut, fallback: F) -> Vec<ModelInfo>
where
    Fut: Future<Output = GatewayResult<Vec<ModelInfo>>>,
    F: FnOnce() -> Vec<ModelInfo>,
{
    match fetch.await {
        Ok(models) if !models.is_empty() => {
            debug!(provider = %provider, count = models.len(), "Fetched model catalog");
            models
        }
        Ok(_) => {
            warn!(provider = %provider, "Model catalog empty, using fallback");
            fallback()
        }
        Err(e) => {
            warn!(provider = %provider, error = %e, "Model catalog fetch failed, using fallback");
            fallback()
        }
    }
}

/// Send `request` and normalize the JSON response.
pub async fn fetch_models(request: RequestBuilder) -> GatewayResult<Vec<ModelInfo>> {
    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::upstream(status.as_u16(), body));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| GatewayError::transport(e.to_string()))?;
    Ok(normalize_models(&body))
}

/// Normalize a catalog response.
///
/// Accepts a bare array, or one wrapped under `data`, `models`, `items` or
/// GraphQL's `data.models`. Duplicate ids are dropped (first wins).
#[must_use]
pub fn normalize_models(body: &Value) -> Vec<ModelInfo> {
    let Some(entries) = model_array(body) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    entries
        .iter()
        .filter_map(normalize_model)
        .filter(|model| seen.insert(model.id.clone()))
        .collect()
}

fn model_array(body: &Value) -> Option<&Vec<Value>> {
    if let Some(array) = body.as_array() {
        return Some(array);
    }
    ["/data", "/models", "/items", "/data/models", "/data/availableModels"]
        .iter()
        .find_map(|pointer| body.pointer(pointer).and_then(Value::as_array))
}

fn normalize_model(entry: &Value) -> Option<ModelInfo> {
    if let Some(id) = entry.as_str() {
        return (!id.is_empty()).then(|| ModelInfo::new(id));
    }

    let id = ["id", "model", "name"]
        .iter()
        .find_map(|key| entry.get(key).and_then(Value::as_str))
        .filter(|id| !id.is_empty())?;

    let mut model = ModelInfo::new(id);
    if let Some(name) = ["name", "display_name", "displayName"]
        .iter()
        .find_map(|key| entry.get(key).and_then(Value::as_str))
        .filter(|name| !name.is_empty())
    {
        model = model.with_name(name);
    }
    if let Some(tokens) = ["context_length", "contextLength", "context_window"]
        .iter()
        .find_map(|key| entry.get(key).and_then(Value::as_u64))
    {
        model = model.with_context_length(tokens);
    }
    if supports_reasoning(entry) {
        model = model.thinking();
    }
    Some(model)
}

fn supports_reasoning(entry: &Value) -> bool {
    let flag = |value: Option<&Value>| value.and_then(Value::as_bool).unwrap_or(false);

    flag(entry.get("reasoning"))
        || flag(entry.get("thinking"))
        || flag(entry.get("isThinking"))
        || flag(entry.pointer("/capabilities/reasoning"))
        || entry
            .get("supported_parameters")
            .and_then(Value::as_array)
            .is_some_and(|params| params.iter().any(|p| p.as_str() == Some("reasoning")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fallback() -> Vec<ModelInfo> {
        vec![ModelInfo::new("static-model")]
    }

    #[test]
    fn test_normalize_rest_list() {
        let body = json!({
            "data": [
                {"id": "gpt-4o", "context_length": 128000},
                {"id": "o3-mini", "name": "o3 mini", "supported_parameters": ["tools", "reasoning"]},
                {"id": "gpt-4o", "name": "duplicate"}
            ]
        });
        assert_eq!(
            normalize_models(&body),
            vec![
                ModelInfo::new("gpt-4o").with_context_length(128000),
                ModelInfo::new("o3-mini").with_name("o3 mini").thinking(),
            ]
        );
    }

    #[test]
    fn test_normalize_graphql_and_strings() {
        let body = json!({
            "data": {"models": [
                {"id": "m-1", "displayName": "Model One", "contextLength": 32000, "capabilities": {"reasoning": true}},
                {"name": "m-2"}
            ]}
        });
        assert_eq!(
            normalize_models(&body),
            vec![
                ModelInfo::new("m-1")
                    .with_name("Model One")
                    .with_context_length(32000)
                    .thinking(),
                ModelInfo::new("m-2"),
            ]
        );

        let body = json!(["a", "", "b"]);
        assert_eq!(
            normalize_models(&body),
            vec![ModelInfo::new("a"), ModelInfo::new("b")]
        );
    }

    #[test]
    fn test_normalize_absent_data() {
        assert!(normalize_models(&json!({"error": "nope"})).is_empty());
        assert!(normalize_models(&json!({"data": null})).is_empty());
    }

    #[tokio::test]
    async fn test_fallback_on_error() {
        let models = fetch_or_fallback(
            ProviderId::OpenAi,
            async { Err::<Vec<ModelInfo>, _>(GatewayError::transport("connection refused")) },
            fallback,
        )
        .await;
        assert_eq!(models, fallback());
    }

    #[tokio::test]
    async fn test_fallback_on_empty() {
        let models = fetch_or_fallback(ProviderId::Hub, async { Ok::<_, GatewayError>(Vec::new()) }, fallback).await;
        assert_eq!(models, fallback());

        let live = vec![ModelInfo::new("live")];
        let models = fetch_or_fallback(ProviderId::Hub, async { Ok::<_, GatewayError>(live.clone()) }, fallback).await;
        assert_eq!(models, live);
    }
}
