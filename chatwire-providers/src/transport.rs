//! Shared HTTP plumbing for backends.
//!
//! [`Endpoint`] bundles what every backend needs (id, origin, client, queue).
//! [`dispatch`] sends one request through the queue and checks the status.
//! [`spawn_stream`] runs a whole streaming call in a background task and
//! hands back the caller's [`ChatStream`].

use crate::config::ProviderConfig;
use crate::provider::ProviderError;
use crate::queue::RequestQueue;
use crate::registry::ProviderId;
use chatwire_core::{GatewayError, GatewayResult, SendRequest};
use chatwire_streaming::{chat_channel, ChatStream, Dialect, EventSink, StreamSession};
use reqwest::{Client, RequestBuilder, Response};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;

/// Identity and connection settings of one backend.
#[derive(Debug, Clone)]
pub struct Endpoint {
    id: ProviderId,
    base_url: String,
    client: Client,
    queue: RequestQueue,
    api_key: Option<String>,
}

impl Endpoint {
    /// Build from configuration. Backends without a preset origin require
    /// `base_url`.
    pub fn from_config(
        id: ProviderId,
        config: &ProviderConfig,
        queue: RequestQueue,
    ) -> Result<Self, ProviderError> {
        let base_url = config.resolve_base_url(id.default_base_url(), id.env_prefix())?;
        Ok(Self {
            id,
            base_url,
            client: config.build_client(),
            queue,
            api_key: config.api_key.clone(),
        })
    }

    /// Backend id.
    #[must_use]
    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Origin, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// HTTP client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Queue outbound calls go through.
    #[must_use]
    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// The request's credential, or the configured key when it carries none.
    #[must_use]
    pub fn credential<'a>(&'a self, supplied: &'a str) -> &'a str {
        if supplied.is_empty() {
            self.api_key.as_deref().unwrap_or_default()
        } else {
            supplied
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of one resource under `collection`, with `id` percent-encoded as a
    /// single path segment.
    ///
    /// Rejects ids that would resolve to a different path (`""`, `.`, `..`).
    pub fn resource_url(&self, collection: &str, id: &str) -> GatewayResult<Url> {
        if matches!(id, "" | "." | "..") {
            return Err(GatewayError::invalid_request(format!(
                "invalid resource id: {id:?}"
            )));
        }
        let mut url = Url::parse(&self.url(collection))
            .map_err(|e| GatewayError::Configuration(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::Configuration(format!("{} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }
}

/// Cookie header value for a cookie-authenticated backend.
///
/// A credential that already looks like a cookie string is sent verbatim;
/// a bare value is sent as `{name}={value}`.
#[must_use]
pub fn cookie_header(credential: &str, name: &str) -> String {
    if credential.contains('=') {
        credential.to_string()
    } else {
        format!("{name}={credential}")
    }
}

/// Send `request` through the endpoint's queue, up to the response headers.
///
/// Non-2xx responses become [`GatewayError::Upstream`] carrying the body.
pub async fn dispatch(
    endpoint: &Endpoint,
    cancel: &CancellationToken,
    request: RequestBuilder,
) -> GatewayResult<Response> {
    let handle = endpoint
        .queue
        .submit_with_cancel(cancel.clone(), move || async move { request.send().await });

    let response = handle
        .await?
        .map_err(|e| GatewayError::transport(e.to_string()))?;

    let status = response.status();
    debug!(provider = %endpoint.id, status = %status, "Received response");

    if !status.is_success() {
        let status_code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        error!(
            provider = %endpoint.id,
            status = status_code,
            body_preview = %body.chars().take(500).collect::<String>(),
            "Upstream API error"
        );
        return Err(GatewayError::upstream(status_code, body));
    }

    Ok(response)
}

/// Run a streaming call in the background.
///
/// `open` performs the request(s) and returns the response whose body is the
/// stream; it receives a sink for events produced before the body (such as a
/// freshly created conversation id). The request's deadline and cancellation
/// token cover the whole call, queue wait included. Dropping the returned
/// stream cancels the call.
pub fn spawn_stream<D, F, Fut>(
    provider: ProviderId,
    dialect: D,
    request: &SendRequest,
    open: F,
) -> ChatStream
where
    D: Dialect + 'static,
    F: FnOnce(EventSink, CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = GatewayResult<Response>> + Send + 'static,
{
    let cancel = request
        .cancel
        .as_ref()
        .map(CancellationToken::child_token)
        .unwrap_or_default();
    let deadline = request.deadline;
    let (sink, stream) = chat_channel(cancel.clone());

    tokio::spawn(async move {
        let mut session = StreamSession::new(dialect, sink.clone());

        let call = async {
            session.begin();
            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(GatewayError::Cancelled),
                response = open(sink, cancel.clone()) => response,
            };
            match response.and_then(readable_body) {
                Ok(response) => {
                    session.run(response.bytes_stream(), &cancel).await;
                }
                Err(e) => session.fail(e),
            }
        };

        match deadline {
            Some(deadline) => {
                let outcome = tokio::time::timeout(deadline, call).await;
                if outcome.is_err() {
                    debug!(provider = %provider, ?deadline, "Request deadline elapsed");
                    session.fail(GatewayError::Timeout(deadline));
                    // Release the queue slot if the call was still in flight.
                    cancel.cancel();
                }
            }
            None => call.await,
        }
    });

    stream
}

fn readable_body(response: Response) -> GatewayResult<Response> {
    if response.content_length() == Some(0) {
        return Err(GatewayError::MissingBody);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatwire_core::{ChatEvent, Message};
    use chatwire_streaming::SseDialect;
    use futures::StreamExt;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(server: &MockServer) -> Endpoint {
        Endpoint::from_config(
            ProviderId::OpenAi,
            &ProviderConfig::new().with_base_url(server.uri()),
            RequestQueue::new(Duration::from_millis(1)),
        )
        .unwrap()
    }

    fn request() -> SendRequest {
        SendRequest::new("sk-test", vec![Message::user("hi")])
    }

    #[test]
    fn test_cookie_header() {
        assert_eq!(cookie_header("abc", "session"), "session=abc");
        assert_eq!(cookie_header("sid=1; theme=dark", "session"), "sid=1; theme=dark");
    }

    #[test]
    fn test_credential_fallback() {
        let endpoint = Endpoint::from_config(
            ProviderId::Groq,
            &ProviderConfig::new().with_api_key("gsk-configured"),
            RequestQueue::new(Duration::from_millis(1)),
        )
        .unwrap();
        assert_eq!(endpoint.credential(""), "gsk-configured");
        assert_eq!(endpoint.credential("gsk-caller"), "gsk-caller");
    }

    #[test]
    fn test_resource_url_encodes_one_segment() {
        let endpoint = Endpoint::from_config(
            ProviderId::Hub,
            &ProviderConfig::new().with_base_url("https://hub.example.com/chat/"),
            RequestQueue::new(Duration::from_millis(1)),
        )
        .unwrap();
        assert_eq!(
            endpoint.resource_url("/api/conversation", "65f0a1").unwrap().as_str(),
            "https://hub.example.com/chat/api/conversation/65f0a1"
        );
        assert_eq!(
            endpoint.resource_url("/api/conversation", "../../admin?x=1#y").unwrap().as_str(),
            "https://hub.example.com/chat/api/conversation/..%2F..%2Fadmin%3Fx=1%23y"
        );
        for id in ["", ".", ".."] {
            assert!(matches!(
                endpoint.resource_url("/api/conversation", id),
                Err(GatewayError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn test_endpoint_url() {
        let endpoint = Endpoint::from_config(
            ProviderId::Groq,
            &ProviderConfig::new(),
            RequestQueue::new(Duration::from_millis(1)),
        )
        .unwrap();
        assert_eq!(
            endpoint.url("/chat/completions"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_dispatch_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fail"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let endpoint = endpoint(&server);
        let result = dispatch(
            &endpoint,
            &CancellationToken::new(),
            endpoint.client().post(endpoint.url("/fail")),
        )
        .await;
        assert_eq!(result.unwrap_err(), GatewayError::upstream(503, "overloaded"));
    }

    #[tokio::test]
    async fn test_spawn_stream_missing_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let endpoint = endpoint(&server);
        let stream = spawn_stream(
            ProviderId::OpenAi,
            SseDialect::chat_completions(),
            &request(),
            move |_sink, cancel| async move {
                let builder = endpoint.client().post(endpoint.url("/empty"));
                dispatch(&endpoint, &cancel, builder).await
            },
        );

        let events: Vec<ChatEvent> = stream.collect().await;
        assert_eq!(events, vec![ChatEvent::Error(GatewayError::MissingBody)]);
    }

    #[tokio::test]
    async fn test_spawn_stream_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("data: [DONE]\n")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let endpoint = endpoint(&server);
        let request = request().with_deadline(Duration::from_millis(100));
        let stream = spawn_stream(
            ProviderId::OpenAi,
            SseDialect::chat_completions(),
            &request,
            move |_sink, cancel| async move {
                let builder = endpoint.client().post(endpoint.url("/slow"));
                dispatch(&endpoint, &cancel, builder).await
            },
        );

        let events: Vec<ChatEvent> = stream.collect().await;
        assert_eq!(
            events,
            vec![ChatEvent::Error(GatewayError::Timeout(Duration::from_millis(100)))]
        );
    }

    #[tokio::test]
    async fn test_spawn_stream_cancelled_by_caller() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let caller = CancellationToken::new();
        let endpoint = endpoint(&server);
        let request = request().with_cancellation(caller.clone());
        let mut stream = spawn_stream(
            ProviderId::OpenAi,
            SseDialect::chat_completions(),
            &request,
            move |_sink, cancel| async move {
                let builder = endpoint.client().post(endpoint.url("/slow"));
                dispatch(&endpoint, &cancel, builder).await
            },
        );

        caller.cancel();
        assert_eq!(
            stream.next().await,
            Some(ChatEvent::Error(GatewayError::Cancelled))
        );
        assert_eq!(stream.next().await, None);
    }
}
