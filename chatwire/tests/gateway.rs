//! End-to-end gateway scenarios against mock backends.

use chatwire::prelude::*;
use chatwire::core::Metadata;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default)]
struct Recorder {
    content: Vec<String>,
    thinking: Vec<String>,
    metadata: Vec<Metadata>,
    done: usize,
    errors: Vec<GatewayError>,
}

impl StreamCallbacks for Recorder {
    fn on_content(&mut self, text: &str) {
        self.content.push(text.to_string());
    }

    fn on_thinking(&mut self, text: &str) {
        self.thinking.push(text.to_string());
    }

    fn on_metadata(&mut self, metadata: &Metadata) {
        self.metadata.push(metadata.clone());
    }

    fn on_done(&mut self) {
        self.done += 1;
    }

    fn on_error(&mut self, error: &GatewayError) {
        self.errors.push(error.clone());
    }
}

fn openai_gateway(server: &MockServer) -> Gateway {
    let config = GatewayConfig::new().with_provider(
        ProviderId::OpenAi,
        ProviderConfig::new()
            .with_base_url(server.uri())
            .with_min_interval(Duration::from_millis(10)),
    );
    Gateway::new(&config).unwrap()
}

fn hello() -> SendRequest {
    SendRequest::new("sk-test", vec![Message::user("Say hello")])
}

#[tokio::test]
async fn test_sse_reply_reaches_callbacks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n\n",
            "data: [DONE]\n\n",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = openai_gateway(&server);
    let mut recorder = Recorder::default();
    gateway.send_with_callbacks("openai", hello(), &mut recorder).await;

    assert_eq!(recorder.content, vec!["He", "llo"]);
    assert!(recorder.thinking.is_empty());
    assert!(recorder.metadata.is_empty());
    assert_eq!(recorder.done, 1);
    assert!(recorder.errors.is_empty());
}

#[tokio::test]
async fn test_upstream_error_fires_only_on_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = openai_gateway(&server);
    let mut recorder = Recorder::default();
    gateway.send_with_callbacks("gpt", hello(), &mut recorder).await;

    assert!(recorder.content.is_empty());
    assert_eq!(recorder.done, 0);
    assert_eq!(
        recorder.errors,
        vec![GatewayError::Upstream {
            status: 500,
            body: "internal error".into()
        }]
    );
}

#[tokio::test]
async fn test_rejected_request_fires_on_error_once() {
    let server = MockServer::start().await;
    let gateway = openai_gateway(&server);

    let mut recorder = Recorder::default();
    let empty = SendRequest::new("sk-test", Vec::new());
    gateway.send_with_callbacks("openai", empty, &mut recorder).await;
    assert_eq!(recorder.errors.len(), 1);
    assert!(matches!(recorder.errors[0], GatewayError::InvalidRequest(_)));

    let mut recorder = Recorder::default();
    gateway.send_with_callbacks("groq", hello(), &mut recorder).await;
    assert_eq!(recorder.errors.len(), 1);
    assert_eq!(recorder.done, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_model_string_routing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(wiremock::matchers::body_partial_json(json!({"model": "gpt-4.1-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\ndata: [DONE]\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = openai_gateway(&server);
    let text = gateway
        .send_to_model("openai:gpt-4.1-mini", hello())
        .unwrap()
        .collect_text()
        .await
        .unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_queue_spaces_concurrent_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data: [DONE]\n\n"))
        .expect(3)
        .mount(&server)
        .await;

    let config = GatewayConfig::new().with_provider(
        ProviderId::OpenAi,
        ProviderConfig::new()
            .with_base_url(server.uri())
            .with_min_interval(Duration::from_millis(100)),
    );
    let gateway = Gateway::new(&config).unwrap();

    let started = Instant::now();
    let streams: Vec<ChatStream> = (0..3)
        .map(|_| gateway.send("openai", hello()).unwrap())
        .collect();
    for stream in streams {
        let events: Vec<ChatEvent> = stream.collect().await;
        assert_eq!(events, vec![ChatEvent::Done]);
    }

    // Three dispatches need at least two full intervals between them.
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_dropping_stream_cancels_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("data: [DONE]\n\n")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let gateway = openai_gateway(&server);
    let stream = gateway.send("openai", hello()).unwrap();
    let token = stream.cancellation_token().clone();
    drop(stream);
    assert!(token.is_cancelled());
}
