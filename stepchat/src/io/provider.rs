//! Completion provider abstraction.
//!
//! The [`ChatProvider`] trait decouples the walker from the actual model
//! backend. [`HttpProvider`] talks to any OpenAI-compatible endpoint; tests use
//! scripted providers that return predetermined replies without touching the
//! network.

use std::io::{ErrorKind, Read};

use anyhow::{Context, Result, anyhow, bail};
use eventsource_stream::Eventsource;
use futures::executor::block_on_stream;
use futures::stream::{self, Stream};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::types::Turn;
use crate::io::config::ProviderConfig;

/// Abstraction over completion backends.
pub trait ChatProvider {
    /// Send the transcript and return the full reply text.
    fn complete(&self, turns: &[Turn]) -> Result<String>;
}

/// Abstraction over embedding backends.
pub trait Embedder {
    /// One vector per input, in input order.
    fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f64>>>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Payload of the event that closes an OpenAI-style completion stream.
const STREAM_DONE: &str = "[DONE]";

/// Size of each read from a streamed response body.
const STREAM_READ_CHUNK: usize = 8 * 1024;

/// Provider for OpenAI-compatible `chat/completions` and `embeddings` endpoints.
pub struct HttpProvider {
    client: Client,
    config: ProviderConfig,
    api_key: String,
}

impl HttpProvider {
    /// Build a provider, reading the bearer credential from `config.api_key_env`.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).with_context(|| {
            format!(
                "read api key from environment variable {}",
                config.api_key_env
            )
        })?;
        Self::new(config, api_key)
    }

    pub fn new(config: &ProviderConfig, api_key: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .default_headers(header_map(config)?)
            .timeout(config.request_timeout())
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
        })
    }

    /// Single non-streamed chat completion.
    #[instrument(skip_all, fields(model = %self.config.model, turns = turns.len()))]
    pub fn chat(&self, turns: &[Turn]) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: turns,
            temperature: self.config.temperature,
            stream: false,
        };
        let response: ChatResponse = self
            .post("chat/completions", &request)?
            .json()
            .context("parse chat completion response")?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("chat completion response had no choices"))?;
        let content = choice.message.content.unwrap_or_else(|| {
            warn!("chat completion choice had no content");
            String::new()
        });
        debug!(bytes = content.len(), "chat completion received");
        Ok(content)
    }

    /// Streamed chat completion. `on_chunk` sees each delta as it arrives; the
    /// joined reply is returned once the stream ends.
    #[instrument(skip_all, fields(model = %self.config.model, turns = turns.len()))]
    pub fn chat_stream(&self, turns: &[Turn], on_chunk: &mut dyn FnMut(&str)) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: turns,
            temperature: self.config.temperature,
            stream: true,
        };
        let response = self.post("chat/completions", &request)?;
        read_completion_stream(response, on_chunk)
    }

    /// Same endpoint and credentials, different chat model.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            client: self.client.clone(),
            config: ProviderConfig {
                model: model.to_string(),
                ..self.config.clone()
            },
            api_key: self.api_key.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Embed `inputs` with the configured embedding model, in input order.
    #[instrument(skip_all, fields(model = %self.config.embedding_model, inputs = inputs.len()))]
    pub fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f64>>> {
        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: inputs,
        };
        let mut response: EmbeddingResponse = self
            .post("embeddings", &request)?
            .json()
            .context("parse embeddings response")?;
        if response.data.len() != inputs.len() {
            bail!(
                "embeddings response has {} vectors for {} inputs",
                response.data.len(),
                inputs.len()
            );
        }
        response.data.sort_by_key(|data| data.index);
        Ok(response.data.into_iter().map(|data| data.embedding).collect())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = self.endpoint(path);
        info!(%url, "sending provider request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .with_context(|| format!("POST {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(%url, %status, "provider request failed");
            bail!("POST {url} returned {status}: {}", error_message(&body));
        }
        Ok(response)
    }
}

impl ChatProvider for HttpProvider {
    fn complete(&self, turns: &[Turn]) -> Result<String> {
        if self.config.stream {
            self.chat_stream(turns, &mut |_: &str| {})
        } else {
            self.chat(turns)
        }
    }
}

impl Embedder for HttpProvider {
    fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f64>>> {
        HttpProvider::embed(self, inputs)
    }
}

/// Read a server-sent completion stream, report each content delta and
/// return the joined reply. The `[DONE]` event ends the stream.
pub fn read_completion_stream<R: Read + Unpin>(
    reader: R,
    on_chunk: &mut dyn FnMut(&str),
) -> Result<String> {
    let mut reply = String::new();
    let mut chunks = 0usize;
    for event in block_on_stream(byte_chunks(reader).eventsource()) {
        let event = event.map_err(|err| anyhow!("read completion stream: {err}"))?;
        if event.data == STREAM_DONE {
            break;
        }
        let chunk: StreamChunk = serde_json::from_str(&event.data)
            .with_context(|| format!("parse stream chunk {}", event.data))?;
        if let Some(error) = chunk.error {
            bail!("completion stream error: {}", error.message);
        }
        for content in chunk.choices.into_iter().filter_map(|c| c.delta.content) {
            on_chunk(&content);
            reply.push_str(&content);
        }
        chunks += 1;
    }
    debug!(chunks, bytes = reply.len(), "completion stream finished");
    Ok(reply)
}

/// Adapt a blocking body reader into a stream of byte chunks.
fn byte_chunks<R: Read + Unpin>(
    mut reader: R,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Unpin {
    stream::iter(std::iter::from_fn(move || {
        let mut buf = vec![0u8; STREAM_READ_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return None,
                Ok(read) => {
                    buf.truncate(read);
                    return Some(Ok(buf));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }))
}

fn header_map(config: &ProviderConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name {name:?}"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid value for header {name}"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Provider error message from an OpenAI-style error body, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockApi;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn config_for(api: &MockApi) -> ProviderConfig {
        ProviderConfig {
            base_url: api.base_url(),
            model: "test-model".to_string(),
            embedding_model: "test-embed".to_string(),
            ..ProviderConfig::default()
        }
    }

    fn event_stream(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
    }

    #[test]
    fn error_message_prefers_provider_message() {
        assert_eq!(
            error_message(r#"{"error":{"message":"bad key","type":"auth"}}"#),
            "bad key"
        );
        assert_eq!(error_message(" upstream down \n"), "upstream down");
    }

    #[test]
    fn stream_reader_joins_multi_line_event_data() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":\n",
            "data: {\"content\":\"(DONE) ok\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let reply = read_completion_stream(body.as_bytes(), &mut |_: &str| {}).expect("stream");
        assert_eq!(reply, "(DONE) ok");
    }

    #[test]
    fn stream_reader_keeps_payload_whitespace_after_the_field_space() {
        let body = "data:  {\"choices\":[{\"delta\":{\"content\":\" hi\"}}]}\n\ndata: [DONE]\n\n";
        let reply = read_completion_stream(body.as_bytes(), &mut |_: &str| {}).expect("stream");
        assert_eq!(reply, " hi");
    }

    #[test]
    fn stream_reader_surfaces_error_events() {
        let body = "data: {\"error\":{\"message\":\"overloaded\"}}\n\n";
        let err = read_completion_stream(body.as_bytes(), &mut |_: &str| {}).unwrap_err();
        assert!(err.to_string().contains("overloaded"));
    }

    #[test]
    fn chat_sends_transcript_with_auth_and_custom_headers() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .and(header("authorization", "Bearer secret"))
                .and(header("x-gateway-target", "upstream"))
                .and(body_partial_json(json!({"model": "test-model"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "(IN PROGRESS) Hi"}}]
                })))
                .expect(1),
        );
        let mut config = config_for(&api);
        config
            .headers
            .insert("X-Gateway-Target".to_string(), "upstream".to_string());
        let provider = HttpProvider::new(&config, "secret").expect("provider");

        let reply = provider
            .chat(&[Turn::system("sys"), Turn::user("hello")])
            .expect("chat");
        assert_eq!(reply, "(IN PROGRESS) Hi");

        let requests = api.received_requests();
        assert_eq!(requests.len(), 1);
        let body: Value = requests[0].body_json().expect("json body");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn chat_surfaces_provider_error() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .respond_with(
                    ResponseTemplate::new(401)
                        .set_body_json(json!({"error": {"message": "invalid api key"}})),
                ),
        );
        let provider = HttpProvider::new(&config_for(&api), "bad").expect("provider");

        let err = provider.chat(&[Turn::user("hello")]).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("401"), "{message}");
        assert!(message.contains("invalid api key"), "{message}");
    }

    #[test]
    fn stream_joins_chunks_and_reports_each() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"(DONE) \"}}]}\n\n",
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let api = MockApi::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .and(body_partial_json(json!({"stream": true})))
                .respond_with(event_stream(body))
                .expect(1),
        );
        let mut config = config_for(&api);
        config.stream = true;
        let provider = HttpProvider::new(&config, "secret").expect("provider");

        let mut seen = Vec::new();
        let reply = provider
            .chat_stream(&[Turn::user("hello")], &mut |chunk: &str| {
                seen.push(chunk.to_string());
            })
            .expect("stream");
        assert_eq!(reply, "(DONE) ok");
        assert_eq!(seen, vec!["(DONE) ", "ok"]);
    }

    #[test]
    fn complete_uses_stream_when_configured() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":\n",
            "data: {\"content\":\"(DONE) ok\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let api = MockApi::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .respond_with(event_stream(body))
                .expect(1),
        );
        let mut config = config_for(&api);
        config.stream = true;
        let provider = HttpProvider::new(&config, "secret").expect("provider");

        assert_eq!(
            provider.complete(&[Turn::user("x")]).expect("complete"),
            "(DONE) ok"
        );
    }

    #[test]
    fn with_model_switches_only_the_chat_model() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .and(header("authorization", "Bearer secret"))
                .and(body_partial_json(json!({"model": "other-model"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "choices": [{"message": {"content": "hi"}}]
                })))
                .expect(1),
        );
        let provider = HttpProvider::new(&config_for(&api), "secret").expect("provider");
        let other = provider.with_model("other-model");

        assert_eq!(other.model(), "other-model");
        assert_eq!(provider.model(), "test-model");
        assert_eq!(other.complete(&[Turn::user("x")]).expect("complete"), "hi");
    }

    #[test]
    fn embed_orders_vectors_by_index() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path("/v1/embeddings"))
                .and(body_partial_json(json!({"model": "test-embed", "input": ["a", "b"]})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "data": [
                        {"index": 1, "embedding": [0.0, 1.0]},
                        {"index": 0, "embedding": [1.0, 0.0]}
                    ]
                })))
                .expect(1),
        );
        let provider = HttpProvider::new(&config_for(&api), "secret").expect("provider");

        let vectors = provider
            .embed(&["a".to_string(), "b".to_string()])
            .expect("embed");
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn embed_rejects_vector_count_mismatch() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path("/v1/embeddings"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "data": [{"index": 0, "embedding": [1.0]}]
                }))),
        );
        let provider = HttpProvider::new(&config_for(&api), "secret").expect("provider");

        let err = provider
            .embed(&["a".to_string(), "b".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("1 vectors for 2 inputs"));
    }

    #[test]
    fn missing_api_key_env_is_an_error() {
        let config = ProviderConfig {
            api_key_env: "STEPCHAT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ProviderConfig::default()
        };
        let err = HttpProvider::from_config(&config).err().expect("missing key");
        assert!(err.to_string().contains("STEPCHAT_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let mut config = ProviderConfig::default();
        config
            .headers
            .insert("bad header".to_string(), "x".to_string());
        let err = HttpProvider::new(&config, "k").err().expect("invalid header");
        assert!(err.to_string().contains("invalid header name"));
    }
}
