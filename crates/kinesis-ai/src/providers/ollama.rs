//! Ollama chat API client

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::GenerationClient;
use crate::{
    error::{Error, Result},
    ndjson::{ChatRecord, LineDecoder},
    stream::{EventStream, StreamEvent, TextAccumulator},
    types::{EndpointConfig, GenerationOptions, Message},
};

const CHAT_PATH: &str = "/api/chat";
const TAGS_PATH: &str = "/api/tags";

/// Ollama API client
#[derive(Debug, Clone, Default)]
pub struct OllamaClient {
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client around an existing reqwest client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_request(config: &EndpointConfig, messages: &[Message]) -> ChatRequest {
        ChatRequest {
            model: config.model.clone(),
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: true,
            options: config.options.clone(),
        }
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn probe(&self, config: &EndpointConfig) -> Result<()> {
        let url = config.url(TAGS_PATH);
        tracing::debug!(%url, "probing endpoint");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::connectivity(&config.base_url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::connectivity(
                &config.base_url,
                format!("endpoint answered {}", status),
            ));
        }
        Ok(())
    }

    async fn stream_chat(
        &self,
        config: &EndpointConfig,
        messages: &[Message],
    ) -> Result<EventStream> {
        let url = config.url(CHAT_PATH);
        let request = Self::build_request(config, messages);
        tracing::debug!(%url, model = %config.model, messages = messages.len(), "opening chat stream");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::transport(&url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.to_string()
            } else {
                format!("{}: {}", status, body.trim())
            };
            return Err(Error::transport(&url, message));
        }

        Ok(Box::pin(decode_stream(response.bytes_stream(), url)))
    }

    async fn list_models(&self, config: &EndpointConfig) -> Result<Vec<String>> {
        let url = config.url(TAGS_PATH);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::connectivity(&config.base_url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::transport(
                &url,
                format!("failed to fetch models: {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(&url, e.to_string()))?;
        let tags: TagsResponse = serde_json::from_str(&body)?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

/// Turn a raw response body into completion events.
///
/// Malformed records are skipped with a warning; a failed body read ends the
/// stream with a transport error.
pub fn decode_stream<S, B, E>(body: S, url: String) -> impl futures::Stream<Item = Result<StreamEvent>> + Send
where
    S: futures::Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    stream! {
        futures::pin_mut!(body);
        let mut decoder = LineDecoder::new();
        let mut accumulated = TextAccumulator::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(Error::transport(&url, format!("error reading response body: {}", e)));
                    return;
                }
            };

            for line in decoder.push(chunk.as_ref()) {
                match decode_line(&line, &mut accumulated, &url) {
                    Ok(decoded) => {
                        for event in decoded.events {
                            yield Ok(event);
                        }
                        if decoded.done {
                            return;
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(line) = decoder.finish() {
            match decode_line(&line, &mut accumulated, &url) {
                Ok(decoded) => {
                    for event in decoded.events {
                        yield Ok(event);
                    }
                }
                Err(e) => yield Err(e),
            }
        }
    }
}

#[derive(Default)]
struct Decoded {
    events: Vec<StreamEvent>,
    done: bool,
}

fn decode_line(line: &str, accumulated: &mut TextAccumulator, url: &str) -> Result<Decoded> {
    let record = match ChatRecord::parse(line) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(error = %e, line, "skipping malformed stream record");
            return Ok(Decoded::default());
        }
    };

    if let Some(message) = &record.error {
        return Err(Error::transport(url, message.clone()));
    }

    let mut decoded = Decoded::default();
    if let Some(content) = record.content() {
        decoded.events.push(StreamEvent::Delta(accumulated.push(content)));
    }
    if record.done {
        decoded.events.push(StreamEvent::Done(record.stats));
        decoded.done = true;
    }
    Ok(decoded)
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    options: GenerationOptions,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const URL: &str = "http://localhost:11434/api/chat";

    fn record(content: &str, done: bool) -> String {
        serde_json::json!({
            "model": "llama3.2",
            "created_at": "2025-09-07T10:00:00Z",
            "message": { "role": "assistant", "content": content },
            "done": done,
        })
        .to_string()
            + "\n"
    }

    async fn collect(chunks: Vec<std::result::Result<Vec<u8>, String>>) -> Vec<Result<StreamEvent>> {
        let body = futures::stream::iter(chunks);
        decode_stream(body, URL.to_string()).collect().await
    }

    fn texts(events: &[Result<StreamEvent>]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| e.as_ref().ok())
            .filter_map(|e| e.as_delta())
            .map(|d| d.text.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_deltas_carry_cumulative_text() {
        let body = format!("{}{}{}", record("# Sp", false), record("ec", false), record("", true));
        let events = collect(vec![Ok(body.into_bytes())]).await;

        assert_eq!(texts(&events), vec!["# Sp", "# Spec"]);
        let fragments: Vec<_> = events
            .iter()
            .filter_map(|e| e.as_ref().ok())
            .filter_map(|e| e.as_delta())
            .map(|d| d.fragment.clone())
            .collect();
        assert_eq!(fragments, vec!["# Sp", "ec"]);
        assert!(matches!(events.last(), Some(Ok(StreamEvent::Done(_)))));
    }

    #[tokio::test]
    async fn test_record_split_across_reads() {
        let body = record("hello", false);
        let (a, b) = body.split_at(17);
        let events = collect(vec![Ok(a.as_bytes().to_vec()), Ok(b.as_bytes().to_vec())]).await;
        assert_eq!(texts(&events), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let body = format!("{}{{not json\n{}", record("a", false), record("b", false));
        let events = collect(vec![Ok(body.into_bytes())]).await;
        assert!(events.iter().all(|e| e.is_ok()));
        assert_eq!(texts(&events), vec!["a", "ab"]);
    }

    #[tokio::test]
    async fn test_done_ends_stream() {
        let body = format!("{}{}{}", record("a", false), record("", true), record("late", false));
        let events = collect(vec![Ok(body.into_bytes())]).await;
        assert_eq!(texts(&events), vec!["a"]);
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_connection_close_ends_stream_without_done() {
        let events = collect(vec![Ok(record("partial", false).into_bytes())]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(texts(&events), vec!["partial"]);
    }

    #[tokio::test]
    async fn test_unterminated_final_record_is_decoded() {
        let body = record("tail", false);
        let events = collect(vec![Ok(body.trim_end().as_bytes().to_vec())]).await;
        assert_eq!(texts(&events), vec!["tail"]);
    }

    #[tokio::test]
    async fn test_body_error_surfaces_as_transport_error() {
        let events = collect(vec![
            Ok(record("partial", false).into_bytes()),
            Err("connection reset".to_string()),
            Ok(record("never", false).into_bytes()),
        ])
        .await;

        assert_eq!(events.len(), 2);
        match &events[1] {
            Err(Error::Transport { url, message }) => {
                assert_eq!(url, URL);
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_in_band_error_record() {
        let body = "{\"error\":\"model 'nope' not found\"}\n".to_string();
        let events = collect(vec![Ok(body.into_bytes())]).await;
        assert!(matches!(&events[0], Err(Error::Transport { message, .. }) if message.contains("not found")));
    }

    #[test]
    fn test_request_body_shape() {
        let config = EndpointConfig::new("http://localhost:11434", "llama3.2");
        let messages = vec![Message::user("Build a CubeSat"), Message::assistant("Sure")];
        let request = OllamaClient::build_request(&config, &messages);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Sure");
        assert_eq!(json["options"]["max_tokens"], 2000);
        assert!((json["options"]["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    fn endpoint(server: &MockServer) -> EndpointConfig {
        EndpointConfig::new(server.uri(), "llama3.2")
    }

    #[tokio::test]
    async fn test_connectivity_check_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{\"models\":[]}", "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        OllamaClient::new().probe(&endpoint(&server)).await.unwrap();
    }

    #[tokio::test]
    async fn test_connectivity_check_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = OllamaClient::new().probe(&endpoint(&server)).await.unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(err.url(), Some(server.uri().as_str()));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_connectivity_check_unreachable() {
        let server = MockServer::start().await;
        let config = endpoint(&server);
        drop(server);

        let err = OllamaClient::new().probe(&config).await.unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(err.url(), Some(config.base_url.as_str()));
    }

    #[tokio::test]
    async fn test_stream_chat_posts_conversation_and_decodes_reply() {
        let server = MockServer::start().await;
        let reply = format!("{}{}{}", record("# Sp", false), record("ec", false), record("", true));
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.2",
                "stream": true,
                "messages": [{ "role": "user", "content": "Draft an SRS" }],
                "options": { "max_tokens": 2000 },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(reply, "application/x-ndjson"))
            .expect(1)
            .mount(&server)
            .await;

        let stream = OllamaClient::new()
            .stream_chat(&endpoint(&server), &[Message::user("Draft an SRS")])
            .await
            .unwrap();
        let events: Vec<_> = stream.collect().await;

        assert_eq!(texts(&events), vec!["# Sp", "# Spec"]);
        assert!(matches!(events.last(), Some(Ok(StreamEvent::Done(_)))));
    }

    #[tokio::test]
    async fn test_stream_chat_error_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model 'nope' not found"))
            .mount(&server)
            .await;

        let result = OllamaClient::new()
            .stream_chat(&endpoint(&server), &[Message::user("hi")])
            .await;
        match result {
            Err(Error::Transport { url, message }) => {
                assert_eq!(url, format!("{}/api/chat", server.uri()));
                assert!(message.starts_with("404"));
                assert!(message.ends_with(": model 'nope' not found"));
            }
            Err(other) => panic!("expected transport error, got {:?}", other),
            Ok(_) => panic!("expected transport error, got a stream"),
        }
    }

    #[tokio::test]
    async fn test_list_models_reads_tag_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                serde_json::json!({
                    "models": [
                        { "name": "llama3.2:latest", "size": 2019393189u64 },
                        { "name": "mistral:7b", "size": 4109865159u64 }
                    ]
                })
                .to_string(),
                "application/json",
            ))
            .mount(&server)
            .await;

        let models = OllamaClient::new().list_models(&endpoint(&server)).await.unwrap();
        assert_eq!(models, vec!["llama3.2:latest", "mistral:7b"]);
    }

    #[tokio::test]
    async fn test_list_models_malformed_body_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html>proxy</html>", "text/html"))
            .mount(&server)
            .await;

        let err = OllamaClient::new().list_models(&endpoint(&server)).await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn test_list_models_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = OllamaClient::new().list_models(&endpoint(&server)).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(err.to_string().contains("failed to fetch models"));
    }
}
