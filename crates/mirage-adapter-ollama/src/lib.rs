//! # mirage-adapter-ollama
//!
//! [`GenerativeBackend`] over the Ollama `/api/generate` endpoint.
//!
//! With `stream = false` the server answers with one JSON object whose
//! `response` field holds the full text. With `stream = true` it sends
//! newline-delimited JSON chunks; their `response` fields are concatenated
//! until a chunk reports `done`.

use async_trait::async_trait;
use futures::StreamExt;
use mirage_core::ShadowConfig;
use mirage_runtime::{BackendError, GenerativeBackend};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &ShadowConfig) -> Result<Self, BackendError> {
        Self::new(&config.base_url, &config.model, config.timeout())
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl GenerativeBackend for OllamaBackend {
    async fn generate(&self, prompt: &str, stream: bool) -> Result<String, BackendError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream,
        };

        tracing::debug!(model = %self.model, stream, prompt_len = prompt.len(), "Ollama request");

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if !stream {
            let chunk: GenerateChunk = response
                .json()
                .await
                .map_err(|e| BackendError::Decode(e.to_string()))?;
            return match chunk.error {
                Some(error) => Err(BackendError::Decode(error)),
                None => Ok(chunk.response),
            };
        }

        let mut accumulator = NdjsonAccumulator::default();
        let mut bytes = response.bytes_stream();
        while let Some(next) = bytes.next().await {
            let next = next.map_err(|e| BackendError::Request(e.to_string()))?;
            if accumulator.push(&next)? {
                break;
            }
        }
        accumulator.finish()
    }

    fn label(&self) -> String {
        format!("ollama/{}", self.model)
    }
}

/// Reassembles streamed `/api/generate` chunks into one text.
#[derive(Debug, Default)]
pub struct NdjsonAccumulator {
    buffer: Vec<u8>,
    text: String,
    done: bool,
}

impl NdjsonAccumulator {
    /// Feed raw bytes. Returns `true` once a chunk marked `done` was seen.
    pub fn push(&mut self, bytes: &[u8]) -> Result<bool, BackendError> {
        self.buffer.extend_from_slice(bytes);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.consume_line(&line)?;
            if self.done {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Flush a trailing line without newline and return the text.
    pub fn finish(mut self) -> Result<String, BackendError> {
        if !self.done && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.consume_line(&line)?;
        }
        Ok(self.text)
    }

    fn consume_line(&mut self, line: &[u8]) -> Result<(), BackendError> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let chunk: GenerateChunk =
            serde_json::from_str(line).map_err(|e| BackendError::Decode(e.to_string()))?;
        if let Some(error) = chunk.error {
            return Err(BackendError::Decode(error));
        }
        self.text.push_str(&chunk.response);
        self.done = chunk.done;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Json;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use serde_json::{Value, json};

    #[test]
    fn test_accumulator_joins_chunks_across_reads() {
        let mut acc = NdjsonAccumulator::default();
        assert!(!acc.push(b"{\"response\":\"[{\\\"id\\\"\",\"done\":false}\n{\"resp").unwrap());
        assert!(acc.push(b"onse\":\": 1}]\",\"done\":true}\n{\"response\":\"ignored\"}\n").unwrap());
        assert_eq!(acc.finish().unwrap(), "[{\"id\": 1}]");
    }

    #[test]
    fn test_accumulator_trailing_line_without_newline() {
        let mut acc = NdjsonAccumulator::default();
        acc.push(b"{\"response\":\"a\"}\n{\"response\":\"b\",\"done\":true}").unwrap();
        assert_eq!(acc.finish().unwrap(), "ab");
    }

    #[test]
    fn test_accumulator_error_chunk() {
        let mut acc = NdjsonAccumulator::default();
        let err = acc.push(b"{\"error\":\"model not found\"}\n").unwrap_err();
        assert!(matches!(err, BackendError::Decode(msg) if msg == "model not found"));
    }

    async fn generate_handler(Json(body): Json<Value>) -> impl IntoResponse {
        if body["model"] == "missing" {
            return (StatusCode::NOT_FOUND, "model not found".to_string()).into_response();
        }
        if body["stream"] == true {
            let ndjson = "{\"response\":\"[1,\",\"done\":false}\n{\"response\":\"2]\",\"done\":true}\n";
            return ndjson.to_string().into_response();
        }
        Json(json!({
            "model": body["model"],
            "response": format!("echo: {}", body["prompt"].as_str().unwrap_or_default()),
            "done": true
        }))
        .into_response()
    }

    async fn spawn_server() -> String {
        let app = Router::new().route("/api/generate", post(generate_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_generate_complete_response() {
        let base = spawn_server().await;
        let backend = OllamaBackend::new(base, "llama3", Duration::from_secs(5)).unwrap();
        assert_eq!(backend.label(), "ollama/llama3");

        let text = backend.generate("hello", false).await.unwrap();
        assert_eq!(text, "echo: hello");
    }

    #[tokio::test]
    async fn test_generate_streamed_response() {
        let base = spawn_server().await;
        let backend = OllamaBackend::new(base, "llama3", Duration::from_secs(5)).unwrap();

        let text = backend.generate("hello", true).await.unwrap();
        assert_eq!(text, "[1,2]");
    }

    #[tokio::test]
    async fn test_generate_http_error() {
        let base = spawn_server().await;
        let backend = OllamaBackend::new(base, "missing", Duration::from_secs(5)).unwrap();

        let err = backend.generate("hello", false).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 404, .. }));
    }
}
