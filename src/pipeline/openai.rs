//! OpenAI-compatible chat-completions backend over HTTP.
//!
//! The wire types below mirror the provider's JSON with every field optional.
//! [`normalise`] turns them into a [`ChatResponse`] in one step: the first
//! choice's content (if any) and usage counters with absent values set to 0.
//! Nothing downstream ever sees an optional counter.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::output::TokenUsage;
use crate::pipeline::llm::{ChatBackend, ChatRequest, ChatResponse};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw completion body.
#[derive(Debug, Default, Deserialize)]
pub struct WireCompletion {
    #[serde(default)]
    pub choices: Vec<WireChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireChoice {
    #[serde(default)]
    pub message: Option<WireMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: Option<String>,
}

impl TokenUsage {
    /// Normalise provider usage: absent block or absent counter → 0.
    pub fn from_wire(usage: Option<&WireUsage>) -> Self {
        let Some(u) = usage else {
            return Self::default();
        };
        Self {
            prompt_tokens: u.prompt_tokens.unwrap_or(0),
            completion_tokens: u.completion_tokens.unwrap_or(0),
            total_tokens: u.total_tokens.unwrap_or(0),
        }
    }
}

/// Convert a decoded body into the backend-neutral response.
pub fn normalise(body: WireCompletion) -> ChatResponse {
    let usage = TokenUsage::from_wire(body.usage.as_ref());
    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);
    ChatResponse { content, usage }
}

/// Map a non-success status and its body to an error.
///
/// The provider's `error.message` is preferred; the raw body is the fallback.
pub fn status_error(status: u16, body: &str) -> AgentError {
    let message = serde_json::from_str::<WireErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| body.trim().to_string());
    match status {
        401 | 403 => AgentError::AuthFailed { status, message },
        _ => AgentError::ApiError { status, message },
    }
}

/// HTTP backend for `POST {base_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: AgentConfig,
}

impl OpenAiBackend {
    /// Create a backend. The API key is not checked here; a missing key is
    /// reported by the first call.
    pub fn new(config: &AgentConfig) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| AgentError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let api_key = self.config.resolve_api_key()?;
        let url = self.config.completions_url();
        debug!("POST {} (model {})", url, request.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!("Provider returned HTTP {}", status);
            return Err(status_error(status.as_u16(), &body));
        }

        let wire: WireCompletion = serde_json::from_str(&body)
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))?;
        Ok(normalise(wire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::ChatMessage;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn parse(json: &str) -> ChatResponse {
        normalise(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn full_response() {
        let r = parse(
            r#"{"choices":[{"message":{"role":"assistant","content":"Hola"}}],
                "usage":{"prompt_tokens":12,"completion_tokens":3,"total_tokens":15}}"#,
        );
        assert_eq!(r.content.as_deref(), Some("Hola"));
        assert_eq!(
            r.usage,
            TokenUsage {
                prompt_tokens: 12,
                completion_tokens: 3,
                total_tokens: 15
            }
        );
    }

    #[test]
    fn missing_usage_is_zero() {
        let r = parse(r#"{"choices":[{"message":{"content":"ok"}}]}"#);
        assert_eq!(r.usage, TokenUsage::default());
    }

    #[test]
    fn partial_usage_keeps_present_counters() {
        let r = parse(r#"{"choices":[],"usage":{"prompt_tokens":7}}"#);
        assert_eq!(r.usage.prompt_tokens, 7);
        assert_eq!(r.usage.completion_tokens, 0);
        assert_eq!(r.usage.total_tokens, 0);
    }

    #[test]
    fn null_content_and_no_choices() {
        assert_eq!(parse(r#"{"choices":[{"message":{"content":null}}]}"#).content, None);
        assert_eq!(parse(r#"{"choices":[]}"#).content, None);
        assert_eq!(parse(r#"{}"#).content, None);
    }

    #[test]
    fn status_401_is_auth_failure_with_provider_message() {
        let e = status_error(
            401,
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
        );
        match e {
            AgentError::AuthFailed { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_status_falls_back_to_body() {
        let e = status_error(502, "  Bad Gateway ");
        assert!(matches!(e, AgentError::ApiError { status: 502, .. }));
        assert_eq!(e.to_string(), "Bad Gateway");
    }

    #[tokio::test]
    async fn missing_key_reported_at_call_time() {
        // Point at an unroutable address; the key check fails first.
        let config = AgentConfig::builder()
            .base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        let backend = OpenAiBackend::new(&config).unwrap();
        if std::env::var(crate::config::API_KEY_ENV).is_ok() {
            return;
        }
        let req = ChatRequest {
            model: "gpt-4o".into(),
            messages: vec![],
            temperature: 0.7,
        };
        let err = backend.chat(&req).await.unwrap_err();
        assert!(matches!(err, AgentError::MissingApiKey));
    }

    // ── Over the wire ────────────────────────────────────────────────────

    /// Answer a single HTTP request on a local port. Yields the base URL and
    /// a handle resolving to the raw request text.
    async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&raw) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}/v1"), handle)
    }

    /// Headers received and `Content-Length` bytes of body after them.
    fn request_complete(raw: &[u8]) -> bool {
        let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&raw[..end]);
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= end + 4 + length
    }

    fn backend_for(base_url: &str) -> OpenAiBackend {
        let config = AgentConfig::builder()
            .base_url(base_url)
            .api_key("sk-test")
            .build()
            .unwrap();
        OpenAiBackend::new(&config).unwrap()
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o".into(),
            messages: vec![ChatMessage::system("Resume"), ChatMessage::user("texto")],
            temperature: 0.5,
        }
    }

    #[tokio::test]
    async fn posts_json_with_bearer_and_normalises_answer() {
        let (url, server) = serve_once(
            200,
            r#"{"choices":[{"message":{"content":"Hola"}}],"usage":{"prompt_tokens":9}}"#,
        )
        .await;

        let response = backend_for(&url).chat(&request()).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("Hola"));
        assert_eq!(
            response.usage,
            TokenUsage {
                prompt_tokens: 9,
                completion_tokens: 0,
                total_tokens: 0
            }
        );

        let raw = server.await.unwrap();
        let (head, body) = raw.split_once("\r\n\r\n").unwrap();
        let head = head.to_ascii_lowercase();
        assert!(head.starts_with("post /v1/chat/completions "));
        assert!(head.contains("authorization: bearer sk-test"));
        assert!(head.contains("content-type: application/json"));

        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["temperature"], 0.5);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "Resume");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "texto");
    }

    #[tokio::test]
    async fn unauthorised_status_maps_to_auth_failure() {
        let (url, server) = serve_once(
            401,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        )
        .await;
        let err = backend_for(&url).chat(&request()).await.unwrap_err();
        server.await.unwrap();
        match err {
            AgentError::AuthFailed { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_keeps_status_and_body() {
        let (url, server) = serve_once(500, "upstream exploded").await;
        let err = backend_for(&url).chat(&request()).await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, AgentError::ApiError { status: 500, .. }));
        assert_eq!(err.to_string(), "upstream exploded");
    }

    #[tokio::test]
    async fn undecodable_success_body_is_invalid_response() {
        let (url, server) = serve_once(200, "<html>not json</html>").await;
        let err = backend_for(&url).chat(&request()).await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
    }
}
