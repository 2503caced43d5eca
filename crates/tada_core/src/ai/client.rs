//! HTTP chat-completion client for OpenAI-compatible and Anthropic APIs.

use crate::ai::cache::{weak_hash, ResponseCache};
use crate::ai::parse::{SseDecoder, SseEvent};
use crate::ai::{AiError, AiProvider, AiResult, ChatRequest, ChatRole};
use crate::model::settings::{AiProviderKind, AiSettings};
use async_trait::async_trait;
use futures::StreamExt;
use log::{info, warn};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Cap on error bodies carried inside `AiError::Status`.
const ERROR_BODY_LIMIT: usize = 500;

pub struct HttpAiClient {
    http: reqwest::Client,
    settings: AiSettings,
    cache: ResponseCache,
}

impl HttpAiClient {
    pub fn new(settings: AiSettings) -> AiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http, settings))
    }

    pub fn with_client(http: reqwest::Client, settings: AiSettings) -> Self {
        Self {
            http,
            settings,
            cache: ResponseCache::default(),
        }
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Key covering everything that changes the answer.
    fn cache_key(&self, request: &ChatRequest) -> i32 {
        let material = json!({
            "provider": self.settings.provider,
            "baseUrl": self.settings.effective_base_url(),
            "model": self.settings.effective_model(),
            "request": request,
        });
        weak_hash(&material.to_string())
    }

    fn is_anthropic(&self) -> bool {
        self.settings.provider == AiProviderKind::Anthropic
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> reqwest::RequestBuilder {
        let base_url = self.settings.effective_base_url();
        let model = self.settings.effective_model();
        let api_key = self.settings.api_key.trim();

        if self.is_anthropic() {
            let messages: Vec<Value> = request
                .messages
                .iter()
                .filter(|message| message.role != ChatRole::System)
                .map(|message| json!({ "role": message.role.as_str(), "content": message.content }))
                .collect();
            let mut body = json!({
                "model": model,
                "max_tokens": request.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
                "messages": messages,
                "stream": stream,
            });
            if let Some(system) = request.system_text() {
                body["system"] = Value::String(system);
            }
            if let Some(temperature) = request.temperature {
                body["temperature"] = json!(temperature);
            }
            self.http
                .post(format!("{base_url}/messages"))
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
        } else {
            let messages: Vec<Value> = request
                .messages
                .iter()
                .map(|message| json!({ "role": message.role.as_str(), "content": message.content }))
                .collect();
            let mut body = json!({
                "model": model,
                "messages": messages,
                "stream": stream,
            });
            if let Some(temperature) = request.temperature {
                body["temperature"] = json!(temperature);
            }
            if let Some(max_tokens) = request.max_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            let builder = self
                .http
                .post(format!("{base_url}/chat/completions"))
                .json(&body);
            if api_key.is_empty() {
                builder
            } else {
                builder.bearer_auth(api_key)
            }
        }
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> AiResult<reqwest::Response> {
        if !self.settings.is_configured() {
            return Err(AiError::NotConfigured);
        }
        let response = self.build_request(request, stream).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "event=ai_request module=ai status=error http_status={}",
                status.as_u16()
            );
            return Err(AiError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }
        Ok(response)
    }

    fn extract_text(&self, body: &Value) -> AiResult<String> {
        let text = if self.is_anthropic() {
            body["content"].as_array().map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| block["text"].as_str())
                    .collect::<String>()
            })
        } else {
            body["choices"][0]["message"]["content"]
                .as_str()
                .map(str::to_string)
        };
        text.map(|text| text.trim().to_string())
            .ok_or_else(|| AiError::InvalidResponse("no text in response".to_string()))
    }
}

#[async_trait]
impl AiProvider for HttpAiClient {
    async fn complete(&self, request: &ChatRequest) -> AiResult<String> {
        let key = self.cache_key(request);
        if let Some(cached) = self.cache.get(key) {
            info!("event=ai_complete module=ai status=ok cache=hit");
            return Ok(cached);
        }

        let started_at = Instant::now();
        let response = self.send(request, false).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|err| AiError::InvalidResponse(err.to_string()))?;
        let text = self.extract_text(&body)?;
        self.cache.insert(key, text.clone());
        info!(
            "event=ai_complete module=ai status=ok cache=miss duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(text)
    }

    async fn stream(
        &self,
        request: &ChatRequest,
        on_delta: &mut (dyn for<'d> FnMut(&'d str) + Send),
    ) -> AiResult<String> {
        let key = self.cache_key(request);
        if let Some(cached) = self.cache.get(key) {
            on_delta(&cached);
            return Ok(cached);
        }

        let started_at = Instant::now();
        let response = self.send(request, true).await?;
        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut text = String::new();

        'outer: while let Some(chunk) = bytes.next().await {
            for event in decoder.push(&chunk?) {
                match event {
                    SseEvent::Delta(delta) => {
                        on_delta(&delta);
                        text.push_str(&delta);
                    }
                    SseEvent::Done => break 'outer,
                }
            }
        }
        if let Some(SseEvent::Delta(delta)) = decoder.finish() {
            on_delta(&delta);
            text.push_str(&delta);
        }

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(AiError::InvalidResponse("empty stream".to_string()));
        }
        self.cache.insert(key, text.clone());
        info!(
            "event=ai_stream module=ai status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::HttpAiClient;
    use crate::ai::{AiError, AiProvider, ChatMessage, ChatRequest};
    use crate::model::settings::{AiProviderKind, AiSettings};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client(provider: AiProviderKind) -> HttpAiClient {
        HttpAiClient::with_client(
            reqwest::Client::new(),
            AiSettings {
                provider,
                api_key: "k".to_string(),
                ..AiSettings::default()
            },
        )
    }

    #[test]
    fn extracts_text_per_provider_shape() {
        let openai = client(AiProviderKind::OpenAi);
        let body = json!({"choices":[{"message":{"content":"  hi  "}}]});
        assert_eq!(openai.extract_text(&body).unwrap(), "hi");

        let anthropic = client(AiProviderKind::Anthropic);
        let body = json!({"content":[{"type":"text","text":"a"},{"type":"text","text":"b"}]});
        assert_eq!(anthropic.extract_text(&body).unwrap(), "ab");
        assert!(anthropic.extract_text(&json!({})).is_err());
    }

    #[tokio::test]
    async fn cached_answer_skips_network() {
        let client = client(AiProviderKind::OpenAi);
        let request = ChatRequest::new(vec![ChatMessage::user("ping")]);
        client.cache().insert(client.cache_key(&request), "pong");
        assert_eq!(client.complete(&request).await.unwrap(), "pong");
    }

    /// Answers one HTTP request with a canned `text/event-stream` body.
    async fn serve_sse_once(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_is_complete(&request) {
                let read = socket.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n{body}"
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}")
    }

    fn request_is_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn stream_forwards_deltas_and_caches_full_text() {
        let base_url = serve_sse_once(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        ))
        .await;
        let client = HttpAiClient::with_client(
            reqwest::Client::new(),
            AiSettings {
                provider: AiProviderKind::OpenAi,
                api_key: "k".to_string(),
                base_url,
                ..AiSettings::default()
            },
        );
        let request = ChatRequest::new(vec![ChatMessage::user("greet")]);

        let mut deltas = Vec::new();
        let text = client
            .stream(&request, &mut |delta: &str| deltas.push(delta.to_string()))
            .await
            .unwrap();

        assert_eq!(text, "Hello");
        assert_eq!(deltas, vec!["Hel".to_string(), "lo".to_string()]);

        // The one-shot server is gone; both paths are served from the cache.
        let mut replayed = Vec::new();
        let again = client
            .stream(&request, &mut |delta: &str| replayed.push(delta.to_string()))
            .await
            .unwrap();
        assert_eq!(again, "Hello");
        assert_eq!(replayed, vec!["Hello".to_string()]);
        assert_eq!(client.complete(&request).await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn unconfigured_provider_fails_fast() {
        let client = HttpAiClient::with_client(reqwest::Client::new(), AiSettings::default());
        let request = ChatRequest::new(vec![ChatMessage::user("ping")]);
        let err = client.complete(&request).await.unwrap_err();
        assert!(matches!(err, AiError::NotConfigured));
    }
}
