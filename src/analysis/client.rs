use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Body posted to the text-generation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub metadata: Value,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Posts `request` and returns the raw response body.
    async fn generate(&self, request: &GenerateRequest, timeout: Duration)
        -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct HttpLlmClient {
    http: reqwest::Client,
    url: String,
}

impl HttpLlmClient {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate(
        &self,
        request: &GenerateRequest,
        timeout: Duration,
    ) -> anyhow::Result<String> {
        debug!(url = %self.url, model = %request.model, "llm request");
        let response = self
            .http
            .post(&self.url)
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .context("llm request")?;

        let status = response.status();
        let body = response.text().await.context("read llm body")?;
        if !status.is_success() {
            error!(%status, body = %body, "llm endpoint returned an error");
            anyhow::bail!("llm endpoint returned {status}");
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    const RAW_BODY: &str = "{\"response\": \"```json\\n{\\\"prediction\\\": \\\"Safe\\\"}\\n```\"}";

    async fn serve_stub() -> String {
        let app = Router::new()
            .route("/ok", post(|| async { RAW_BODY }))
            .route(
                "/echo",
                post(|Json(body): Json<Value>| async move {
                    body["model"].as_str().unwrap_or_default().to_string()
                }),
            )
            .route(
                "/fail",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded") }),
            )
            .route(
                "/slow",
                post(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: "nutrition-small".into(),
            prompt: "analyze".into(),
            metadata: json!({}),
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("analyze")],
            stream: false,
        }
    }

    #[tokio::test]
    async fn success_body_is_returned_verbatim() {
        let base = serve_stub().await;
        let client = HttpLlmClient::new(format!("{base}/ok")).unwrap();
        let body = client.generate(&request(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(body, RAW_BODY);
    }

    #[tokio::test]
    async fn request_is_posted_as_json() {
        let base = serve_stub().await;
        let client = HttpLlmClient::new(format!("{base}/echo")).unwrap();
        let body = client.generate(&request(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(body, "nutrition-small");
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let base = serve_stub().await;
        let client = HttpLlmClient::new(format!("{base}/fail")).unwrap();
        let err = client.generate(&request(), Duration::from_secs(5)).await.unwrap_err();
        assert!(err.to_string().contains("500"), "{err}");
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let base = serve_stub().await;
        let client = HttpLlmClient::new(format!("{base}/slow")).unwrap();
        let res = client.generate(&request(), Duration::from_millis(100)).await;
        assert!(res.is_err());
    }
}
