use async_trait::async_trait;
use metrics::counter;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::AuditLog;
use crate::config::Endpoint;
use crate::engine::Engine;
use crate::error::ClassifyError;
use crate::extract::{extract_object, validate};
use crate::prompt::{MAX_TOKENS, TEMPERATURE, build_messages};
use crate::types::{
    ChatCompletionRequest, ChatCompletionResponse, ClassificationRequest, ClassificationResult,
    Classified,
};

/// Classifies text with a single call to an OpenAI-compatible completion API.
pub struct RelayEngine {
    client: reqwest::Client,
    endpoint: Endpoint,
    timeout: Duration,
    audit: Arc<AuditLog>,
}

impl RelayEngine {
    pub fn new(
        endpoint: Endpoint,
        timeout: Duration,
        audit: Arc<AuditLog>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint,
            timeout,
            audit,
        })
    }

    async fn request_classification(
        &self,
        request: &ClassificationRequest,
    ) -> ClassificationResult {
        let messages = build_messages(&request.text);
        let body = ChatCompletionRequest {
            model: &self.endpoint.model,
            messages: &messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        let mut builder = self
            .client
            .post(&self.endpoint.url)
            .bearer_auth(request.api_key.expose())
            .timeout(self.timeout)
            .json(&body);
        if let Some(title) = &self.endpoint.title {
            builder = builder.header("X-Title", title);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        tracing::debug!(status = %status, "Completion API responded");

        match status {
            StatusCode::UNAUTHORIZED => return Err(ClassifyError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => return Err(ClassifyError::RateLimited),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                let detail = match upstream_message(&body) {
                    Some(message) => format!("{status}: {message}"),
                    None => status.to_string(),
                };
                return Err(ClassifyError::Request(detail));
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        let envelope: ChatCompletionResponse = serde_json::from_str(&body).map_err(|_| {
            ClassifyError::InvalidEnvelope("response body is not a completion object".to_string())
        })?;
        let content = envelope.first_content().ok_or_else(|| {
            ClassifyError::InvalidEnvelope("no message content in choices".to_string())
        })?;
        tracing::debug!(content = %content, "Model content received");

        let classification = validate(extract_object(content)?)?;
        Ok(Classified {
            classification,
            usage: envelope.usage(),
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> ClassifyError {
        if err.is_timeout() {
            ClassifyError::Timeout(self.timeout)
        } else {
            ClassifyError::Request(err.without_url().to_string())
        }
    }
}

/// `error.message` (or a top-level `message`) from an upstream error body.
fn upstream_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json["error"]["message"]
        .as_str()
        .or_else(|| json["message"].as_str())
        .map(str::to_string)
}

#[async_trait]
impl Engine for RelayEngine {
    #[tracing::instrument(
        skip(self, request),
        fields(text_len = request.text.len(), model = %self.endpoint.model)
    )]
    async fn classify(&self, request: ClassificationRequest) -> ClassificationResult {
        counter!("ddc_upstream_requests_total").increment(1);

        let result = self.request_classification(&request).await;
        match &result {
            Ok(classified) => {
                tracing::info!(
                    ddc_number = %classified.classification.ddc_number,
                    total_tokens = classified.usage.total_tokens,
                    "Classification succeeded"
                );
                self.audit
                    .record_classification(&request.text, &classified.classification.ddc_number)
                    .await;
            }
            Err(e) => {
                counter!("ddc_classification_failures_total", "kind" => e.kind()).increment(1);
                tracing::warn!(error = %e, "Classification failed");
                self.audit.record_error(&e.to_string()).await;
            }
        }
        result
    }
}
