use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::ClassifyError;

/// Body accepted by `POST /generate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifyPayload {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub api_key: ApiKey,
}

/// Bearer credential supplied by the caller. Never printed.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    #[cfg(test)]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn trimmed(&self) -> Self {
        Self(self.0.trim().to_string())
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub text: String,
    pub api_key: ApiKey,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub ddc_number: String,
    pub description: String,
    /// Any further keys the model returned, e.g. `category`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, deserialize_with = "lenient_count")]
    pub prompt_tokens: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub completion_tokens: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_tokens: u32,
}

/// Null, negative or non-numeric counters read as zero.
fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .and_then(|count| u32::try_from(count).ok())
        .unwrap_or(0))
}

/// Successful outcome, serialized as the `data` member of the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classified {
    pub classification: Classification,
    pub usage: TokenUsage,
}

pub type ClassificationResult = Result<Classified, ClassifyError>;

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub data: Classified,
}

impl From<Classified> for SuccessResponse {
    fn from(data: Classified) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Kept raw so a malformed block cannot reject the envelope.
    #[serde(default)]
    pub usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if the envelope carries one.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
    }

    /// Token counts, zero-filled when absent or malformed.
    pub fn usage(&self) -> TokenUsage {
        self.usage
            .clone()
            .and_then(|usage| serde_json::from_value(usage).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("sk-secret-value");
        assert!(!format!("{key:?}").contains("secret"));
        assert_eq!(key.expose(), "sk-secret-value");
    }

    #[test]
    fn payload_fields_default_to_empty() {
        let payload: ClassifyPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.text.is_empty());
        assert!(payload.api_key.is_blank());
    }

    #[test]
    fn classification_flattens_extra_keys() {
        let mut extra = Map::new();
        extra.insert("category".into(), Value::from("Natural sciences"));
        let classification = Classification {
            ddc_number: "500.0".into(),
            description: "Science".into(),
            extra,
        };
        let json = serde_json::to_value(&classification).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ddc_number": "500.0",
                "description": "Science",
                "category": "Natural sciences"
            })
        );
    }

    #[test]
    fn envelope_without_usage_or_content() {
        let envelope: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{}}]}"#).unwrap();
        assert!(envelope.usage.is_none());
        assert_eq!(envelope.usage(), TokenUsage::default());
        assert!(envelope.first_content().is_none());
    }

    #[test]
    fn null_and_mistyped_counters_read_as_zero() {
        let usage: TokenUsage = serde_json::from_str(
            r#"{"prompt_tokens":10,"completion_tokens":null,"total_tokens":"ten"}"#,
        )
        .unwrap();
        assert_eq!(
            usage,
            TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 0,
                total_tokens: 0
            }
        );
    }

    #[test]
    fn malformed_usage_block_does_not_reject_envelope() {
        let envelope: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"{}"}}],"usage":"unavailable"}"#,
        )
        .unwrap();
        assert_eq!(envelope.usage(), TokenUsage::default());
        assert_eq!(envelope.first_content(), Some("{}"));
    }

    #[test]
    fn partial_usage_fills_zeroes() {
        let usage: TokenUsage = serde_json::from_str(r#"{"prompt_tokens":12}"#).unwrap();
        assert_eq!(
            usage,
            TokenUsage {
                prompt_tokens: 12,
                completion_tokens: 0,
                total_tokens: 0
            }
        );
    }
}
