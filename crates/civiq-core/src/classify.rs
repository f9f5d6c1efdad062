//! AI-assisted issue categorization
//!
//! A classifier looks at an issue's title and description and suggests a
//! category with a confidence score. The OpenAI-backed implementation is
//! strictly best-effort: any failure of the external call collapses into
//! the `{other, 0}` fallback, so enrichment can never break submission.

use crate::config::ClassifierConfig;
use crate::{Category, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A suggested category with model confidence 0-100
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub confidence: u8,
}

/// Anything that can categorize an issue from its text
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn categorize(&self, title: &str, description: &str) -> Result<Classification>;
}

const SYSTEM_PROMPT: &str = "You are a civic infrastructure issue classifier. \
Classify the reported issue into exactly one of these categories: \
roads, sanitation, electricity, water, traffic, environment, other. \
Respond with a JSON object of the form \
{\"category\": string, \"confidence\": number} where confidence is an \
integer between 0 and 100.";

/// Classifier backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiClassifier {
    /// Build a classifier from its config section and an API key.
    pub fn new(api_key: impl Into<String>, config: &ClassifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Classification(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
        })
    }

    async fn try_categorize(&self, title: &str, description: &str) -> Result<Classification> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Title: {title}\n\nDescription: {description}"),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_err)?
            .error_for_status()
            .map_err(classify_err)?;

        let completion: ChatResponse = response.json().await.map_err(classify_err)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Classification("completion had no content".to_string()))?;

        let raw: RawClassification = serde_json::from_str(&content)
            .map_err(|e| Error::Classification(format!("malformed completion payload: {e}")))?;
        Ok(Classification::from_raw(raw))
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn categorize(&self, title: &str, description: &str) -> Result<Classification> {
        Ok(self
            .try_categorize(title, description)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "classification call failed, using fallback");
                Classification {
                    category: Category::Other,
                    confidence: 0,
                }
            }))
    }
}

fn classify_err(err: reqwest::Error) -> Error {
    Error::Classification(err.to_string())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// What the model actually returned, before vocabulary enforcement
#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

impl Classification {
    /// Normalize a raw model payload into the closed vocabulary.
    ///
    /// Unknown categories become `other`; confidence is clamped into
    /// [0, 100] and defaults to 50 when the model omitted it.
    fn from_raw(raw: RawClassification) -> Self {
        let category = raw
            .category
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(Category::Other);
        let confidence = raw
            .confidence
            .map(|v| v.clamp(0.0, 100.0).round() as u8)
            .unwrap_or(50);
        Self {
            category,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_base: String) -> ClassifierConfig {
        ClassifierConfig {
            enabled: true,
            api_base,
            model: "gpt-5".to_string(),
            timeout_secs: 5,
        }
    }

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    #[test]
    fn test_from_raw_enforces_vocabulary() {
        let c = Classification::from_raw(RawClassification {
            category: Some("potholes".into()),
            confidence: Some(150.0),
        });
        assert_eq!(c.category, Category::Other);
        assert_eq!(c.confidence, 100);

        let c = Classification::from_raw(RawClassification {
            category: Some("water".into()),
            confidence: Some(-3.0),
        });
        assert_eq!(c.category, Category::Water);
        assert_eq!(c.confidence, 0);

        let c = Classification::from_raw(RawClassification {
            category: None,
            confidence: None,
        });
        assert_eq!(c.category, Category::Other);
        assert_eq!(c.confidence, 50);
    }

    #[tokio::test]
    async fn test_categorize_parses_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                r#"{"category": "roads", "confidence": 87}"#,
            )))
            .mount(&server)
            .await;

        let classifier =
            OpenAiClassifier::new("test-key", &test_config(server.uri())).unwrap();
        let result = classifier
            .categorize("Pothole on MG Road", "Large pothole near the signal")
            .await
            .unwrap();
        assert_eq!(result.category, Category::Roads);
        assert_eq!(result.confidence, 87);
    }

    #[tokio::test]
    async fn test_malformed_completion_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body("not json at all")),
            )
            .mount(&server)
            .await;

        let classifier =
            OpenAiClassifier::new("test-key", &test_config(server.uri())).unwrap();
        let result = classifier.categorize("t", "d").await.unwrap();
        assert_eq!(result.category, Category::Other);
        assert_eq!(result.confidence, 0);
    }

    #[tokio::test]
    async fn test_server_error_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let classifier =
            OpenAiClassifier::new("test-key", &test_config(server.uri())).unwrap();
        let result = classifier.categorize("t", "d").await.unwrap();
        assert_eq!(result.category, Category::Other);
        assert_eq!(result.confidence, 0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        // Nothing listens on this port.
        let classifier = OpenAiClassifier::new(
            "test-key",
            &test_config("http://127.0.0.1:9".to_string()),
        )
        .unwrap();
        let result = classifier.categorize("t", "d").await.unwrap();
        assert_eq!(result.category, Category::Other);
        assert_eq!(result.confidence, 0);
    }
}
