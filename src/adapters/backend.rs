use crate::config::BackendConfig;
use crate::domain::model::{GenerationJob, GeneratorReply};
use crate::domain::ports::GenerationBackend;
use crate::utils::error::{ForgeError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// HTTP client for the external solid-modeling service.
#[derive(Debug, Clone)]
pub struct HttpGenerationBackend {
    client: Client,
    endpoint: String,
}

impl HttpGenerationBackend {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ForgeError::ConfigError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.endpoint, config.timeout_seconds())
    }
}

/// First readable text under `error`, `detail` or `message`, descending into nested objects.
fn message_in(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => ["error", "detail", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(message_in)),
        _ => None,
    }
}

/// Pulls a readable message out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(message_in)
        .unwrap_or_else(|| body.trim().chars().take(500).collect())
}

fn string_field(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_reply(body: &str) -> Result<GeneratorReply> {
    let value: Value = serde_json::from_str(body).map_err(|e| ForgeError::GeneratorMalformed {
        message: format!("backend reply is not valid JSON: {}", e),
    })?;
    let Value::Object(map) = &value else {
        return Err(ForgeError::GeneratorMalformed {
            message: "backend reply is not a JSON object".to_string(),
        });
    };

    Ok(GeneratorReply {
        object_key: string_field(map, "object_key"),
        thumb_key: string_field(map, "thumb_key"),
        error: message_in(&value),
    })
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(&self, job: &GenerationJob) -> Result<GeneratorReply> {
        tracing::debug!("Making generation request to: {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(job)
            .send()
            .await
            .map_err(|e| ForgeError::GeneratorUnavailable {
                message: format!("backend unreachable: {}", e),
            })?;

        let status = response.status();
        tracing::debug!("Generation response status: {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| ForgeError::GeneratorUnavailable {
                message: format!("failed to read backend response: {}", e),
            })?;

        if !status.is_success() {
            return Err(ForgeError::GeneratorUnavailable {
                message: format!("backend returned {}: {}", status, error_message(&body)),
            });
        }

        parse_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_fields() {
        assert_eq!(error_message(r#"{"detail": "wall too thin"}"#), "wall too thin");
        assert_eq!(error_message(r#"{"error": "bad model"}"#), "bad model");
        assert_eq!(error_message("  upstream timeout \n"), "upstream timeout");
        assert_eq!(
            error_message(r#"{"error": {"message": "out of memory"}}"#),
            "out of memory"
        );
    }

    #[test]
    fn test_parse_reply_reads_nested_error() {
        let reply = parse_reply(r#"{"ok": false, "error": {"message": "wall too thin"}}"#).unwrap();
        assert_eq!(reply.object_key, None);
        assert_eq!(reply.error.as_deref(), Some("wall too thin"));

        let reply = parse_reply(r#"{"object_key": "abc/out.stl", "thumb_key": 7}"#).unwrap();
        assert_eq!(reply.object_key.as_deref(), Some("abc/out.stl"));
        assert_eq!(reply.thumb_key, None);
        assert_eq!(reply.error, None);

        assert!(matches!(
            parse_reply("[1, 2]"),
            Err(ForgeError::GeneratorMalformed { .. })
        ));
    }
}
