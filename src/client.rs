use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::BackendConfig;
use crate::question::Question;

const QUESTION_PATH: &str = "/api/question";
const HEALTH_PATH: &str = "/health";

#[derive(Debug, Serialize)]
struct QuestionRequest<'a> {
    question: &'a Question,
}

#[derive(Debug, Deserialize)]
struct QuestionResponse {
    data: AnswerPayload,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    message: String,
}

/// A successful answer: markdown prose plus reference links.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnswerPayload {
    pub answer: String,
    #[serde(default)]
    pub relevant_links: Vec<String>,
}

/// Every way a submission can fail after it left the form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("backend base URL is not configured")]
    NotConfigured,
    #[error("service responded with HTTP {status}")]
    Status { status: u16, detail: Option<String> },
    #[error("request failed: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FailureReason {
    pub fn status(&self) -> Option<u16> {
        match self {
            FailureReason::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Client for the question-answering service.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct AnswerClient {
    base_url: String,
    client: reqwest::Client,
}

impl AnswerClient {
    pub fn with_config(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(AnswerClient {
            base_url: config.base_url.trim().to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<String, FailureReason> {
        if self.base_url.is_empty() {
            return Err(FailureReason::NotConfigured);
        }
        Ok(format!("{}{}", self.base_url.trim_end_matches('/'), path))
    }

    /// POST the question and interpret whatever comes back.
    pub async fn ask(&self, question: &Question) -> Result<AnswerPayload, FailureReason> {
        let url = self.endpoint(QUESTION_PATH)?;
        debug!(%url, chars = question.as_str().chars().count(), "sending question");

        let response = self
            .client
            .post(&url)
            .json(&QuestionRequest { question })
            .send()
            .await
            .map_err(|e| FailureReason::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FailureReason::Network(e.to_string()))?;
        debug!(status, bytes = body.len(), "question answered");

        interpret(status, &body)
    }

    /// Probe `GET /health`, returning the server's greeting.
    pub async fn health(&self) -> Result<String, FailureReason> {
        let url = self.endpoint(HEALTH_PATH)?;

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FailureReason::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FailureReason::Status {
                status: status.as_u16(),
                detail: None,
            });
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| FailureReason::Malformed(e.to_string()))?;
        Ok(health.message)
    }
}

/// Turn a raw status and body into an answer or a failure.
///
/// 2xx bodies must carry `{"data": {...}}`. Other statuses keep the
/// `detail` field of a JSON error body when there is one.
pub fn interpret(status: u16, body: &str) -> Result<AnswerPayload, FailureReason> {
    if (200..300).contains(&status) {
        return serde_json::from_str::<QuestionResponse>(body)
            .map(|response| response.data)
            .map_err(|e| FailureReason::Malformed(e.to_string()));
    }

    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|error| error.detail)
        .and_then(|detail| match detail {
            Value::String(text) => Some(text),
            Value::Null => None,
            other => Some(other.to_string()),
        });

    Err(FailureReason::Status { status, detail })
}
