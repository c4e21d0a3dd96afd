use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{DetectError, DetectorBackend, DetectorSettings, ScoreResult};

/// Talks to the remote classification service over HTTP.
///
/// One POST per request, no retries: a failed request surfaces once and is
/// only repeated if a later scan pass asks again.
#[derive(Debug, Clone)]
pub struct HttpDetector {
    http: Client,
    url: String,
}

impl HttpDetector {
    pub fn new(settings: &DetectorSettings) -> Result<Self> {
        let url = format!("{}/detect", settings.endpoint.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent("aimark/0.3")
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(30)))
            .build()
            .context("failed to build detector HTTP client")?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl DetectorBackend for HttpDetector {
    async fn detect(&self, code: &str, tags: &[String]) -> Result<ScoreResult, DetectError> {
        let payload = DetectRequest {
            code,
            question: QuestionContext { tags },
        };
        let response = self.http.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(DetectError::Status(response.status()));
        }
        let body: DetectResponse = response
            .json()
            .await
            .map_err(|_| DetectError::MalformedResponse)?;
        if !(0.0..=1.0).contains(&body.ai_probability) {
            return Err(DetectError::MalformedResponse);
        }
        Ok(ScoreResult {
            probability: body.ai_probability,
            is_ai_generated: body.is_ai_generated,
        })
    }
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    code: &'a str,
    question: QuestionContext<'a>,
}

#[derive(Serialize)]
struct QuestionContext<'a> {
    tags: &'a [String],
}

#[derive(Deserialize)]
struct DetectResponse {
    ai_probability: f64,
    is_ai_generated: bool,
}
