use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub mod http;
mod settings;

pub use http::HttpDetector;
pub use settings::DetectorSettings;

/// Reply substituted whenever the classification backend cannot be reached
/// or answers with something unusable.
pub const BACKEND_UNREACHABLE: &str = "Failed to connect to backend";

/// Message accepted by the relay from the page-side scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    AnalyzeCode {
        code: String,
        tags: Vec<String>,
        source: String,
    },
}

/// Successful classification of one scoring unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    #[serde(rename = "ai_probability")]
    pub probability: f64,
    pub is_ai_generated: bool,
}

/// Failure substitute delivered instead of a score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreError {
    #[serde(rename = "error")]
    pub reason: String,
}

/// Exactly one of these is delivered per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreOutcome {
    Scored(ScoreResult),
    Failed(ScoreError),
}

impl ScoreOutcome {
    fn unreachable_backend() -> Self {
        Self::Failed(ScoreError {
            reason: BACKEND_UNREACHABLE.to_string(),
        })
    }
}

/// Errors a detector backend can produce before they are flattened into a
/// [`ScoreError`] reply.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("failed to reach detector endpoint: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("detector returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("detector response missing required fields")]
    MalformedResponse,
}

/// Client for the remote classification service.
#[async_trait]
pub trait DetectorBackend: Send + Sync {
    /// Classify one combined code sample in the context of its question tags.
    async fn detect(&self, code: &str, tags: &[String]) -> Result<ScoreResult, DetectError>;
}

struct Envelope {
    message: RelayMessage,
    reply: oneshot::Sender<ScoreOutcome>,
}

/// Long-lived broker between the page-side scanner and the remote
/// classification service.
///
/// Each request carries its own reply channel, which stays open until the
/// asynchronous result settles: the caller gets exactly one reply per
/// request even when requests overlap. Requests run as independent tasks
/// with no ordering or fairness between them.
pub struct Relay;

impl Relay {
    /// Spawn the broker task and return a cloneable handle for issuing
    /// requests. The broker stops once every handle is dropped.
    pub fn spawn(backend: Arc<dyn DetectorBackend>) -> RelayHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let backend = Arc::clone(&backend);
                tokio::spawn(async move {
                    let outcome = score(backend, envelope.message).await;
                    // The requester may have gone away; replies are best-effort.
                    let _ = envelope.reply.send(outcome);
                });
            }
            debug!("relay channel closed, broker stopping");
        });
        RelayHandle { tx }
    }
}

async fn score(backend: Arc<dyn DetectorBackend>, message: RelayMessage) -> ScoreOutcome {
    match message {
        RelayMessage::AnalyzeCode { code, tags, source } => {
            debug!(chars = code.chars().count(), %source, "forwarding scoring request");
            match backend.detect(&code, &tags).await {
                Ok(result) => ScoreOutcome::Scored(result),
                Err(error) => {
                    warn!(%error, "scoring request failed");
                    ScoreOutcome::unreachable_backend()
                }
            }
        }
    }
}

/// Requester-side handle to the relay.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl RelayHandle {
    /// Submit one message and wait for its single asynchronous reply.
    ///
    /// Never fails: a stopped broker or a lost reply degrades to a
    /// [`ScoreError`], so the page keeps working with that answer unscored.
    pub async fn request(&self, message: RelayMessage) -> ScoreOutcome {
        let (reply, response) = oneshot::channel();
        if self.tx.send(Envelope { message, reply }).is_err() {
            return ScoreOutcome::unreachable_backend();
        }
        match response.await {
            Ok(outcome) => outcome,
            Err(_) => ScoreOutcome::unreachable_backend(),
        }
    }
}
