use futures::future::join_all;
use kuchikiki::NodeRef;
use tracing::{debug, info, instrument};

use super::{AnswerExtractor, ScoringUnit, ANSWER_CODE_SOURCE};
use crate::annotate::{annotate, ensure_stylesheet};
use crate::relay::{RelayHandle, RelayMessage, ScoreOutcome};

/// Drives one full sweep of the page: extract scoring units, request a score
/// for each through the relay, and annotate answers as replies arrive.
pub struct PageScanner {
    extractor: AnswerExtractor,
    relay: RelayHandle,
}

impl PageScanner {
    pub fn new(extractor: AnswerExtractor, relay: RelayHandle) -> Self {
        Self { extractor, relay }
    }

    /// Run one scan pass over `document`.
    ///
    /// Requests for different answers run concurrently and may complete in
    /// any order; each reply writes only to its own answer element. The
    /// pass resolves once every outstanding reply has settled. A failure in
    /// one answer's request never affects its siblings.
    #[instrument(name = "scan_pass", skip_all)]
    pub async fn scan(&self, document: &NodeRef) {
        ensure_stylesheet(document);

        let snapshot = self.extractor.collect(document);
        if snapshot.answer_count == 0 {
            info!("no answers found");
            return;
        }
        if snapshot.units.is_empty() {
            debug!(answers = snapshot.answer_count, "answers contain no qualifying code");
            return;
        }

        debug!(
            units = snapshot.units.len(),
            tags = ?snapshot.tags,
            "dispatching scoring requests"
        );
        let tags: Vec<String> = snapshot.tags.into_iter().collect();
        let requests = snapshot
            .units
            .into_iter()
            .map(|unit| self.score_and_annotate(unit, tags.clone()));
        join_all(requests).await;
    }

    async fn score_and_annotate(&self, unit: ScoringUnit, tags: Vec<String>) {
        let message = RelayMessage::AnalyzeCode {
            code: unit.combined_code.clone(),
            tags,
            source: ANSWER_CODE_SOURCE.to_string(),
        };
        match self.relay.request(message).await {
            ScoreOutcome::Scored(result) => {
                let score = round_score(result.probability);
                annotate(
                    &unit.answer,
                    &unit.render_anchor,
                    score,
                    result.is_ai_generated,
                    unit.is_verified,
                );
            }
            // The answer stays unscored; a later pass may ask again.
            ScoreOutcome::Failed(error) => {
                debug!(reason = %error.reason, author = %unit.author, "answer left unscored");
            }
        }
    }
}

/// Map a probability in `[0, 1]` to a whole percentage, rounding halves up.
pub fn round_score(probability: f64) -> u8 {
    (probability.clamp(0.0, 1.0) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_at_the_percentage_boundary() {
        assert_eq!(round_score(0.873), 87);
        assert_eq!(round_score(0.875), 88);
        assert_eq!(round_score(0.0), 0);
        assert_eq!(round_score(1.0), 100);
    }

    #[test]
    fn clamps_out_of_range_probabilities() {
        assert_eq!(round_score(-0.2), 0);
        assert_eq!(round_score(1.7), 100);
    }
}
