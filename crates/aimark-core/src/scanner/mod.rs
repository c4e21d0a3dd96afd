use std::collections::BTreeSet;

use kuchikiki::{ElementData, NodeDataRef, NodeRef};
use tracing::debug;

use crate::page::{has_class, select_first, select_text, HostSchema};

pub mod page_scanner;

pub use page_scanner::PageScanner;

/// Literal separator inserted between an answer's code fragments.
pub const CODE_BLOCK_SEPARATOR: &str = "\n\n// ----- Code Block Separator -----\n\n";

/// Source label attached to scoring requests that originate from answers.
pub const ANSWER_CODE_SOURCE: &str = "answer_code";

/// Tunables for a scan pass.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Minimum combined code length, in characters, for an answer to be
    /// worth scoring. Shorter samples are treated as "no code present".
    pub min_code_chars: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { min_code_chars: 50 }
    }
}

/// One answer's extracted code plus metadata, the unit of work submitted
/// for classification.
///
/// The node handles point into the live document tree; units are rebuilt on
/// every scan pass and discarded when the pass ends.
#[derive(Clone)]
pub struct ScoringUnit {
    /// The answer container.
    pub answer: NodeRef,
    /// Where the badge is rendered.
    pub render_anchor: NodeRef,
    /// All code fragments, trimmed and joined with [`CODE_BLOCK_SEPARATOR`].
    pub combined_code: String,
    /// Whether the answer carries an acceptance marker.
    pub is_verified: bool,
    pub author: String,
    pub votes: String,
    /// Number of code fragments that went into `combined_code`.
    pub block_count: usize,
}

/// Result of sweeping the document once.
#[derive(Default)]
pub struct PageSnapshot {
    /// Answer containers present, qualifying or not.
    pub answer_count: usize,
    /// Units with enough code to be scored.
    pub units: Vec<ScoringUnit>,
    /// Lowercased tags of the current question at the moment of the sweep.
    pub tags: BTreeSet<String>,
}

/// Reads scoring units out of a parsed Q&A page.
#[derive(Debug, Clone, Default)]
pub struct AnswerExtractor {
    schema: HostSchema,
    config: ScanConfig,
}

impl AnswerExtractor {
    pub fn new(schema: HostSchema, config: ScanConfig) -> Self {
        Self { schema, config }
    }

    /// Sweep the document once, collecting every qualifying answer and the
    /// question's current tag set. The tag set is computed once per sweep
    /// and shared by all units.
    pub fn collect(&self, document: &NodeRef) -> PageSnapshot {
        let answers = self.answers(document);
        let units = answers.iter().filter_map(|answer| self.extract(answer)).collect();
        PageSnapshot {
            answer_count: answers.len(),
            units,
            tags: self.question_tags(document),
        }
    }

    /// All answer containers, excluding the question's own container.
    pub fn answers(&self, document: &NodeRef) -> Vec<NodeDataRef<ElementData>> {
        match document.select(&self.schema.answer) {
            Ok(matches) => matches
                .filter(|element| !has_class(element, &self.schema.question_class))
                .collect(),
            Err(()) => Vec::new(),
        }
    }

    /// Lowercased tags of the current question, read fresh from the document.
    pub fn question_tags(&self, document: &NodeRef) -> BTreeSet<String> {
        match document.select(&self.schema.question_tags) {
            Ok(matches) => matches
                .map(|element| element.as_node().text_contents().trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect(),
            Err(()) => BTreeSet::new(),
        }
    }

    /// Build a scoring unit from one answer container.
    ///
    /// `None` when the answer has no code, or too little to judge. Missing
    /// author, vote, or acceptance markup falls back to defaults rather
    /// than failing the unit.
    pub fn extract(&self, answer: &NodeDataRef<ElementData>) -> Option<ScoringUnit> {
        let node = answer.as_node();
        let fragments: Vec<String> = match node.select(&self.schema.code_blocks) {
            Ok(matches) => matches
                .map(|block| block.as_node().text_contents().trim().to_string())
                .collect(),
            Err(()) => Vec::new(),
        };
        if fragments.is_empty() {
            return None;
        }

        let combined_code = fragments.join(CODE_BLOCK_SEPARATOR);
        let chars = combined_code.chars().count();
        if chars < self.config.min_code_chars {
            debug!(chars, "skipping answer with insufficient code");
            return None;
        }

        let is_verified = self
            .schema
            .accepted_classes
            .iter()
            .any(|class| has_class(answer, class));
        let author = select_text(node, &self.schema.author).unwrap_or_else(|| "Unknown".to_string());
        let votes = select_text(node, &self.schema.vote_count).unwrap_or_else(|| "0".to_string());
        let render_anchor = select_first(node, &self.schema.post_layout)
            .or_else(|| select_first(node, &self.schema.answer_body))
            .map(|element| element.as_node().clone())
            .unwrap_or_else(|| node.clone());

        Some(ScoringUnit {
            answer: node.clone(),
            render_anchor,
            combined_code,
            is_verified,
            author,
            votes,
            block_count: fragments.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::parse_document;
    use proptest::prelude::*;

    const PAGE: &str = r#"
<html><head><title>q</title></head><body>
  <div class="question answer" id="q">
    <div class="post-tag">Python</div>
    <div class="post-tag">Flask</div>
    <pre><code>print("question code that must never produce a scoring unit")</code></pre>
  </div>
  <div class="answer accepted-answer" id="a1">
    <div class="post-layout">
      <div class="post-text">Use a loop.</div>
    </div>
    <pre><code>for i in range(10):
    print(i)
total = sum(range(10))</code></pre>
    <div class="s-code-block">def helper():
    return 42</div>
    <div class="user-info"><div class="user-details"><a href="/u/1">Ada Lovelace</a></div></div>
    <div class="js-vote-count">12</div>
  </div>
  <div class="answer" id="a2">
    <div class="answercell"><div class="post-text">Short.</div></div>
    <pre><code>x = 1</code></pre>
  </div>
  <div class="answer" id="a3">
    <div class="post-text">No code at all.</div>
  </div>
</body></html>
"#;

    fn extractor() -> AnswerExtractor {
        AnswerExtractor::default()
    }

    fn anchor_class(unit: &ScoringUnit) -> String {
        unit.render_anchor
            .as_element()
            .and_then(|element| element.attributes.borrow().get("class").map(str::to_string))
            .unwrap_or_default()
    }

    #[test]
    fn collect_excludes_question_and_unqualified_answers() {
        let document = parse_document(PAGE);
        let snapshot = extractor().collect(&document);
        assert_eq!(snapshot.answer_count, 3);
        assert_eq!(snapshot.units.len(), 1);
        assert!(!snapshot.units[0].combined_code.contains("question code"));
    }

    #[test]
    fn extract_combines_fragments_in_document_order() {
        let document = parse_document(PAGE);
        let snapshot = extractor().collect(&document);
        let unit = &snapshot.units[0];
        assert_eq!(unit.block_count, 2);
        assert_eq!(unit.combined_code.matches(CODE_BLOCK_SEPARATOR).count(), 1);
        assert!(unit.combined_code.starts_with("for i in range(10):"));
        assert!(unit.combined_code.ends_with("return 42"));
    }

    #[test]
    fn extract_reads_metadata_and_acceptance() {
        let document = parse_document(PAGE);
        let snapshot = extractor().collect(&document);
        let unit = &snapshot.units[0];
        assert!(unit.is_verified);
        assert_eq!(unit.author, "Ada Lovelace");
        assert_eq!(unit.votes, "12");
        assert!(anchor_class(unit).contains("post-layout"));
    }

    #[test]
    fn extract_defaults_missing_metadata() {
        let document = parse_document(PAGE);
        let extractor = AnswerExtractor::new(HostSchema::default(), ScanConfig { min_code_chars: 1 });
        let snapshot = extractor.collect(&document);
        assert_eq!(snapshot.units.len(), 2);
        let unit = &snapshot.units[1];
        assert!(!unit.is_verified);
        assert_eq!(unit.author, "Unknown");
        assert_eq!(unit.votes, "0");
        assert!(anchor_class(unit).contains("answercell"));
    }

    #[test]
    fn extract_falls_back_to_the_container_anchor() {
        let document = parse_document(
            r#"<div class="answer" id="a"><pre><code>fn main() { println!("anchorless sample"); }</code></pre></div>"#,
        );
        let extractor = AnswerExtractor::new(HostSchema::default(), ScanConfig { min_code_chars: 1 });
        let answer = document.select_first(".answer").unwrap();
        let unit = extractor.extract(&answer).unwrap();
        assert!(anchor_class(&unit).contains("answer"));
    }

    #[test]
    fn short_code_produces_no_unit() {
        let document = parse_document(PAGE);
        let answer = document.select_first("#a2").unwrap();
        assert!(extractor().extract(&answer).is_none());
    }

    #[test]
    fn tags_are_lowercased() {
        let document = parse_document(PAGE);
        let tags = extractor().question_tags(&document);
        let expected: BTreeSet<String> = ["python", "flask"].iter().map(|t| t.to_string()).collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn tags_reflect_the_current_document() {
        let document = parse_document(PAGE);
        let extractor = extractor();
        assert_eq!(extractor.question_tags(&document).len(), 2);

        document.select_first(".post-tag").unwrap().as_node().detach();
        let tags = extractor.question_tags(&document);
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("flask"));
    }

    proptest! {
        #[test]
        fn joining_n_fragments_yields_n_minus_one_separators(
            fragments in proptest::collection::vec("[a-z0-9]{1,24}", 2..6)
        ) {
            let blocks: String = fragments
                .iter()
                .map(|code| format!("<pre><code>{code}</code></pre>"))
                .collect();
            let document = parse_document(&format!(
                r#"<div class="answer" id="a">{blocks}</div>"#
            ));
            let extractor = AnswerExtractor::new(HostSchema::default(), ScanConfig { min_code_chars: 0 });
            let answer = document.select_first("#a").unwrap();
            let unit = extractor.extract(&answer).expect("fragments present");
            prop_assert_eq!(unit.block_count, fragments.len());
            prop_assert_eq!(
                unit.combined_code.matches(CODE_BLOCK_SEPARATOR).count(),
                fragments.len() - 1
            );
            prop_assert_eq!(unit.combined_code, fragments.join(CODE_BLOCK_SEPARATOR));
        }
    }
}
