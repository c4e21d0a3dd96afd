use anyhow::Result;
use kuchikiki::traits::TendrilSink;
use kuchikiki::{ElementData, NodeDataRef, NodeRef};

/// CSS selectors describing the markup of the host Q&A page.
///
/// The host page owns this schema; the defaults target Stack Overflow's
/// markup and can be overridden for other skins.
#[derive(Debug, Clone)]
pub struct HostSchema {
    /// Answer containers. The question's own container may also carry this
    /// class and is excluded via [`HostSchema::question_class`].
    pub answer: String,
    /// Class marking the question container.
    pub question_class: String,
    /// Code fragments inside an answer, generic and site-specific markup.
    pub code_blocks: String,
    /// Classes marking an accepted answer.
    pub accepted_classes: Vec<String>,
    /// Author link inside an answer's user card.
    pub author: String,
    /// Vote count element inside an answer.
    pub vote_count: String,
    /// Preferred badge anchor inside an answer.
    pub post_layout: String,
    /// Fallback badge anchor inside an answer.
    pub answer_body: String,
    /// Tag elements of the current question.
    pub question_tags: String,
}

impl Default for HostSchema {
    fn default() -> Self {
        Self {
            answer: ".answer".into(),
            question_class: "question".into(),
            code_blocks: "pre code, .s-code-block".into(),
            accepted_classes: vec!["accepted-answer".into(), "js-accepted-answer".into()],
            author: ".user-info .user-details a".into(),
            vote_count: ".js-vote-count".into(),
            post_layout: ".post-layout".into(),
            answer_body: ".answercell".into(),
            question_tags: ".question .post-tag".into(),
        }
    }
}

/// Parse an HTML document into a mutable node tree.
pub fn parse_document(html: &str) -> NodeRef {
    kuchikiki::parse_html().one(html)
}

/// Serialize a node tree back to HTML.
pub fn serialize_document(document: &NodeRef) -> Result<String> {
    let mut out = Vec::new();
    document.serialize(&mut out)?;
    Ok(String::from_utf8(out)?)
}

/// Whether an element carries `class` in its space-separated class list.
pub fn has_class(element: &NodeDataRef<ElementData>, class: &str) -> bool {
    element
        .attributes
        .borrow()
        .get("class")
        .map(|value| value.split_ascii_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

/// First descendant of `node` matching `selector`, if any.
pub fn select_first(node: &NodeRef, selector: &str) -> Option<NodeDataRef<ElementData>> {
    node.select_first(selector).ok()
}

/// Trimmed text content of the first descendant matching `selector`.
///
/// `None` when the element is absent or its text is empty, so callers
/// supply their own defaults.
pub fn select_text(node: &NodeRef, selector: &str) -> Option<String> {
    let element = select_first(node, selector)?;
    let text = element.as_node().text_contents().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
