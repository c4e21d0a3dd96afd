use kuchikiki::NodeRef;
use tracing::debug;

use crate::page::parse_document;

/// Marker class carried by every badge; used to find and replace stale
/// badges on re-annotation.
pub const BADGE_CLASS: &str = "ai-confidence-display";

/// `id` of the injected stylesheet element.
pub const STYLE_ELEMENT_ID: &str = "ai-confidence-style";

/// Body-text element badges are inserted in front of, when the anchor has one.
const BODY_TEXT_SELECTOR: &str = ".post-text";

const AI_CLASS: &str = "ai-detected";
const HUMAN_CLASS: &str = "human-written";
const VERIFIED_CLASS: &str = "verified-answer";

/// Attach a confidence badge to an answer, replacing any badge left by an
/// earlier pass. After the call exactly one badge exists under `answer`.
///
/// The badge lands immediately before the anchor's body text when present,
/// otherwise as the anchor's first child.
pub fn annotate(answer: &NodeRef, anchor: &NodeRef, score: u8, is_ai: bool, is_verified: bool) {
    remove_badges(answer);
    let badge = match build_badge(score, is_ai, is_verified) {
        Some(badge) => badge,
        None => return,
    };
    match anchor.select_first(BODY_TEXT_SELECTOR) {
        Ok(body) => body.as_node().insert_before(badge),
        Err(()) => anchor.prepend(badge),
    }
}

fn remove_badges(answer: &NodeRef) {
    let stale: Vec<NodeRef> = match answer.select(&format!(".{BADGE_CLASS}")) {
        Ok(matches) => matches.map(|element| element.as_node().clone()).collect(),
        Err(()) => Vec::new(),
    };
    for badge in stale {
        badge.detach();
    }
}

fn build_badge(score: u8, is_ai: bool, is_verified: bool) -> Option<NodeRef> {
    let mut classes = format!(
        "{BADGE_CLASS} {}",
        if is_ai { AI_CLASS } else { HUMAN_CLASS }
    );
    if is_verified {
        classes.push(' ');
        classes.push_str(VERIFIED_CLASS);
    }
    let verified_marker = if is_verified {
        r#"<span class="verified-badge">Accepted</span>"#
    } else {
        ""
    };
    let markup = format!(
        r#"<div class="{classes}"><span class="ai-confidence-label">AI Confidence:</span> <span class="ai-confidence-value">{score}%</span>{verified_marker}</div>"#
    );
    detached_element(&markup, &format!(".{BADGE_CLASS}"))
}

/// Inject the badge stylesheet into the document head once.
///
/// Repeated calls are no-ops; the element is keyed by [`STYLE_ELEMENT_ID`].
pub fn ensure_stylesheet(document: &NodeRef) {
    if document.select_first(&format!("#{STYLE_ELEMENT_ID}")).is_ok() {
        return;
    }
    let markup = format!(r#"<style id="{STYLE_ELEMENT_ID}">{BADGE_STYLESHEET}</style>"#);
    let style = match detached_element(&markup, &format!("#{STYLE_ELEMENT_ID}")) {
        Some(style) => style,
        None => return,
    };
    match document.select_first("head") {
        Ok(head) => head.as_node().append(style),
        Err(()) => document.append(style),
    }
}

/// Parse a constant markup fragment and lift the requested element out of
/// the scratch tree.
fn detached_element(markup: &str, selector: &str) -> Option<NodeRef> {
    let scratch = parse_document(markup);
    let node = match scratch.select_first(selector) {
        Ok(element) => element.as_node().clone(),
        Err(()) => {
            debug!(selector, "fragment did not yield the expected element");
            return None;
        }
    };
    node.detach();
    Some(node)
}

const BADGE_STYLESHEET: &str = r#"
  .ai-confidence-display {
    padding: 8px 12px;
    margin: 10px 0;
    border-radius: 4px;
    font-size: 13px;
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
    display: inline-flex;
    align-items: center;
    gap: 6px;
    width: fit-content;
    box-shadow: 0 1px 3px rgba(0,0,0,0.1);
  }
  .ai-confidence-label {
    font-weight: 500;
  }
  .ai-confidence-value {
    font-weight: bold;
  }
  .ai-detected {
    background-color: #fee2e2;
    color: #b91c1c;
    border-left: 3px solid #ef4444;
  }
  .human-written {
    background-color: #dcfce7;
    color: #166534;
    border-left: 3px solid #10b981;
  }
  .verified-badge {
    margin-left: 8px;
    padding: 2px 6px;
    background-color: #e6f3ff;
    color: #0064bd;
    border-radius: 3px;
    font-size: 11px;
    font-weight: 500;
  }
  .verified-answer {
    border-left-width: 4px;
  }
"#;
