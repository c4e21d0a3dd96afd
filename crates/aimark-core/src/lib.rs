pub mod annotate;
pub mod observer;
pub mod page;
pub mod relay;
pub mod scanner;

pub use annotate::{annotate, ensure_stylesheet, BADGE_CLASS, STYLE_ELEMENT_ID};
pub use observer::{mutation_channel, DriverOptions, MutationEvents, MutationNotifier, ScanDriver};
pub use page::{parse_document, serialize_document, HostSchema};
pub use relay::{
    DetectError, DetectorBackend, DetectorSettings, HttpDetector, Relay, RelayHandle, RelayMessage,
    ScoreError, ScoreOutcome, ScoreResult, BACKEND_UNREACHABLE,
};
pub use scanner::{
    page_scanner::round_score, AnswerExtractor, PageScanner, PageSnapshot, ScanConfig, ScoringUnit,
    ANSWER_CODE_SOURCE, CODE_BLOCK_SEPARATOR,
};
