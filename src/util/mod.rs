//! Text sanitization utilities shared by the parsers and the filter engine.
//!
//! - **Text normalization**: entity decoding, odd-whitespace folding, HTML stripping
//! - **Quotation marks**: German `„…“` correction
//! - **Links**: anchor extraction and http(s) target resolution
//!
//! All functions here are pure and safe to call from any thread.

mod links;
mod quotes;
mod text;

pub use links::{parse_anchor, resolve_anchor, resolve_href, Anchor, LinkError};
pub use quotes::correct_quotation_marks;
pub use text::{
    decode_entities, eliminate_odd_whitespace, normalize_line_breaks, normalize_text,
    sanitize_phrase, split_words, strip_html, strip_html_links, strip_html_lists,
};

/// Maximum accepted filter phrase length, shared by the CLI and persisted filter loading.
pub const MAX_FILTER_PHRASE_LENGTH: usize = 256;
