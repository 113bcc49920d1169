use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use url::Url;

use super::ids::{IdGenerator, RandomIds};
use crate::util::normalize_text;

/// Headline fields a [`TextHook`] may rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Title,
    Topline,
    FirstSentence,
    Shorttext,
}

/// Optional rewrite applied to headline fields after normalization.
///
/// Resolved once when the options are built; the parser only calls it.
/// Closures of the right shape implement it directly.
pub trait TextHook: Send + Sync {
    fn apply(&self, field: TextField, text: String) -> String;
}

impl<F> TextHook for F
where
    F: Fn(TextField, String) -> String + Send + Sync,
{
    fn apply(&self, field: TextField, text: String) -> String {
        self(field, text)
    }
}

/// Everything a parse needs besides the bytes.
#[derive(Clone)]
pub struct ParseOptions {
    /// Regional articles must share at least one region with this set
    /// (articles without regions are always kept).
    pub allowed_regions: BTreeSet<u16>,
    /// Run German quotation-mark correction over headline fields.
    pub correct_quotation_marks: bool,
    /// Base for relative hrefs in content lists and boxes.
    pub link_base: Option<Url>,
    pub ids: Arc<dyn IdGenerator>,
    pub text_hook: Option<Arc<dyn TextHook>>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allowed_regions: BTreeSet::new(),
            correct_quotation_marks: false,
            link_base: Url::parse(DEFAULT_LINK_BASE).ok(),
            ids: Arc::new(RandomIds::default()),
            text_hook: None,
        }
    }
}

/// Default base for relative content links.
pub const DEFAULT_LINK_BASE: &str = "https://www.tagesschau.de/";

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("allowed_regions", &self.allowed_regions)
            .field("correct_quotation_marks", &self.correct_quotation_marks)
            .field("link_base", &self.link_base.as_ref().map(Url::as_str))
            .field("ids", &self.ids)
            .field("text_hook", &self.text_hook.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl ParseOptions {
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_text_hook(mut self, hook: Arc<dyn TextHook>) -> Self {
        self.text_hook = Some(hook);
        self
    }

    pub fn with_allowed_regions(mut self, regions: impl IntoIterator<Item = u16>) -> Self {
        self.allowed_regions = regions.into_iter().collect();
        self
    }

    /// Normalizes a headline field and runs the hook over it.
    pub(crate) fn headline(&self, field: TextField, raw: Option<String>) -> Option<String> {
        let text = normalize_text(&raw?)?;
        match &self.text_hook {
            Some(hook) => Some(hook.apply(field, text)),
            None => Some(text),
        }
    }
}
