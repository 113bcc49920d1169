use thiserror::Error;

use crate::model::Article;
use crate::util::{sanitize_phrase, split_words, MAX_FILTER_PHRASE_LENGTH};

/// Where a phrase has to sit to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Anchor {
    /// Substring of the whole field.
    #[default]
    Anywhere,
    /// Prefix of at least one word of the field.
    AtStart,
    /// Suffix of at least one word of the field.
    AtEnd,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Filter phrase is empty")]
    Empty,

    #[error("Filter phrase too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },
}

/// Excludes articles mentioning a phrase.
///
/// An article passes when none of its title, topline, first sentence, plain
/// text, tags or geotags match. `inverse` flips that. Video articles always
/// pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextFilter {
    phrase: String,
    anchor: Anchor,
    inverse: bool,
    temporary: bool,
}

impl TextFilter {
    /// Builds a filter from user input. The phrase is stripped of characters
    /// outside printable ASCII and Latin-1, trimmed and lower-cased.
    pub fn new(phrase: &str, anchor: Anchor) -> Result<Self, FilterError> {
        let phrase = sanitize_phrase(phrase).trim().to_lowercase();
        if phrase.is_empty() {
            return Err(FilterError::Empty);
        }
        let len = phrase.chars().count();
        if len > MAX_FILTER_PHRASE_LENGTH {
            return Err(FilterError::TooLong {
                len,
                max: MAX_FILTER_PHRASE_LENGTH,
            });
        }
        Ok(Self {
            phrase,
            anchor,
            inverse: false,
            temporary: false,
        })
    }

    pub fn inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    /// Temporary filters are never persisted and go away with
    /// [`FilterSet::clear_temporary`](super::FilterSet::clear_temporary).
    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn accept(&self, article: &Article) -> bool {
        if article.is_video() {
            return true;
        }
        let accepted = !self.mentioned_in(article);
        accepted != self.inverse
    }

    fn mentioned_in(&self, article: &Article) -> bool {
        let headlines = [
            article.title.as_deref(),
            article.topline.as_deref(),
            article.first_sentence.as_deref(),
        ];
        headlines.into_iter().flatten().any(|field| self.matches(field))
            || self.matches(article.plain_text())
            || article.tags.iter().any(|tag| self.matches(tag))
            || article.geotags.iter().any(|tag| self.matches(tag))
    }

    /// Tests one field. `Anywhere` looks at the whole string, the anchored
    /// modes at its individual words.
    pub fn matches(&self, field: &str) -> bool {
        if field.is_empty() {
            return false;
        }
        let field = field.to_lowercase();
        match self.anchor {
            Anchor::Anywhere => field.contains(&self.phrase),
            Anchor::AtStart => split_words(&field).any(|word| word.starts_with(&self.phrase)),
            Anchor::AtEnd => split_words(&field).any(|word| word.ends_with(&self.phrase)),
        }
    }
}
