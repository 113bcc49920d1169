use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};

use super::content::Content;
use super::media::{best_stream, StreamQuality, Streams, TeaserImage};
use crate::util::correct_quotation_marks;

/// The `type` tag of an article.
///
/// An article without a type is a weather item; it is modelled as
/// `Option<ArticleType>::None` rather than a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArticleType {
    Story,
    Video,
    Webview,
}

impl ArticleType {
    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag {
            "story" => Some(Self::Story),
            "video" => Some(Self::Video),
            "webview" => Some(Self::Webview),
            _ => None,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::Video => "video",
            Self::Webview => "webview",
        }
    }
}

/// One parsed feed item.
///
/// Equality and hashing use `external_id` only; two articles with the same
/// external id are the same article regardless of their content.
///
/// Articles are built once by the parser and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Article {
    /// Process-local id handed out by the parser's id generator, in parse order.
    pub id: u64,
    /// Identity key. Generated when the upstream object has none.
    pub external_id: String,
    pub sophora_id: Option<String>,
    pub title: Option<String>,
    pub topline: Option<String>,
    pub first_sentence: Option<String>,
    pub shorttext: Option<String>,
    /// Publication date. `None` on a video article means a live stream.
    pub date: Option<DateTime<Utc>>,
    pub article_type: Option<ArticleType>,
    pub regions: BTreeSet<u16>,
    pub tags: BTreeSet<String>,
    pub geotags: BTreeSet<String>,
    pub streams: Streams,
    pub content: Option<Content>,
    pub teaser_image: Option<TeaserImage>,
    pub details_url: Option<String>,
    pub details_web: Option<String>,
    pub share_url: Option<String>,
    pub breaking_news: bool,
    pub ressort: Option<String>,
}

impl PartialEq for Article {
    fn eq(&self, other: &Self) -> bool {
        self.external_id == other.external_id
    }
}

impl Eq for Article {}

impl Hash for Article {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.external_id.hash(state);
    }
}

impl Article {
    /// Milliseconds since the epoch, if dated.
    pub fn timestamp(&self) -> Option<i64> {
        self.date.map(|d| d.timestamp_millis())
    }

    pub fn is_video(&self) -> bool {
        self.article_type == Some(ArticleType::Video)
    }

    /// An undated video is a live stream.
    pub fn is_live(&self) -> bool {
        self.is_video() && self.date.is_none()
    }

    pub fn is_weather(&self) -> bool {
        self.article_type.is_none()
    }

    pub fn best_stream(&self) -> Option<(StreamQuality, &str)> {
        best_stream(&self.streams)
    }

    /// Plain text of the content, or `""` without content.
    pub fn plain_text(&self) -> &str {
        self.content.as_ref().map(Content::plain_text).unwrap_or("")
    }

    /// Rewrites quotation marks in the headline fields into German `„…“` pairs.
    ///
    /// Content is left alone; its rendered text is fixed at parse time.
    pub fn corrected(mut self) -> Self {
        fn fix(field: &mut Option<String>) {
            if let Some(text) = field.as_mut() {
                if let std::borrow::Cow::Owned(fixed) = correct_quotation_marks(text) {
                    *text = fixed;
                }
            }
        }
        fix(&mut self.title);
        fix(&mut self.topline);
        fix(&mut self.first_sentence);
        fix(&mut self.shorttext);
        self
    }
}

// ============================================================================
// Feed ordering
// ============================================================================

/// The ordering of the merged article list.
///
/// 1. Typed articles before untyped (weather) ones, regardless of date
/// 2. Undated articles before dated ones
/// 3. Newer before older
/// 4. Title ascending, case-insensitive; untitled last
/// 5. Parse order (`id`) so the order is total and repeatable
pub fn feed_order(a: &Article, b: &Article) -> Ordering {
    a.article_type
        .is_none()
        .cmp(&b.article_type.is_none())
        .then_with(|| match (a.date, b.date) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => y.timestamp_millis().cmp(&x.timestamp_millis()),
        })
        .then_with(|| match (&a.title, &b.title) {
            (Some(x), Some(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// Sorts articles in place by [`feed_order`]. The sort is stable.
pub fn sort_for_feed<A: AsRef<Article>>(articles: &mut [A]) {
    articles.sort_by(|a, b| feed_order(a.as_ref(), b.as_ref()));
}

impl AsRef<Article> for Article {
    fn as_ref(&self) -> &Article {
        self
    }
}
