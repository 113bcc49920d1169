//! The parsed feed document.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::io::Read;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::de::{DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};

use super::article::ArticleSeed;
use super::elements::mismatch_as_default;
use super::error::ParseError;
use super::options::ParseOptions;
use crate::model::{sort_for_feed, Article};
use crate::source::Source;

/// National and regional articles of one source snapshot.
///
/// Built once per successful parse and replaced wholesale on the next one.
#[derive(Debug, Clone)]
pub struct Blob {
    source: Option<Source>,
    national: Vec<Article>,
    regional: Vec<Article>,
    newest: OnceLock<Option<DateTime<Utc>>>,
    parsed_at: DateTime<Utc>,
}

impl Blob {
    /// Parses a whole feed document.
    ///
    /// # Errors
    ///
    /// Any structural problem discards the whole document; no partial blob is returned.
    pub fn parse<R: Read>(reader: R, options: &ParseOptions) -> Result<Blob, ParseError> {
        let mut de = serde_json::Deserializer::from_reader(reader);
        let lists = BlobSeed { options }.deserialize(&mut de)?;
        de.end()?;
        Ok(Blob::assemble(lists, options))
    }

    pub fn from_slice(bytes: &[u8], options: &ParseOptions) -> Result<Blob, ParseError> {
        Blob::parse(bytes, options)
    }

    /// Tags the blob with the source it was read from.
    pub fn with_source(mut self, source: Option<Source>) -> Self {
        self.source = source;
        self
    }

    fn assemble(lists: RawLists, options: &ParseOptions) -> Blob {
        let RawLists { national, regional } = lists;
        let before = regional.len();
        let regional: Vec<Article> = regional
            .into_iter()
            .filter(|a| region_allowed(a, &options.allowed_regions))
            .collect();
        if regional.len() < before {
            tracing::debug!(
                dropped = before - regional.len(),
                kept = regional.len(),
                "Filtered regional articles outside allowed regions"
            );
        }

        let (national, regional) = if options.correct_quotation_marks {
            (
                national.into_iter().map(Article::corrected).collect(),
                regional.into_iter().map(Article::corrected).collect(),
            )
        } else {
            (national, regional)
        };

        Blob {
            source: None,
            national,
            regional,
            newest: OnceLock::new(),
            parsed_at: Utc::now(),
        }
    }

    pub fn source(&self) -> Option<Source> {
        self.source
    }

    pub fn parsed_at(&self) -> DateTime<Utc> {
        self.parsed_at
    }

    /// National articles in document order.
    pub fn national_news(&self) -> &[Article] {
        &self.national
    }

    /// Regional articles in document order, after the region filter.
    pub fn regional_news(&self) -> &[Article] {
        &self.regional
    }

    /// National plus regional articles not already present nationally, in feed order.
    pub fn all_news(&self) -> Vec<&Article> {
        let national_ids: HashSet<&str> = self.national.iter().map(|a| a.external_id.as_str()).collect();
        let mut all: Vec<&Article> = self
            .national
            .iter()
            .chain(
                self.regional
                    .iter()
                    .filter(|a| !national_ids.contains(a.external_id.as_str())),
            )
            .collect();
        sort_for_feed(&mut all);
        all
    }

    /// Newest article date across both lists, computed on first call.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        *self.newest.get_or_init(|| {
            self.national
                .iter()
                .chain(&self.regional)
                .filter_map(|a| a.date)
                .max()
        })
    }

    pub fn len(&self) -> usize {
        self.national.len() + self.regional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.national.is_empty() && self.regional.is_empty()
    }

    /// Looks an article up by external id, national first.
    pub fn find(&self, external_id: &str) -> Option<&Article> {
        self.national
            .iter()
            .chain(&self.regional)
            .find(|a| a.external_id == external_id)
    }
}

/// Articles without regions are always kept.
fn region_allowed(article: &Article, allowed: &BTreeSet<u16>) -> bool {
    article.regions.is_empty() || !article.regions.is_disjoint(allowed)
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Default)]
struct RawLists {
    national: Vec<Article>,
    regional: Vec<Article>,
}

struct BlobSeed<'a> {
    options: &'a ParseOptions,
}

impl<'de> DeserializeSeed<'de> for BlobSeed<'_> {
    type Value = RawLists;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<RawLists, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for BlobSeed<'_> {
    type Value = RawLists;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a feed document object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawLists, A::Error> {
        let mut lists = RawLists::default();
        let mut seen_national = HashSet::new();
        let mut seen_regional = HashSet::new();

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "news" | "channels" => map.next_value_seed(ArticleListSeed {
                    options: self.options,
                    seen: &mut seen_national,
                    out: &mut lists.national,
                })?,
                "regional" => map.next_value_seed(ArticleListSeed {
                    options: self.options,
                    seen: &mut seen_regional,
                    out: &mut lists.regional,
                })?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        tracing::debug!(
            national = lists.national.len(),
            regional = lists.regional.len(),
            "Parsed feed document"
        );
        Ok(lists)
    }
}

/// Appends an article array to `out`, keeping the first of each external id.
struct ArticleListSeed<'a> {
    options: &'a ParseOptions,
    seen: &'a mut HashSet<String>,
    out: &'a mut Vec<Article>,
}

impl<'de> DeserializeSeed<'de> for ArticleListSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ArticleListSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of articles")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while let Some(entry) = seq.next_element_seed(ArticleEntrySeed { options: self.options })? {
            let Some(article) = entry else {
                tracing::trace!("Skipping non-object article entry");
                continue;
            };
            if self.seen.insert(article.external_id.clone()) {
                self.out.push(article);
            } else {
                tracing::trace!(external_id = %article.external_id, "Skipping duplicate article");
            }
        }
        Ok(())
    }

    mismatch_as_default!('de, (), (); bool, ints, float, str, unit, map);
}

/// One entry of an article array; anything but an object is `None`.
struct ArticleEntrySeed<'a> {
    options: &'a ParseOptions,
}

impl<'de> DeserializeSeed<'de> for ArticleEntrySeed<'_> {
    type Value = Option<Article>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Option<Article>, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ArticleEntrySeed<'_> {
    type Value = Option<Article>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an article object")
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Option<Article>, A::Error> {
        ArticleSeed { options: self.options }.visit_map(map).map(Some)
    }

    mismatch_as_default!('de, Option<Article>, None; bool, ints, float, str, unit, seq);
}
