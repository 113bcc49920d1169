//! Article filters.
//!
//! A [`Filter`] decides per article whether it is shown. Filters are pure
//! reads over immutable articles and may run on any thread.
//!
//! - [`TextFilter`]: excludes articles mentioning a phrase
//! - [`RegionFilter`]: keeps articles of selected regions
//! - [`FilterSet`]: the active filters of a session, with persistence

pub mod persist;
mod text;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;

use crate::model::Article;

pub use text::{Anchor, FilterError, TextFilter};

/// Keeps articles sharing a region with `regions`; articles without any
/// region always pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionFilter {
    regions: BTreeSet<u16>,
}

impl RegionFilter {
    pub fn new(regions: impl IntoIterator<Item = u16>) -> Self {
        Self {
            regions: regions.into_iter().collect(),
        }
    }

    pub fn regions(&self) -> &BTreeSet<u16> {
        &self.regions
    }

    pub fn accept(&self, article: &Article) -> bool {
        article.regions.is_empty() || !article.regions.is_disjoint(&self.regions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    Text(TextFilter),
    Region(RegionFilter),
}

impl Filter {
    pub fn accept(&self, article: &Article) -> bool {
        match self {
            Filter::Text(filter) => filter.accept(article),
            Filter::Region(filter) => filter.accept(article),
        }
    }

    pub fn is_temporary(&self) -> bool {
        match self {
            Filter::Text(filter) => filter.is_temporary(),
            Filter::Region(_) => false,
        }
    }
}

impl From<TextFilter> for Filter {
    fn from(filter: TextFilter) -> Self {
        Filter::Text(filter)
    }
}

impl From<RegionFilter> for Filter {
    fn from(filter: RegionFilter) -> Self {
        Filter::Region(filter)
    }
}

/// The active filters; an article is shown only if every filter accepts it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from encoded phrases (see [`persist`]), skipping invalid ones.
    pub fn from_phrases<S: AsRef<str>>(phrases: impl IntoIterator<Item = S>) -> Self {
        let mut set = Self::new();
        for phrase in phrases {
            match persist::decode(phrase.as_ref()) {
                Ok(filter) => {
                    set.add(filter);
                }
                Err(e) => tracing::warn!(phrase = phrase.as_ref(), error = %e, "Skipping invalid filter"),
            }
        }
        set
    }

    /// Reads persisted text filters from `path`; a missing file gives an empty set.
    pub fn load(path: &Path) -> Result<Self> {
        let mut set = Self::new();
        for filter in persist::load(path)? {
            set.add(filter);
        }
        Ok(set)
    }

    /// Writes the persistable text filters to `path`. Returns how many were written.
    pub fn save(&self, path: &Path) -> Result<usize> {
        persist::save(path, self.text_filters())
    }

    /// Adds a filter unless an equal one is present. Returns whether it was added.
    pub fn add(&mut self, filter: impl Into<Filter>) -> bool {
        let filter = filter.into();
        if self.filters.contains(&filter) {
            return false;
        }
        self.filters.push(filter);
        true
    }

    pub fn remove(&mut self, filter: &Filter) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f != filter);
        self.filters.len() != before
    }

    /// Drops all temporary filters.
    pub fn clear_temporary(&mut self) {
        self.filters.retain(|f| !f.is_temporary());
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn text_filters(&self) -> impl Iterator<Item = &TextFilter> {
        self.filters.iter().filter_map(|f| match f {
            Filter::Text(text) => Some(text),
            Filter::Region(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn accepts(&self, article: &Article) -> bool {
        self.filters.iter().all(|f| f.accept(article))
    }

    /// The accepted articles, order preserved.
    pub fn apply<'a, I>(&self, articles: I) -> Vec<&'a Article>
    where
        I: IntoIterator<Item = &'a Article>,
    {
        articles.into_iter().filter(|a| self.accepts(a)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArticleType;
    use pretty_assertions::assert_eq;

    fn article(id: &str, title: &str, regions: &[u16]) -> Article {
        Article {
            external_id: id.into(),
            title: Some(title.into()),
            article_type: Some(ArticleType::Story),
            regions: regions.iter().copied().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_region_filter() {
        let filter = RegionFilter::new([7]);
        assert!(filter.accept(&article("a", "x", &[])));
        assert!(filter.accept(&article("b", "x", &[7, 8])));
        assert!(!filter.accept(&article("c", "x", &[2])));
    }

    #[test]
    fn test_set_requires_all_filters() {
        let mut set = FilterSet::new();
        set.add(TextFilter::new("trump", Anchor::AtStart).unwrap());
        set.add(RegionFilter::new([7]));

        let articles = vec![
            article("a", "Trumpet", &[7]),
            article("b", "Strumpet", &[7]),
            article("c", "Strumpet", &[2]),
            article("d", "Hessen", &[]),
        ];
        let kept: Vec<&str> = set.apply(&articles).iter().map(|a| a.external_id.as_str()).collect();
        assert_eq!(kept, vec!["b", "d"]);
    }

    #[test]
    fn test_add_deduplicates_and_remove() {
        let mut set = FilterSet::new();
        let f = TextFilter::new("x", Anchor::Anywhere).unwrap();
        assert!(set.add(f.clone()));
        assert!(!set.add(f.clone()));
        assert_eq!(set.len(), 1);
        assert!(set.remove(&Filter::Text(f)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_clear_temporary() {
        let mut set = FilterSet::new();
        set.add(TextFilter::new("keep", Anchor::Anywhere).unwrap());
        set.add(TextFilter::new("drop", Anchor::Anywhere).unwrap().temporary(true));
        set.add(RegionFilter::new([1]));
        set.clear_temporary();
        assert_eq!(set.len(), 2);
        assert!(set.text_filters().all(|f| f.phrase() == "keep"));
    }

    #[test]
    fn test_from_phrases() {
        let set = FilterSet::from_phrases(["^trump", "$gate", "", "wahl"]);
        let anchors: Vec<Anchor> = set.text_filters().map(TextFilter::anchor).collect();
        assert_eq!(anchors, vec![Anchor::AtStart, Anchor::AtEnd, Anchor::Anywhere]);
    }
}
