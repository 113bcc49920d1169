//! Integration tests for filtering parsed feeds and persisting filters.

use std::sync::Arc;

use newsblob::config::Config;
use newsblob::feed::{Blob, ParseOptions, SequenceIds};
use newsblob::filter::{Anchor, Filter, FilterSet, RegionFilter, TextFilter};
use pretty_assertions::assert_eq;

const FEED: &str = r#"{
  "news": [
    {"externalId": "n1", "title": "Trump besucht Berlin", "type": "story",
     "date": "2024-05-01T10:00:00.000+02:00"},
    {"externalId": "n2", "title": "Trompetenkonzert", "type": "story",
     "date": "2024-05-01T09:00:00.000+02:00",
     "content": [{"type": "text", "value": "Ein Trumpet-Solo begeistert."}]},
    {"externalId": "n3", "title": "Fußball", "type": "story",
     "date": "2024-05-01T08:00:00.000+02:00", "tags": [{"tag": "Bundesliga"}]},
    {"externalId": "v1", "title": "Trump im Video", "type": "video",
     "date": "2024-05-01T07:00:00.000+02:00"}
  ],
  "regional": [
    {"externalId": "r1", "title": "Hessen", "type": "story",
     "date": "2024-05-01T06:00:00.000+02:00", "regionIds": [7]},
    {"externalId": "r2", "title": "Bayern", "type": "story",
     "date": "2024-05-01T05:00:00.000+02:00", "regionIds": [2]}
  ]
}"#;

fn blob() -> Blob {
    let options = ParseOptions::default()
        .with_ids(Arc::new(SequenceIds::default()))
        .with_allowed_regions([2, 7]);
    Blob::from_slice(FEED.as_bytes(), &options).unwrap()
}

fn shown(set: &FilterSet, blob: &Blob) -> Vec<String> {
    set.apply(blob.all_news().iter().copied())
        .into_iter()
        .map(|a| a.external_id.clone())
        .collect()
}

#[test]
fn test_empty_set_shows_everything() {
    let blob = blob();
    assert_eq!(shown(&FilterSet::new(), &blob).len(), 6);
}

#[test]
fn test_anywhere_filter_searches_content() {
    let blob = blob();
    let mut set = FilterSet::new();
    set.add(TextFilter::new("trump", Anchor::Anywhere).unwrap());
    // n2 mentions "Trumpet" in its body; videos always stay
    assert_eq!(shown(&set, &blob), vec!["n3", "v1", "r1", "r2"]);
}

#[test]
fn test_anchored_filter_and_tags() {
    let blob = blob();
    let mut set = FilterSet::new();
    set.add(TextFilter::new("liga", Anchor::AtEnd).unwrap());
    assert_eq!(shown(&set, &blob), vec!["n1", "n2", "v1", "r1", "r2"]);
}

#[test]
fn test_inverse_filter_keeps_matches() {
    let blob = blob();
    let mut set = FilterSet::new();
    set.add(TextFilter::new("trump", Anchor::AtStart).unwrap().inverse(true));
    assert_eq!(shown(&set, &blob), vec!["n1", "n2", "v1"]);
}

#[test]
fn test_region_filter_combined() {
    let blob = blob();
    let mut set = FilterSet::new();
    set.add(RegionFilter::new([7]));
    set.add(TextFilter::new("fußball", Anchor::Anywhere).unwrap());
    assert_eq!(shown(&set, &blob), vec!["n1", "n2", "v1", "r1"]);

    assert!(set.remove(&Filter::Region(RegionFilter::new([7]))));
    assert_eq!(shown(&set, &blob), vec!["n1", "n2", "v1", "r1", "r2"]);
}

#[test]
fn test_persisted_filters_survive_reload() {
    let dir = std::env::temp_dir().join("newsblob_it_filters");
    std::fs::remove_dir_all(&dir).ok();
    let path = dir.join("filters.txt");

    let mut set = FilterSet::new();
    set.add(TextFilter::new("Trump", Anchor::AtStart).unwrap());
    set.add(TextFilter::new("gate", Anchor::AtEnd).unwrap());
    set.add(TextFilter::new("wahl", Anchor::Anywhere).unwrap().inverse(true));
    set.add(TextFilter::new("heute", Anchor::Anywhere).unwrap().temporary(true));
    set.add(RegionFilter::new([7]));
    assert_eq!(set.save(&path).unwrap(), 2);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.lines().any(|l| l == "^trump"));
    assert!(content.lines().any(|l| l == "$gate"));

    let loaded = FilterSet::load(&path).unwrap();
    let phrases: Vec<(&str, Anchor)> = loaded.text_filters().map(|f| (f.phrase(), f.anchor())).collect();
    assert_eq!(phrases, vec![("trump", Anchor::AtStart), ("gate", Anchor::AtEnd)]);

    // saving again replaces the file
    assert_eq!(FilterSet::new().save(&path).unwrap(), 0);
    assert!(FilterSet::load(&path).unwrap().is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_config_filters() {
    let config = Config::from_toml("filters = [\"^trump\", \"\", \"fußball\"]\n").unwrap();
    let set = config.filter_set();
    assert_eq!(set.len(), 2);
    assert_eq!(shown(&set, &blob()), vec!["v1", "r1", "r2"]);
}
