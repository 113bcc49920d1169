//! Integration tests for parsing whole feed documents.
//!
//! Each test builds its own `ParseOptions` with a deterministic id sequence
//! so generated ids are predictable.

use std::sync::Arc;

use newsblob::feed::{Blob, ParseError, ParseOptions, SequenceIds};
use newsblob::model::{ArticleType, ElementKind, StreamQuality};
use pretty_assertions::assert_eq;

fn options() -> ParseOptions {
    ParseOptions::default().with_ids(Arc::new(SequenceIds::new("gen-")))
}

const FEED: &str = r#"{
  "news": [
    {
      "sophoraId": "wahl-100",
      "externalId": "tagesschau_fm-story-wahl",
      "title": "Wahlergebnis steht fest",
      "topline": "Landtagswahl",
      "firstSentence": "Die Stimmen sind ausgezählt.",
      "date": "2024-09-22T18:00:00.000+02:00",
      "type": "story",
      "regionId": 0,
      "tags": [{"tag": "Wahl"}, {"tag": "Brandenburg"}],
      "geotags": [{"tag": "Potsdam"}],
      "breakingNews": true,
      "ressort": "inland",
      "content": [
        {"value": "<strong>Potsdam:</strong> Die Wahl ist entschieden.", "type": "text"},
        {"value": "Reaktionen", "type": "headline"},
        {"quotation": {"text": "Ein guter Tag"}, "type": "quotation"},
        {"type": "mystery_widget", "value": "skip me"},
        {"type": "related", "related": [
          {"title": "Mehr zur Wahl", "date": "2024-09-21T10:00:00.000+02:00", "type": "story",
           "details": "https://example.org/api/wahl.json"}
        ]}
      ],
      "teaserImage": {
        "alttext": "Wahlurne",
        "imageVariants": {"16x9-256": "https://img/256.jpg", "16x9-1920": "https://img/1920.jpg"}
      }
    },
    {
      "externalId": "live-1",
      "title": "tagesschau24",
      "type": "video",
      "streams": {"h264s": "https://s/small.mp4", "adaptivestreaming": "https://s/master.m3u8"}
    },
    {"title": "Wetter", "date": 1727020800000}
  ],
  "regional": [
    {"externalId": "hessen-1", "title": "Hessen aktuell", "type": "story",
     "date": "2024-09-22T08:00:00.000+02:00", "regionIds": [7]},
    {"externalId": "bayern-1", "title": "Bayern aktuell", "type": "story",
     "date": "2024-09-22T09:00:00.000+02:00", "regionIds": [2]}
  ],
  "newStoriesCountLink": "https://example.org/count",
  "type": "news"
}"#;

#[test]
fn test_full_feed_document() {
    let blob = Blob::from_slice(FEED.as_bytes(), &options().with_allowed_regions([7])).unwrap();
    assert_eq!(blob.national_news().len(), 3);
    assert_eq!(blob.regional_news().len(), 1);

    let story = blob.find("tagesschau_fm-story-wahl").unwrap();
    assert_eq!(story.sophora_id.as_deref(), Some("wahl-100"));
    assert_eq!(story.article_type, Some(ArticleType::Story));
    assert!(story.regions.is_empty());
    assert!(story.breaking_news);
    assert!(story.tags.contains("Wahl"));
    assert!(story.geotags.contains("Potsdam"));
    assert_eq!(
        story.date.map(|d| d.to_rfc3339()),
        Some("2024-09-22T16:00:00+00:00".to_string())
    );
}

#[test]
fn test_content_elements_in_order() {
    let blob = Blob::from_slice(FEED.as_bytes(), &options()).unwrap();
    let story = blob.find("tagesschau_fm-story-wahl").unwrap();
    let content = story.content.as_ref().unwrap();

    let kinds: Vec<&str> = content
        .elements()
        .iter()
        .map(|e| match &e.kind {
            ElementKind::Text(_) => "text",
            ElementKind::Headline(_) => "headline",
            ElementKind::Quotation(_) => "quotation",
            ElementKind::Related(_) => "related",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["text", "headline", "quotation", "related"]);

    // skipped elements still count for seq
    let seqs: Vec<usize> = content.elements().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 4]);

    assert!(content.html().contains("<h3>Reaktionen</h3>"));
    assert!(content.html().contains("Ein guter Tag"));
    assert!(story.plain_text().contains("Die Wahl ist entschieden."));
    assert!(!story.plain_text().contains("<strong>"));

    let related: Vec<_> = content.related().collect();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].title.as_deref(), Some("Mehr zur Wahl"));
}

#[test]
fn test_live_stream_and_weather() {
    let blob = Blob::from_slice(FEED.as_bytes(), &options()).unwrap();

    let live = blob.find("live-1").unwrap();
    assert!(live.is_live());
    assert_eq!(
        live.best_stream(),
        Some((StreamQuality::Adaptive, "https://s/master.m3u8"))
    );

    let weather = blob
        .national_news()
        .iter()
        .find(|a| a.title.as_deref() == Some("Wetter"))
        .unwrap();
    assert!(weather.is_weather());
    assert!(weather.external_id.starts_with("gen-"));
    assert!(weather.date.is_some());
}

#[test]
fn test_merged_view_puts_live_first() {
    let blob = Blob::from_slice(FEED.as_bytes(), &options().with_allowed_regions([7, 2])).unwrap();
    let all = blob.all_news();
    assert_eq!(all.len(), 5);
    assert!(all[0].is_live());
    // weather goes last even though it is newer than the regional stories
    assert!(all[4].is_weather());
    for pair in all[1..4].windows(2) {
        assert!(pair[0].date >= pair[1].date, "dated articles newest first");
    }
}

#[test]
fn test_region_filter_applies_to_regional_only() {
    let blob = Blob::from_slice(FEED.as_bytes(), &options().with_allowed_regions([2])).unwrap();
    let regional: Vec<&str> = blob.regional_news().iter().map(|a| a.external_id.as_str()).collect();
    assert_eq!(regional, vec!["bayern-1"]);
    assert_eq!(blob.national_news().len(), 3);
}

#[test]
fn test_reader_and_slice_agree() {
    let from_reader = Blob::parse(std::io::Cursor::new(FEED.as_bytes()), &options()).unwrap();
    let from_slice = Blob::from_slice(FEED.as_bytes(), &options()).unwrap();
    let ids = |b: &Blob| -> Vec<String> { b.all_news().iter().map(|a| a.external_id.clone()).collect() };
    assert_eq!(ids(&from_reader), ids(&from_slice));
}

#[test]
fn test_truncated_document_is_malformed() {
    let truncated = &FEED[..FEED.len() / 2];
    assert!(matches!(
        Blob::from_slice(truncated.as_bytes(), &options()),
        Err(ParseError::Malformed { .. })
    ));
}

#[test]
fn test_empty_document() {
    let blob = Blob::from_slice(b"{}", &options()).unwrap();
    assert!(blob.is_empty());
    assert!(blob.date().is_none());
    assert!(blob.all_news().is_empty());
}
