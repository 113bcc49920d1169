use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

// ============================================================================
// Streams
// ============================================================================

/// Quality tier of a media stream, keyed by the upstream `streams` object.
///
/// Variants are declared from best to worst so the derived `Ord` puts the
/// preferred stream first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamQuality {
    /// Adaptive (HLS) stream.
    Adaptive,
    /// H.264, extra large.
    ExtraLarge,
    /// H.264, large.
    Large,
    /// H.264, medium.
    Medium,
    /// H.264, small.
    Small,
}

impl StreamQuality {
    /// Maps an upstream stream key (`h264m`, `adaptivestreaming`, ...) to a tier.
    pub fn from_wire(key: &str) -> Option<Self> {
        match key {
            "adaptivestreaming" => Some(Self::Adaptive),
            "h264xl" => Some(Self::ExtraLarge),
            "h264l" => Some(Self::Large),
            "h264m" => Some(Self::Medium),
            "h264s" => Some(Self::Small),
            _ => None,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Adaptive => "adaptivestreaming",
            Self::ExtraLarge => "h264xl",
            Self::Large => "h264l",
            Self::Medium => "h264m",
            Self::Small => "h264s",
        }
    }
}

/// Quality tier to stream URL.
pub type Streams = BTreeMap<StreamQuality, String>;

/// Returns the best available stream (Adaptive first, Small last).
pub fn best_stream(streams: &Streams) -> Option<(StreamQuality, &str)> {
    streams.iter().next().map(|(q, url)| (*q, url.as_str()))
}

// ============================================================================
// Images
// ============================================================================

/// Width tier of an image variant.
///
/// Variant keys look like `16x9-512` (aspect ratio, then width in pixels).
/// Small is below 480 px, Medium below 960 px, Large from 960 px on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTier {
    Small,
    Medium,
    Large,
}

impl ImageTier {
    pub fn from_width(width: u32) -> Self {
        match width {
            0..=479 => Self::Small,
            480..=959 => Self::Medium,
            _ => Self::Large,
        }
    }
}

/// Preference order used for inline content images.
pub const CONTENT_IMAGE_PREFERENCE: [ImageTier; 3] =
    [ImageTier::Medium, ImageTier::Large, ImageTier::Small];

/// Aspect ratio preferred when several variants share a tier.
const PREFERRED_ASPECT: &str = "16x9";

/// The `imageVariants` map of one image: variant key to URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageVariants {
    variants: BTreeMap<String, String>,
}

/// Splits a variant key into aspect ratio and width.
fn split_variant_key(key: &str) -> Option<(&str, u32)> {
    let (aspect, width) = key.rsplit_once('-')?;
    Some((aspect, width.parse().ok()?))
}

impl ImageVariants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, url: impl Into<String>) {
        self.variants.insert(key.into(), url.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variants.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variants.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Picks a URL following the given tier preference.
    ///
    /// Within a tier the 16x9 variant wins, then the widest one. Falls back to
    /// any variant when no key carries a parseable width.
    pub fn best(&self, preference: &[ImageTier]) -> Option<&str> {
        for tier in preference {
            let candidate = self
                .variants
                .iter()
                .filter_map(|(key, url)| {
                    let (aspect, width) = split_variant_key(key)?;
                    (ImageTier::from_width(width) == *tier).then_some((aspect, width, url))
                })
                .max_by_key(|(aspect, width, _)| (*aspect == PREFERRED_ASPECT, *width));
            if let Some((_, _, url)) = candidate {
                return Some(url.as_str());
            }
        }
        self.variants.values().next().map(String::as_str)
    }
}

/// Teaser image of an article, related stub or media reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeaserImage {
    pub title: Option<String>,
    pub alttext: Option<String>,
    pub copyright: Option<String>,
    pub variants: ImageVariants,
}

impl TeaserImage {
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty() && self.title.is_none() && self.alttext.is_none()
    }
}

// ============================================================================
// Media references and related stubs
// ============================================================================

/// A video or audio reference embedded in article content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaRef {
    pub title: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub copyright: Option<String>,
    pub streams: Streams,
    /// Single stream URL used by audio references.
    pub stream: Option<String>,
    pub teaser_image: Option<TeaserImage>,
}

impl MediaRef {
    /// Playable URL: the single stream if present, else the best tier.
    pub fn playable_url(&self) -> Option<&str> {
        self.stream
            .as_deref()
            .or_else(|| best_stream(&self.streams).map(|(_, url)| url))
    }
}

/// Stub of a related article listed under the content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Related {
    pub title: Option<String>,
    pub topline: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub details_url: Option<String>,
    pub sophora_id: Option<String>,
    pub kind: Option<super::ArticleType>,
    pub teaser_image: Option<TeaserImage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variants(keys: &[&str]) -> ImageVariants {
        let mut v = ImageVariants::new();
        for key in keys {
            v.insert(*key, format!("https://img.example/{key}.jpg"));
        }
        v
    }

    #[test]
    fn test_stream_quality_order() {
        let mut streams = Streams::new();
        streams.insert(StreamQuality::Small, "s".into());
        streams.insert(StreamQuality::ExtraLarge, "xl".into());
        streams.insert(StreamQuality::Medium, "m".into());
        assert_eq!(best_stream(&streams), Some((StreamQuality::ExtraLarge, "xl")));
    }

    #[test]
    fn test_stream_quality_wire_names() {
        for q in [
            StreamQuality::Adaptive,
            StreamQuality::ExtraLarge,
            StreamQuality::Large,
            StreamQuality::Medium,
            StreamQuality::Small,
        ] {
            assert_eq!(StreamQuality::from_wire(q.wire_name()), Some(q));
        }
        assert_eq!(StreamQuality::from_wire("podcastvideom"), None);
    }

    #[test]
    fn test_image_tiers() {
        assert_eq!(ImageTier::from_width(256), ImageTier::Small);
        assert_eq!(ImageTier::from_width(512), ImageTier::Medium);
        assert_eq!(ImageTier::from_width(960), ImageTier::Large);
    }

    #[test]
    fn test_best_prefers_medium_then_large_then_small() {
        let v = variants(&["16x9-256", "16x9-512", "16x9-1920"]);
        assert_eq!(v.best(&CONTENT_IMAGE_PREFERENCE), Some("https://img.example/16x9-512.jpg"));

        let v = variants(&["16x9-256", "16x9-1920"]);
        assert_eq!(v.best(&CONTENT_IMAGE_PREFERENCE), Some("https://img.example/16x9-1920.jpg"));

        let v = variants(&["1x1-144"]);
        assert_eq!(v.best(&CONTENT_IMAGE_PREFERENCE), Some("https://img.example/1x1-144.jpg"));
    }

    #[test]
    fn test_best_prefers_16x9_within_tier() {
        let v = variants(&["1x1-640", "16x9-512", "portraet-900"]);
        assert_eq!(v.best(&[ImageTier::Medium]), Some("https://img.example/16x9-512.jpg"));
    }

    #[test]
    fn test_best_falls_back_to_unparseable_keys() {
        let v = variants(&["original"]);
        assert_eq!(v.best(&CONTENT_IMAGE_PREFERENCE), Some("https://img.example/original.jpg"));
        assert_eq!(ImageVariants::new().best(&CONTENT_IMAGE_PREFERENCE), None);
    }

    #[test]
    fn test_media_playable_url() {
        let mut media = MediaRef::default();
        assert_eq!(media.playable_url(), None);
        media.streams.insert(StreamQuality::Medium, "m".into());
        assert_eq!(media.playable_url(), Some("m"));
        media.stream = Some("audio.mp3".into());
        assert_eq!(media.playable_url(), Some("audio.mp3"));
    }
}
