//! Streaming parsers for the nested sub-documents of an article.
//!
//! Each parser is a serde `Visitor` (or `DeserializeSeed` when it needs the
//! parse options) that walks one object straight off the token stream.
//! Unknown keys are consumed with [`IgnoredAny`] and never fail the parse.
//! Scalars are read leniently: numbers and booleans where text was expected
//! are stringified, and `null` means absent. Containers of the wrong shape
//! (an array where an object was expected, a string where a list was) are
//! drained and read as empty, so one odd field never fails the document.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use super::date::{parse_raw_date, RawDate};
use super::options::ParseOptions;
use crate::model::{
    ArticleType, BoxBlock, BoxLink, GalleryItem, ImageVariants, ListBlock, ListItem, MediaRef,
    Related, StreamQuality, Streams, TeaserImage,
};
use crate::util::{normalize_text, parse_anchor, resolve_anchor, resolve_href};

/// Drains the remaining entries of a map.
pub(crate) fn skip_map<'de, A: MapAccess<'de>>(map: &mut A) -> Result<(), A::Error> {
    while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
    Ok(())
}

/// Drains the remaining elements of a sequence.
pub(crate) fn skip_seq<'de, A: SeqAccess<'de>>(seq: &mut A) -> Result<(), A::Error> {
    while seq.next_element::<IgnoredAny>()?.is_some() {}
    Ok(())
}

/// Adds `visit_*` methods for input shapes a visitor does not expect. Each
/// one drains its input and returns `$default`.
macro_rules! mismatch_as_default {
    ($de:lifetime, $value:ty, $default:expr; $($shape:ident),+ $(,)?) => {
        $( mismatch_as_default!(@$shape $de, $value, $default); )+
    };
    (@bool $de:lifetime, $value:ty, $default:expr) => {
        fn visit_bool<E: serde::de::Error>(self, _: bool) -> Result<$value, E> {
            Ok($default)
        }
    };
    (@ints $de:lifetime, $value:ty, $default:expr) => {
        fn visit_i64<E: serde::de::Error>(self, _: i64) -> Result<$value, E> {
            Ok($default)
        }

        fn visit_u64<E: serde::de::Error>(self, _: u64) -> Result<$value, E> {
            Ok($default)
        }
    };
    (@float $de:lifetime, $value:ty, $default:expr) => {
        fn visit_f64<E: serde::de::Error>(self, _: f64) -> Result<$value, E> {
            Ok($default)
        }
    };
    (@str $de:lifetime, $value:ty, $default:expr) => {
        fn visit_str<E: serde::de::Error>(self, _: &str) -> Result<$value, E> {
            Ok($default)
        }
    };
    (@unit $de:lifetime, $value:ty, $default:expr) => {
        fn visit_unit<E: serde::de::Error>(self) -> Result<$value, E> {
            Ok($default)
        }
    };
    (@seq $de:lifetime, $value:ty, $default:expr) => {
        fn visit_seq<A: serde::de::SeqAccess<$de>>(self, mut seq: A) -> Result<$value, A::Error> {
            $crate::feed::elements::skip_seq(&mut seq)?;
            Ok($default)
        }
    };
    (@map $de:lifetime, $value:ty, $default:expr) => {
        fn visit_map<A: serde::de::MapAccess<$de>>(self, mut map: A) -> Result<$value, A::Error> {
            $crate::feed::elements::skip_map(&mut map)?;
            Ok($default)
        }
    };
}

pub(crate) use mismatch_as_default;

// ============================================================================
// Scalars
// ============================================================================

/// A text scalar read leniently. Containers and `null` yield `None`.
#[derive(Debug, Default)]
pub(crate) struct Lenient(pub Option<String>);

impl Lenient {
    pub(crate) fn into_inner(self) -> Option<String> {
        self.0
    }

    /// Entity-decoded, whitespace-folded text; `None` when empty.
    pub(crate) fn normalized(self) -> Option<String> {
        self.0.as_deref().and_then(normalize_text)
    }
}

impl<'de> Deserialize<'de> for Lenient {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LenientVisitor;

        impl<'de> Visitor<'de> for LenientVisitor {
            type Value = Lenient;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a text value")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Lenient, E> {
                Ok(Lenient(Some(v.to_owned())))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Lenient, E> {
                Ok(Lenient(Some(v)))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Lenient, E> {
                Ok(Lenient(Some(v.to_string())))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Lenient, E> {
                Ok(Lenient(Some(v.to_string())))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Lenient, E> {
                Ok(Lenient(Some(v.to_string())))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Lenient, E> {
                Ok(Lenient(Some(v.to_string())))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Lenient, E> {
                Ok(Lenient(None))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Lenient, A::Error> {
                skip_seq(&mut seq)?;
                Ok(Lenient(None))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Lenient, A::Error> {
                skip_map(&mut map)?;
                Ok(Lenient(None))
            }
        }

        deserializer.deserialize_any(LenientVisitor)
    }
}

/// A boolean read leniently (`true`, `"true"`, non-zero numbers).
#[derive(Debug, Default)]
pub(crate) struct Flag(pub bool);

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Lenient(text) = Lenient::deserialize(deserializer)?;
        let flag = match text.as_deref().map(str::trim) {
            Some("true") | Some("1") => true,
            Some(other) => other.parse::<f64>().is_ok_and(|n| n != 0.0),
            None => false,
        };
        Ok(Flag(flag))
    }
}

/// A date as text or epoch number; anything else is absent.
#[derive(Debug, Default)]
pub(crate) struct MaybeDate(pub Option<RawDate>);

impl<'de> Deserialize<'de> for MaybeDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DateVisitor;

        impl<'de> Visitor<'de> for DateVisitor {
            type Value = MaybeDate;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a date string or epoch number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MaybeDate, E> {
                Ok(MaybeDate(Some(RawDate::Text(v.to_owned()))))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<MaybeDate, E> {
                Ok(MaybeDate(Some(RawDate::Number(v as f64))))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<MaybeDate, E> {
                Ok(MaybeDate(Some(RawDate::Number(v as f64))))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<MaybeDate, E> {
                Ok(MaybeDate(Some(RawDate::Number(v))))
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<MaybeDate, E> {
                Ok(MaybeDate(None))
            }

            fn visit_unit<E: de::Error>(self) -> Result<MaybeDate, E> {
                Ok(MaybeDate(None))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<MaybeDate, A::Error> {
                skip_seq(&mut seq)?;
                Ok(MaybeDate(None))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<MaybeDate, A::Error> {
                skip_map(&mut map)?;
                Ok(MaybeDate(None))
            }
        }

        deserializer.deserialize_any(DateVisitor)
    }
}

impl MaybeDate {
    pub(crate) fn parse(self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.0.as_ref().and_then(parse_raw_date)
    }
}

// ============================================================================
// Collections of scalars
// ============================================================================

/// Region ids: an array of integers (numeric strings tolerated) or a single integer.
#[derive(Debug, Default)]
pub(crate) struct RegionIds(pub Vec<u16>);

impl<'de> Deserialize<'de> for RegionIds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RegionVisitor;

        impl<'de> Visitor<'de> for RegionVisitor {
            type Value = RegionIds;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("region ids")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RegionIds, E> {
                Ok(RegionIds(u16::try_from(v).into_iter().collect()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RegionIds, E> {
                Ok(RegionIds(u16::try_from(v).into_iter().collect()))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RegionIds, E> {
                Ok(RegionIds(v.trim().parse().into_iter().collect()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<RegionIds, E> {
                Ok(RegionIds::default())
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RegionIds, A::Error> {
                let mut ids = Vec::new();
                while let Some(Lenient(value)) = seq.next_element::<Lenient>()? {
                    match value.as_deref().map(str::trim).map(str::parse::<u16>) {
                        Some(Ok(id)) => ids.push(id),
                        _ => tracing::debug!(value = ?value, "Ignoring unparseable region id"),
                    }
                }
                Ok(RegionIds(ids))
            }

            mismatch_as_default!('de, RegionIds, RegionIds::default(); bool, float, map);
        }

        deserializer.deserialize_any(RegionVisitor)
    }
}

/// Tags: an array of strings or of `{ "tag": "..." }` objects.
#[derive(Debug, Default)]
pub(crate) struct Tags(pub Vec<String>);

impl<'de> Deserialize<'de> for Tags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TagEntry(Option<String>);

        impl<'de> Deserialize<'de> for TagEntry {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct EntryVisitor;

                impl<'de> Visitor<'de> for EntryVisitor {
                    type Value = TagEntry;

                    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str("a tag string or tag object")
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<TagEntry, E> {
                        Ok(TagEntry(normalize_text(v)))
                    }

                    fn visit_unit<E: de::Error>(self) -> Result<TagEntry, E> {
                        Ok(TagEntry(None))
                    }

                    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TagEntry, A::Error> {
                        let mut tag = None;
                        while let Some(key) = map.next_key::<String>()? {
                            if key == "tag" {
                                tag = map.next_value::<Lenient>()?.normalized();
                            } else {
                                map.next_value::<IgnoredAny>()?;
                            }
                        }
                        Ok(TagEntry(tag))
                    }

                    mismatch_as_default!('de, TagEntry, TagEntry(None); bool, ints, float, seq);
                }

                deserializer.deserialize_any(EntryVisitor)
            }
        }

        struct TagsVisitor;

        impl<'de> Visitor<'de> for TagsVisitor {
            type Value = Tags;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of tags")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Tags, E> {
                Ok(Tags::default())
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Tags, A::Error> {
                let mut tags = Vec::new();
                while let Some(TagEntry(tag)) = seq.next_element::<TagEntry>()? {
                    tags.extend(tag);
                }
                Ok(Tags(tags))
            }

            mismatch_as_default!('de, Tags, Tags::default(); bool, ints, float, str, map);
        }

        deserializer.deserialize_any(TagsVisitor)
    }
}

/// The `streams` object: quality key to URL. Unknown qualities are dropped.
#[derive(Debug, Default)]
pub(crate) struct StreamMap(pub Streams);

impl<'de> Deserialize<'de> for StreamMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StreamVisitor;

        impl<'de> Visitor<'de> for StreamVisitor {
            type Value = StreamMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of streams")
            }

            fn visit_unit<E: de::Error>(self) -> Result<StreamMap, E> {
                Ok(StreamMap::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<StreamMap, A::Error> {
                let mut streams = Streams::new();
                while let Some(key) = map.next_key::<String>()? {
                    let url = map.next_value::<Lenient>()?.into_inner();
                    match (StreamQuality::from_wire(&key), url) {
                        (Some(quality), Some(url)) if !url.trim().is_empty() => {
                            streams.insert(quality, url.trim().to_string());
                        }
                        _ => {}
                    }
                }
                Ok(StreamMap(streams))
            }

            mismatch_as_default!('de, StreamMap, StreamMap::default(); bool, ints, float, str, seq);
        }

        deserializer.deserialize_any(StreamVisitor)
    }
}

/// The `imageVariants` object: variant key to URL.
#[derive(Debug, Default)]
pub(crate) struct VariantMap(pub ImageVariants);

impl<'de> Deserialize<'de> for VariantMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct VariantVisitor;

        impl<'de> Visitor<'de> for VariantVisitor {
            type Value = VariantMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of image variants")
            }

            fn visit_unit<E: de::Error>(self) -> Result<VariantMap, E> {
                Ok(VariantMap::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<VariantMap, A::Error> {
                let mut variants = ImageVariants::new();
                while let Some(key) = map.next_key::<String>()? {
                    if let Some(url) = map.next_value::<Lenient>()?.into_inner() {
                        if !url.trim().is_empty() {
                            variants.insert(key, url.trim());
                        }
                    }
                }
                Ok(VariantMap(variants))
            }

            mismatch_as_default!('de, VariantMap, VariantMap::default(); bool, ints, float, str, seq);
        }

        deserializer.deserialize_any(VariantVisitor)
    }
}

// ============================================================================
// Images
// ============================================================================

/// One image object (`teaserImage`, entries of `images`, box images).
pub(crate) struct ImageWire(pub Option<TeaserImage>);

impl<'de> Deserialize<'de> for ImageWire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ImageVisitor;

        impl<'de> Visitor<'de> for ImageVisitor {
            type Value = ImageWire;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an image object")
            }

            fn visit_unit<E: de::Error>(self) -> Result<ImageWire, E> {
                Ok(ImageWire(None))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ImageWire, A::Error> {
                let mut image = TeaserImage::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "title" => image.title = map.next_value::<Lenient>()?.normalized(),
                        "alttext" => image.alttext = map.next_value::<Lenient>()?.normalized(),
                        "copyright" => image.copyright = map.next_value::<Lenient>()?.normalized(),
                        "imageVariants" => image.variants = map.next_value::<VariantMap>()?.0,
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(ImageWire((!image.is_empty()).then_some(image)))
            }

            mismatch_as_default!('de, ImageWire, ImageWire(None); bool, ints, float, str, seq);
        }

        deserializer.deserialize_any(ImageVisitor)
    }
}

/// The `images` array, of which only the first usable entry is kept.
pub(crate) struct FirstImage(pub Option<TeaserImage>);

impl<'de> Deserialize<'de> for FirstImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FirstVisitor;

        impl<'de> Visitor<'de> for FirstVisitor {
            type Value = FirstImage;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of images")
            }

            fn visit_unit<E: de::Error>(self) -> Result<FirstImage, E> {
                Ok(FirstImage(None))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FirstImage, A::Error> {
                let mut first = None;
                while let Some(ImageWire(image)) = seq.next_element::<ImageWire>()? {
                    if first.is_none() {
                        first = image;
                    }
                }
                Ok(FirstImage(first))
            }

            mismatch_as_default!('de, FirstImage, FirstImage(None); bool, ints, float, str, map);
        }

        deserializer.deserialize_any(FirstVisitor)
    }
}

// ============================================================================
// Media references
// ============================================================================

/// Payload of `video` and `audio` elements; `None` unless it is an object.
pub(crate) struct MediaWire(pub Option<MediaRef>);

impl<'de> Deserialize<'de> for MediaWire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MediaVisitor;

        impl<'de> Visitor<'de> for MediaVisitor {
            type Value = MediaWire;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a media object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<MediaWire, A::Error> {
                let mut media = MediaRef::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "title" => media.title = map.next_value::<Lenient>()?.normalized(),
                        "date" => media.date = map.next_value::<MaybeDate>()?.parse(),
                        "copyright" => media.copyright = map.next_value::<Lenient>()?.normalized(),
                        "streams" => media.streams = map.next_value::<StreamMap>()?.0,
                        "stream" => {
                            media.stream = map
                                .next_value::<Lenient>()?
                                .into_inner()
                                .map(|s| s.trim().to_string())
                                .filter(|s| !s.is_empty())
                        }
                        "teaserImage" => media.teaser_image = map.next_value::<ImageWire>()?.0,
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(MediaWire(Some(media)))
            }

            mismatch_as_default!('de, MediaWire, MediaWire(None); bool, ints, float, str, unit, seq);
        }

        deserializer.deserialize_any(MediaVisitor)
    }
}

/// One entry of a `related` element; `None` unless it is an object.
pub(crate) struct RelatedWire(pub Option<Related>);

impl<'de> Deserialize<'de> for RelatedWire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RelatedVisitor;

        impl<'de> Visitor<'de> for RelatedVisitor {
            type Value = RelatedWire;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a related article object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RelatedWire, A::Error> {
                let mut related = Related::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "title" => related.title = map.next_value::<Lenient>()?.normalized(),
                        "topline" => related.topline = map.next_value::<Lenient>()?.normalized(),
                        "date" => related.date = map.next_value::<MaybeDate>()?.parse(),
                        "details" => related.details_url = map.next_value::<Lenient>()?.into_inner(),
                        "sophoraId" => related.sophora_id = map.next_value::<Lenient>()?.into_inner(),
                        "type" => {
                            related.kind = map
                                .next_value::<Lenient>()?
                                .into_inner()
                                .as_deref()
                                .and_then(ArticleType::from_wire)
                        }
                        "teaserImage" => related.teaser_image = map.next_value::<ImageWire>()?.0,
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(RelatedWire(Some(related)))
            }

            mismatch_as_default!('de, RelatedWire, RelatedWire(None); bool, ints, float, str, unit, seq);
        }

        deserializer.deserialize_any(RelatedVisitor)
    }
}

/// An array read entry by entry. Any other shape is an empty list.
pub(crate) struct LenientList<T>(pub Vec<T>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for LenientList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ListVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for ListVisitor<T> {
            type Value = LenientList<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<LenientList<T>, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<T>()? {
                    items.push(item);
                }
                Ok(LenientList(items))
            }

            mismatch_as_default!('de, LenientList<T>, LenientList(Vec::new()); bool, ints, float, str, unit, map);
        }

        deserializer.deserialize_any(ListVisitor(PhantomData))
    }
}

/// One entry of an `image_gallery` element.
pub(crate) struct GalleryWire(pub GalleryItem);

impl<'de> Deserialize<'de> for GalleryWire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ImageWire(image) = ImageWire::deserialize(deserializer)?;
        let image = image.unwrap_or_default();
        Ok(GalleryWire(GalleryItem {
            title: image.title,
            alttext: image.alttext,
            copyright: image.copyright,
            variants: image.variants,
        }))
    }
}

/// Payload of a `quotation` element: `{ "text": "..." }`.
pub(crate) struct QuotationWire(pub Option<String>);

impl<'de> Deserialize<'de> for QuotationWire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QuotationVisitor;

        impl<'de> Visitor<'de> for QuotationVisitor {
            type Value = QuotationWire;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a quotation object")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<QuotationWire, E> {
                Ok(QuotationWire(normalize_text(v)))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<QuotationWire, A::Error> {
                let mut text = None;
                while let Some(key) = map.next_key::<String>()? {
                    if key == "text" {
                        text = map.next_value::<Lenient>()?.normalized();
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(QuotationWire(text))
            }

            mismatch_as_default!('de, QuotationWire, QuotationWire(None); bool, ints, float, unit, seq);
        }

        deserializer.deserialize_any(QuotationVisitor)
    }
}

// ============================================================================
// Lists and boxes (need the link base)
// ============================================================================

/// Payload of a `list` element: `{ "title": .., "items": [{ "url": "<a href>" }] }`.
pub(crate) struct ListSeed<'a> {
    pub options: &'a ParseOptions,
}

impl<'de> DeserializeSeed<'de> for ListSeed<'_> {
    type Value = ListBlock;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<ListBlock, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ListSeed<'_> {
    type Value = ListBlock;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list object")
    }

    fn visit_unit<E: de::Error>(self) -> Result<ListBlock, E> {
        Ok(ListBlock::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ListBlock, A::Error> {
        let mut list = ListBlock::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "title" => list.title = map.next_value::<Lenient>()?.normalized(),
                "items" => list.items = map.next_value_seed(ListItemsSeed { options: self.options })?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(list)
    }

    mismatch_as_default!('de, ListBlock, ListBlock::default(); bool, ints, float, str, seq);
}

struct ListItemsSeed<'a> {
    options: &'a ParseOptions,
}

impl<'de> DeserializeSeed<'de> for ListItemsSeed<'_> {
    type Value = Vec<ListItem>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Vec<ListItem>, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ListItemsSeed<'_> {
    type Value = Vec<ListItem>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of items")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Vec<ListItem>, E> {
        Ok(Vec::new())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<ListItem>, A::Error> {
        let mut items = Vec::new();
        while let Some(raw) = seq.next_element::<ListItemWire>()? {
            if let Some(item) = raw.resolve(self.options) {
                items.push(item);
            }
        }
        Ok(items)
    }

    mismatch_as_default!('de, Vec<ListItem>, Vec::new(); bool, ints, float, str, map);
}

/// A list item before link resolution.
#[derive(Default)]
struct ListItemWire {
    url: Option<String>,
    text: Option<String>,
}

impl ListItemWire {
    fn resolve(self, options: &ParseOptions) -> Option<ListItem> {
        let base = options.link_base.as_ref();
        let raw = self.url?;
        if let Some((anchor_text, url)) = resolve_anchor(&raw, base) {
            let text = self.text.or_else(|| normalize_text(&anchor_text))?;
            return Some(ListItem { text, url });
        }
        // without markup only an absolute URL counts as a link
        let url = resolve_href(&raw, None).ok();
        let text = self.text.or_else(|| normalize_text(&raw))?;
        Some(ListItem { text, url })
    }
}

impl<'de> Deserialize<'de> for ListItemWire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ItemVisitor;

        impl<'de> Visitor<'de> for ItemVisitor {
            type Value = ListItemWire;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list item")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ListItemWire, E> {
                Ok(ListItemWire {
                    url: Some(v.to_owned()),
                    text: None,
                })
            }

            fn visit_unit<E: de::Error>(self) -> Result<ListItemWire, E> {
                Ok(ListItemWire::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ListItemWire, A::Error> {
                let mut item = ListItemWire::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "url" => item.url = map.next_value::<Lenient>()?.into_inner(),
                        "text" | "title" => item.text = map.next_value::<Lenient>()?.normalized(),
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(item)
            }

            mismatch_as_default!('de, ListItemWire, ListItemWire::default(); bool, ints, float, seq);
        }

        deserializer.deserialize_any(ItemVisitor)
    }
}

/// Payload of a `box` element.
pub(crate) struct BoxSeed<'a> {
    pub options: &'a ParseOptions,
}

impl<'de> DeserializeSeed<'de> for BoxSeed<'_> {
    type Value = Option<BoxBlock>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Option<BoxBlock>, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for BoxSeed<'_> {
    type Value = Option<BoxBlock>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a box object")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Option<BoxBlock>, E> {
        Ok(None)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Option<BoxBlock>, A::Error> {
        let mut block = BoxBlock::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "title" => block.title = map.next_value::<Lenient>()?.normalized(),
                "subtitle" => block.subtitle = map.next_value::<Lenient>()?.normalized(),
                "text" => {
                    block.text = map
                        .next_value::<Lenient>()?
                        .into_inner()
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                }
                "source" => block.source = map.next_value::<Lenient>()?.normalized(),
                "images" | "image" => {
                    block.image = map
                        .next_value::<ImageWire>()?
                        .0
                        .map(|img| img.variants)
                        .filter(|v| !v.is_empty())
                }
                "link" => {
                    let raw = map.next_value::<Lenient>()?.into_inner();
                    block.link = raw
                        .filter(|raw| !raw.trim().is_empty())
                        .map(|raw| box_link(&raw, self.options));
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(Some(block))
    }

    mismatch_as_default!('de, Option<BoxBlock>, None; bool, ints, float, str, seq);
}

/// Resolves the `link` of a box. An unusable target yields `url == None`.
fn box_link(raw: &str, options: &ParseOptions) -> BoxLink {
    let base = options.link_base.as_ref();
    match parse_anchor(raw) {
        Some(anchor) => BoxLink {
            url: resolve_href(&anchor.href, base).ok(),
            text: anchor.text,
        },
        None => BoxLink {
            url: resolve_href(raw, base).ok(),
            text: String::new(),
        },
    }
}
