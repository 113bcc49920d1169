//! Parsing of one article object.

use std::fmt;
use std::io::Read;

use serde::de::{DeserializeSeed, Deserializer, IgnoredAny, MapAccess, Visitor};

use super::content::ContentSeed;
use super::elements::{FirstImage, Flag, ImageWire, Lenient, MaybeDate, RegionIds, StreamMap, Tags};
use super::error::ParseError;
use super::options::{ParseOptions, TextField};
use crate::model::{Article, ArticleType, TeaserImage};

/// Region id meaning "no region".
const NO_REGION: u16 = 0;

/// Parses a single article object from a reader.
///
/// # Errors
///
/// Returns [`ParseError::Malformed`] if the document is not a JSON object or
/// is structurally broken, [`ParseError::Stream`] if reading fails.
pub fn parse_article<R: Read>(reader: R, options: &ParseOptions) -> Result<Article, ParseError> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    let article = ArticleSeed { options }.deserialize(&mut de)?;
    de.end()?;
    Ok(article)
}

/// Deserializes one article object.
pub(crate) struct ArticleSeed<'a> {
    pub options: &'a ParseOptions,
}

impl<'de> DeserializeSeed<'de> for ArticleSeed<'_> {
    type Value = Article;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Article, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for ArticleSeed<'_> {
    type Value = Article;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an article object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Article, A::Error> {
        let options = self.options;
        let mut article = Article {
            id: options.ids.next_local_id(),
            ..Article::default()
        };
        let mut external_id = None;
        let mut first_image: Option<TeaserImage> = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "externalId" => {
                    external_id = map
                        .next_value::<Lenient>()?
                        .into_inner()
                        .map(|id| id.trim().to_string())
                        .filter(|id| !id.is_empty())
                }
                "sophoraId" => article.sophora_id = map.next_value::<Lenient>()?.into_inner(),
                "title" => {
                    article.title = options.headline(TextField::Title, map.next_value::<Lenient>()?.into_inner())
                }
                "topline" => {
                    article.topline =
                        options.headline(TextField::Topline, map.next_value::<Lenient>()?.into_inner())
                }
                "firstSentence" => {
                    article.first_sentence =
                        options.headline(TextField::FirstSentence, map.next_value::<Lenient>()?.into_inner())
                }
                "shorttext" => {
                    article.shorttext =
                        options.headline(TextField::Shorttext, map.next_value::<Lenient>()?.into_inner())
                }
                "date" => article.date = map.next_value::<MaybeDate>()?.parse(),
                "type" => {
                    let tag = map.next_value::<Lenient>()?.into_inner();
                    article.article_type = tag.as_deref().and_then(ArticleType::from_wire);
                    if article.article_type.is_none() {
                        if let Some(tag) = tag {
                            tracing::debug!(article_type = %tag, "Unknown article type, treating as untyped");
                        }
                    }
                }
                "regionId" | "regionIds" => {
                    let RegionIds(ids) = map.next_value()?;
                    article.regions.extend(ids.into_iter().filter(|id| *id != NO_REGION));
                }
                "tags" => article.tags.extend(map.next_value::<Tags>()?.0),
                "geotags" => article.geotags.extend(map.next_value::<Tags>()?.0),
                "streams" => article.streams = map.next_value::<StreamMap>()?.0,
                "content" => article.content = Some(map.next_value_seed(ContentSeed { options })?),
                "teaserImage" => article.teaser_image = map.next_value::<ImageWire>()?.0,
                "images" => first_image = map.next_value::<FirstImage>()?.0,
                "details" => article.details_url = map.next_value::<Lenient>()?.into_inner(),
                "detailsweb" => article.details_web = map.next_value::<Lenient>()?.into_inner(),
                "shareURL" => article.share_url = map.next_value::<Lenient>()?.into_inner(),
                "breakingNews" => article.breaking_news = map.next_value::<Flag>()?.0,
                "ressort" => article.ressort = map.next_value::<Lenient>()?.normalized(),
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        if article.teaser_image.is_none() {
            article.teaser_image = first_image;
        }
        if article.content.as_ref().is_some_and(|c| c.is_empty()) {
            article.content = None;
        }
        article.external_id = match external_id {
            Some(id) => id,
            None => {
                let generated = options.ids.generate_external_id(article.id);
                tracing::debug!(external_id = %generated, "Article without externalId, generated one");
                generated
            }
        };

        Ok(article)
    }
}
