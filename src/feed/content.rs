//! Content assembly: the `content` array of an article.
//!
//! Elements are parsed in order, each keeping its index in the upstream array.
//! Textual elements are rendered into an HTML and a plain-text buffer as they
//! arrive; media and related elements only go into the element list.

use std::fmt;
use std::io::Read;

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};

use super::elements::{
    mismatch_as_default, BoxSeed, GalleryWire, Lenient, LenientList, ListSeed,
    MediaWire, QuotationWire, RelatedWire,
};
use super::error::{ElementError, ParseError};
use super::options::ParseOptions;
use crate::model::{
    BoxBlock, Content, ContentElement, ElementKind, GalleryItem, ListBlock, CONTENT_IMAGE_PREFERENCE,
};
use crate::util::{normalize_line_breaks, strip_html, strip_html_links, strip_html_lists};

/// Separator appended after every rendered block.
const HTML_SEPARATOR: &str = "<br>\n";
const PLAIN_SEPARATOR: &str = "\n\n";

/// Opening attribution glyph of a quotation (`❝`).
const QUOTE_GLYPH: &str = "&#10077;";

/// Parses a bare `content` array from a reader.
pub fn parse_content<R: Read>(reader: R, options: &ParseOptions) -> Result<Content, ParseError> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    let content = ContentSeed { options }.deserialize(&mut de)?;
    de.end()?;
    Ok(content)
}

// ============================================================================
// Rendering
// ============================================================================

/// Accumulates the rendered HTML and plain text.
#[derive(Default)]
struct Renderer {
    html: String,
    plain: String,
}

impl Renderer {
    /// Renders one element. Returns an error if the element must be dropped.
    fn render(&mut self, kind: &ElementKind) -> Result<(), ElementError> {
        match kind {
            ElementKind::Text(html) => self.text(html),
            ElementKind::Headline(text) => {
                self.html.push_str("<h3>");
                self.html.push_str(&encode_text(text));
                self.html.push_str("</h3>");
                self.plain.push_str(text);
                self.end_block();
            }
            ElementKind::Quotation(text) => {
                self.html.push_str("<blockquote><span class=\"quote-glyph\">");
                self.html.push_str(QUOTE_GLYPH);
                self.html.push_str("</span> ");
                self.html.push_str(&encode_text(text));
                self.html.push_str("</blockquote>");
                self.plain.push_str(text);
                self.end_block();
            }
            ElementKind::List(list) => self.list(list),
            ElementKind::Box(block) => self.boxed(block)?,
            ElementKind::Gallery(items) => self.gallery(items),
            ElementKind::Video(_) | ElementKind::Audio(_) | ElementKind::Related(_) => {}
        }
        Ok(())
    }

    fn end_block(&mut self) {
        self.html.push_str(HTML_SEPARATOR);
        self.plain.push_str(PLAIN_SEPARATOR);
    }

    fn text(&mut self, html: &str) {
        let html = normalize_line_breaks(html);
        let html = html.trim();
        let plain = strip_html(html);
        if plain.is_empty() {
            return;
        }
        if html.starts_with("<p") {
            self.html.push_str(&html.replace('\n', "<br>"));
        } else {
            self.html.push_str("<p>");
            self.html.push_str(&html.replace('\n', "<br>"));
            self.html.push_str("</p>");
        }
        self.plain.push_str(&plain);
        self.end_block();
    }

    fn list(&mut self, list: &ListBlock) {
        // lists without a single usable link are link farms gone stale
        if !list.has_links() {
            return;
        }
        if let Some(title) = &list.title {
            self.html.push_str("<h4>");
            self.html.push_str(&encode_text(title));
            self.html.push_str("</h4>");
            self.plain.push_str(title);
            self.plain.push('\n');
        }
        self.html.push_str("<ul>");
        for item in &list.items {
            self.html.push_str("<li>");
            match &item.url {
                Some(url) => {
                    self.html.push_str("<a href=\"");
                    self.html.push_str(&encode_double_quoted_attribute(url.as_str()));
                    self.html.push_str("\">");
                    self.html.push_str(&encode_text(&item.text));
                    self.html.push_str("</a>");
                }
                None => self.html.push_str(&encode_text(&item.text)),
            }
            self.html.push_str("</li>");
            self.plain.push_str("• ");
            self.plain.push_str(&item.text);
            self.plain.push('\n');
        }
        self.html.push_str("</ul>");
        trim_trailing(&mut self.plain, "\n");
        self.end_block();
    }

    fn boxed(&mut self, block: &BoxBlock) -> Result<(), ElementError> {
        let link = match &block.link {
            Some(link) => match &link.url {
                Some(url) => Some((link.text.as_str(), url)),
                None => return Err(ElementError::BoxLinkMissing),
            },
            None => None,
        };

        let mut html = String::from("<div class=\"box\">");
        let mut plain = String::new();
        if let Some(title) = &block.title {
            html.push_str("<h4>");
            html.push_str(&encode_text(title));
            html.push_str("</h4>");
            plain.push_str(title);
            plain.push('\n');
        }
        if let Some(subtitle) = &block.subtitle {
            html.push_str("<h5>");
            html.push_str(&encode_text(subtitle));
            html.push_str("</h5>");
            plain.push_str(subtitle);
            plain.push('\n');
        }
        if let Some(src) = block.image.as_ref().and_then(|v| v.best(&CONTENT_IMAGE_PREFERENCE)) {
            html.push_str("<img src=\"");
            html.push_str(&encode_double_quoted_attribute(src));
            html.push_str("\" alt=\"");
            html.push_str(&encode_double_quoted_attribute(block.title.as_deref().unwrap_or_default()));
            html.push_str("\">");
        }
        if let Some(text) = &block.text {
            html.push_str("<div class=\"box-text\">");
            // the box carries its own link; inline anchors and list markup are flattened
            let flat = strip_html_lists(&strip_html_links(&normalize_line_breaks(text)));
            html.push_str(&flat.replace('\n', "<br>"));
            html.push_str("</div>");
            plain.push_str(&strip_html(text));
            plain.push('\n');
        }
        if let Some((text, url)) = link {
            let text = if text.is_empty() { url.as_str() } else { text };
            html.push_str("<p><a href=\"");
            html.push_str(&encode_double_quoted_attribute(url.as_str()));
            html.push_str("\">");
            html.push_str(&encode_text(text));
            html.push_str("</a></p>");
        }
        if let Some(source) = &block.source {
            html.push_str("<p class=\"box-source\">");
            html.push_str(&encode_text(source));
            html.push_str("</p>");
        }
        html.push_str("</div>");

        self.html.push_str(&html);
        trim_trailing(&mut plain, "\n");
        self.plain.push_str(&plain);
        self.end_block();
        Ok(())
    }

    fn gallery(&mut self, items: &[GalleryItem]) {
        let mut rendered = false;
        for item in items {
            let Some(src) = item.variants.best(&CONTENT_IMAGE_PREFERENCE) else {
                continue;
            };
            let alt = item.alttext.as_deref().or(item.title.as_deref()).unwrap_or_default();
            self.html.push_str("<figure><img src=\"");
            self.html.push_str(&encode_double_quoted_attribute(src));
            self.html.push_str("\" alt=\"");
            self.html.push_str(&encode_double_quoted_attribute(alt));
            self.html.push_str("\">");
            if let Some(title) = &item.title {
                self.html.push_str("<figcaption>");
                self.html.push_str(&encode_text(title));
                self.html.push_str("</figcaption>");
                self.plain.push_str(title);
                self.plain.push('\n');
            }
            self.html.push_str("</figure>");
            rendered = true;
        }
        if rendered {
            trim_trailing(&mut self.plain, "\n");
            self.end_block();
        }
    }

    fn finish(mut self) -> (String, String) {
        trim_trailing(&mut self.html, HTML_SEPARATOR);
        trim_trailing(&mut self.plain, PLAIN_SEPARATOR);
        (self.html, self.plain)
    }
}

/// Removes trailing whitespace and every trailing copy of `separator`.
fn trim_trailing(buf: &mut String, separator: &str) {
    loop {
        let trimmed = buf.trim_end().len();
        buf.truncate(trimmed);
        match buf.strip_suffix(separator.trim_end()) {
            Some(rest) if !separator.trim_end().is_empty() => {
                let len = rest.len();
                buf.truncate(len);
            }
            _ => break,
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Deserializes the `content` array into a [`Content`].
pub(crate) struct ContentSeed<'a> {
    pub options: &'a ParseOptions,
}

impl<'de> DeserializeSeed<'de> for ContentSeed<'_> {
    type Value = Content;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Content, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ContentSeed<'_> {
    type Value = Content;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of content elements")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Content, E> {
        Ok(Content::default())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Content, A::Error> {
        let mut elements = Vec::new();
        let mut renderer = Renderer::default();
        let mut seq_index = 0usize;

        while let Some(raw) = seq.next_element_seed(ElementSeed { options: self.options })? {
            let index = seq_index;
            seq_index += 1;

            let Some(kind) = raw.into_kind() else {
                continue;
            };
            if let Err(e) = renderer.render(&kind) {
                tracing::debug!(seq = index, error = %e, "Dropping content element");
                continue;
            }
            elements.push(ContentElement { seq: index, kind });
        }

        let (html, plain) = renderer.finish();
        Ok(Content::new(elements, html, plain))
    }

    mismatch_as_default!('de, Content, Content::default(); bool, ints, float, str, map);
}

/// A content element with all payload keys collected, before dispatch on `type`.
///
/// Keys may arrive in any order, so `type` is only looked at once the object
/// has been read completely.
#[derive(Default)]
struct RawElement {
    kind: Option<String>,
    value: Option<String>,
    quotation: Option<String>,
    list: Option<ListBlock>,
    boxed: Option<BoxBlock>,
    gallery: Option<Vec<GalleryItem>>,
    video: Option<crate::model::MediaRef>,
    audio: Option<crate::model::MediaRef>,
    related: Option<Vec<crate::model::Related>>,
}

impl RawElement {
    fn into_kind(self) -> Option<ElementKind> {
        let kind = self.kind?;
        let element = match kind.as_str() {
            "text" => self.value.map(ElementKind::Text),
            "headline" => self
                .value
                .map(|v| strip_html(&v))
                .filter(|v| !v.is_empty())
                .map(ElementKind::Headline),
            "quotation" => self.quotation.map(ElementKind::Quotation),
            "list" => self.list.map(ElementKind::List),
            "box" => self.boxed.map(ElementKind::Box),
            "image_gallery" => self.gallery.map(ElementKind::Gallery),
            "video" => self.video.map(ElementKind::Video),
            "audio" => self.audio.map(ElementKind::Audio),
            "related" => self.related.map(ElementKind::Related),
            other => {
                tracing::debug!(element_type = other, "Skipping unknown content element type");
                return None;
            }
        };
        if element.is_none() {
            tracing::debug!(element_type = %kind, "Content element without payload");
        }
        element
    }
}

struct ElementSeed<'a> {
    options: &'a ParseOptions,
}

impl<'de> DeserializeSeed<'de> for ElementSeed<'_> {
    type Value = RawElement;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<RawElement, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ElementSeed<'_> {
    type Value = RawElement;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a content element object")
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawElement, E> {
        Ok(RawElement::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawElement, A::Error> {
        let mut raw = RawElement::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "type" => raw.kind = map.next_value::<Lenient>()?.into_inner(),
                "value" => raw.value = map.next_value::<Lenient>()?.into_inner(),
                "quotation" => {
                    raw.quotation = map.next_value::<Option<QuotationWire>>()?.and_then(|q| q.0)
                }
                "list" => raw.list = Some(map.next_value_seed(ListSeed { options: self.options })?),
                "box" => raw.boxed = map.next_value_seed(BoxSeed { options: self.options })?,
                "gallery" => {
                    let items: Vec<GalleryItem> = map
                        .next_value::<LenientList<GalleryWire>>()?
                        .0
                        .into_iter()
                        .map(|g| g.0)
                        .collect();
                    raw.gallery = (!items.is_empty()).then_some(items);
                }
                "video" => raw.video = map.next_value::<MediaWire>()?.0,
                "audio" => raw.audio = map.next_value::<MediaWire>()?.0,
                "related" => {
                    let items: Vec<crate::model::Related> = map
                        .next_value::<LenientList<RelatedWire>>()?
                        .0
                        .into_iter()
                        .filter_map(|r| r.0)
                        .collect();
                    raw.related = (!items.is_empty()).then_some(items);
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(raw)
    }

    mismatch_as_default!('de, RawElement, RawElement::default(); bool, ints, float, str, seq);
}
