use url::Url;

use super::media::{ImageVariants, MediaRef, Related};

/// One item of a content list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub text: String,
    /// Resolved link target; `None` when the item had no usable link.
    pub url: Option<Url>,
}

/// A titled list of (usually linked) items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBlock {
    pub title: Option<String>,
    pub items: Vec<ListItem>,
}

impl ListBlock {
    /// True if at least one item links somewhere usable.
    pub fn has_links(&self) -> bool {
        self.items.iter().any(|item| item.url.is_some())
    }
}

/// The single internal link of a box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxLink {
    pub text: String,
    /// Resolved target; `None` when the href was empty or unusable.
    pub url: Option<Url>,
}

/// A highlighted info box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxBlock {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub text: Option<String>,
    pub source: Option<String>,
    pub image: Option<ImageVariants>,
    pub link: Option<BoxLink>,
}

/// One image of a gallery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryItem {
    pub title: Option<String>,
    pub alttext: Option<String>,
    pub copyright: Option<String>,
    pub variants: ImageVariants,
}

/// Payload of a content element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    /// Paragraph HTML.
    Text(String),
    /// Heading text (markup removed).
    Headline(String),
    Quotation(String),
    List(ListBlock),
    Box(BoxBlock),
    Gallery(Vec<GalleryItem>),
    Video(MediaRef),
    Audio(MediaRef),
    Related(Vec<Related>),
}

/// A content element together with its index in the upstream array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentElement {
    /// Position in the original `content` array, counting skipped elements.
    pub seq: usize,
    pub kind: ElementKind,
}

/// The rich body of an article.
///
/// The rendered HTML and plain text are built once by the content assembler
/// and never change afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    elements: Vec<ContentElement>,
    html: String,
    plain: String,
}

impl Content {
    pub(crate) fn new(elements: Vec<ContentElement>, html: String, plain: String) -> Self {
        Self {
            elements,
            html,
            plain,
        }
    }

    /// Rendered HTML of the textual elements.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Plain text of the textual elements.
    pub fn plain_text(&self) -> &str {
        &self.plain
    }

    /// Elements in their original order.
    pub fn elements(&self) -> &[ContentElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn related(&self) -> impl Iterator<Item = &Related> {
        self.elements.iter().flat_map(|e| match &e.kind {
            ElementKind::Related(items) => items.as_slice(),
            _ => &[][..],
        })
    }

    pub fn videos(&self) -> impl Iterator<Item = &MediaRef> {
        self.elements.iter().filter_map(|e| match &e.kind {
            ElementKind::Video(media) => Some(media),
            _ => None,
        })
    }

    pub fn audios(&self) -> impl Iterator<Item = &MediaRef> {
        self.elements.iter().filter_map(|e| match &e.kind {
            ElementKind::Audio(media) => Some(media),
            _ => None,
        })
    }
}
