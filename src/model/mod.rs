//! Immutable value types produced by the feed parser.
//!
//! - [`Article`]: one feed item; identity is its external id
//! - [`Content`]: ordered content elements plus rendered HTML and plain text
//! - media types: streams, image variants, teaser images, video/audio references
//!
//! Nothing in here mutates after parsing. Rendering, filtering and notification
//! code only ever reads these values.

mod article;
mod content;
mod media;

pub use article::{feed_order, sort_for_feed, Article, ArticleType};
pub use content::{
    BoxBlock, BoxLink, Content, ContentElement, ElementKind, GalleryItem, ListBlock, ListItem,
};
pub use media::{
    best_stream, ImageTier, ImageVariants, MediaRef, Related, StreamQuality, Streams, TeaserImage,
    CONTENT_IMAGE_PREFERENCE,
};
