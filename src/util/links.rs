use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

use super::text::{eliminate_odd_whitespace, strip_html};

/// Errors that can occur while resolving a link target.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LinkError {
    /// The href is empty or whitespace only.
    #[error("Empty link target")]
    Empty,
    /// The href could not be parsed, or is relative without a base URL.
    #[error("Invalid link target: {0}")]
    Invalid(#[from] url::ParseError),
    /// The href uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// A link extracted from an HTML fragment such as `<a href="...">Text</a>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Anchor {
    /// Raw `href` attribute value, entity-decoded and trimmed. May be empty.
    pub href: String,
    /// Link text with markup removed.
    pub text: String,
}

fn anchor_pattern() -> &'static Regex {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    ANCHOR.get_or_init(|| {
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)
            .expect("static anchor pattern")
    })
}

/// Extracts the first `<a href>` anchor from an HTML fragment.
///
/// Returns `None` if the fragment contains no anchor at all. An anchor with an
/// empty `href` is still returned (with `href == ""`) so callers can tell
/// "no link" apart from "unusable link".
pub fn parse_anchor(html: &str) -> Option<Anchor> {
    let caps = anchor_pattern().captures(html)?;
    let href = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let href = super::text::decode_entities(href);
    let text = caps.get(2).map(|m| strip_html(m.as_str())).unwrap_or_default();
    Some(Anchor {
        href: eliminate_odd_whitespace(&href).into_owned(),
        text,
    })
}

/// Resolves an href against an optional base URL.
///
/// Accepts absolute http(s) URLs, and relative paths when `base` is given.
///
/// # Errors
///
/// - [`LinkError::Empty`] for blank input
/// - [`LinkError::Invalid`] for unparseable input or relative input without base
/// - [`LinkError::UnsupportedScheme`] for `mailto:`, `javascript:`, `file:` ...
///
/// # Examples
///
/// ```
/// use newsblob::util::resolve_href;
/// use url::Url;
///
/// let base = Url::parse("https://www.tagesschau.de/").unwrap();
/// let url = resolve_href("/inland/index.html", Some(&base)).unwrap();
/// assert_eq!(url.as_str(), "https://www.tagesschau.de/inland/index.html");
///
/// assert!(resolve_href("javascript:void(0)", Some(&base)).is_err());
/// assert!(resolve_href("  ", Some(&base)).is_err());
/// ```
pub fn resolve_href(href: &str, base: Option<&Url>) -> Result<Url, LinkError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(LinkError::Empty);
    }

    let url = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base.join(href)?,
            None => return Err(LinkError::Invalid(url::ParseError::RelativeUrlWithoutBase)),
        },
        Err(e) => return Err(LinkError::Invalid(e)),
    };

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(LinkError::UnsupportedScheme(scheme.to_owned())),
    }
}

/// Extracts an anchor and resolves its target in one go.
///
/// Returns the anchor text and the resolved URL, or `None` for the URL when the
/// target is unusable.
pub fn resolve_anchor(html: &str, base: Option<&Url>) -> Option<(String, Option<Url>)> {
    let anchor = parse_anchor(html)?;
    let url = match resolve_href(&anchor.href, base) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::debug!(href = %anchor.href, error = %e, "Unusable link target");
            None
        }
    };
    Some((anchor.text, url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.tagesschau.de/").unwrap()
    }

    #[test]
    fn test_parse_anchor() {
        let anchor = parse_anchor("<a href=\"https://example.com/a\" type=\"intern\">Mehr <b>dazu</b></a>").unwrap();
        assert_eq!(anchor.href, "https://example.com/a");
        assert_eq!(anchor.text, "Mehr dazu");
    }

    #[test]
    fn test_parse_anchor_single_quotes_and_entities() {
        let anchor = parse_anchor("<A HREF='/x?a=1&amp;b=2'>X</A>").unwrap();
        assert_eq!(anchor.href, "/x?a=1&b=2");
        assert_eq!(anchor.text, "X");
    }

    #[test]
    fn test_parse_anchor_empty_href() {
        let anchor = parse_anchor("<a href=\"\">Kaputt</a>").unwrap();
        assert_eq!(anchor.href, "");
    }

    #[test]
    fn test_parse_anchor_none_without_link() {
        assert!(parse_anchor("Nur Text").is_none());
    }

    #[test]
    fn test_resolve_absolute() {
        let url = resolve_href("https://example.com/feed", None).unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_resolve_relative_needs_base() {
        assert!(matches!(
            resolve_href("/inland", None),
            Err(LinkError::Invalid(url::ParseError::RelativeUrlWithoutBase))
        ));
        let url = resolve_href("/inland", Some(&base())).unwrap();
        assert_eq!(url.as_str(), "https://www.tagesschau.de/inland");
    }

    #[test]
    fn test_resolve_rejects_schemes() {
        assert!(matches!(
            resolve_href("mailto:someone@example.com", None),
            Err(LinkError::UnsupportedScheme(s)) if s == "mailto"
        ));
        assert!(matches!(
            resolve_href("file:///etc/passwd", Some(&base())),
            Err(LinkError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_resolve_empty() {
        assert_eq!(resolve_href("", Some(&base())), Err(LinkError::Empty));
    }

    #[test]
    fn test_resolve_anchor_unusable() {
        let (text, url) = resolve_anchor("<a href=\"\">Text</a>", Some(&base())).unwrap();
        assert_eq!(text, "Text");
        assert!(url.is_none());
    }
}
