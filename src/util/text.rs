use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static tag pattern"))
}

fn block_break_pattern() -> &'static Regex {
    static BREAK: OnceLock<Regex> = OnceLock::new();
    BREAK.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</p\s*>|</li\s*>|</h[1-6]\s*>").expect("static break pattern")
    })
}

fn list_item_pattern() -> &'static Regex {
    static ITEM: OnceLock<Regex> = OnceLock::new();
    ITEM.get_or_init(|| Regex::new(r"(?i)<li(\s[^>]*)?>").expect("static list item pattern"))
}

fn non_word_pattern() -> &'static Regex {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    NON_WORD.get_or_init(|| Regex::new(r"\W+").expect("static non-word pattern"))
}

/// Whitespace characters that are folded into a plain ASCII space.
fn is_odd_space(c: char) -> bool {
    matches!(
        c,
        '\t' | '\u{00A0}' | '\u{1680}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}'
    )
}

/// Invisible characters that are dropped entirely (zero-width marks, BOM, soft hyphen).
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}' | '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}'
    ) || (c.is_control() && c != '\n' && c != '\t')
}

/// Decodes HTML entities (`&amp;`, `&#8222;`, `&quot;` ...).
///
/// Returns `Cow::Borrowed` when the input contains no entity.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    html_escape::decode_html_entities(s)
}

/// Folds odd whitespace into plain spaces and trims the result.
///
/// - Non-breaking, thin, ideographic spaces and tabs become `' '`
/// - Zero-width characters, soft hyphens, BOM and control characters are removed
/// - Runs of spaces collapse into one; spaces around a newline are dropped
/// - Leading and trailing whitespace is trimmed
///
/// Newlines are preserved so paragraph structure survives. `\r\n` and a lone
/// `\r` each count as one newline.
///
/// Returns `Cow::Borrowed` when the input is already clean (common case).
pub fn eliminate_odd_whitespace(s: &str) -> Cow<'_, str> {
    let needs_work = s.chars().any(|c| is_odd_space(c) || is_invisible(c) || c == '\r')
        || s.contains("  ")
        || s.contains(" \n")
        || s.contains("\n ")
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace);

    if !needs_work {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;

    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        // CRLF and lone CR both count as one line break
        let c = match c {
            '\r' if chars.peek() == Some(&'\n') => continue,
            '\r' => '\n',
            c => c,
        };
        if is_invisible(c) {
            continue;
        }
        if c == ' ' || is_odd_space(c) {
            pending_space = true;
            continue;
        }
        if c == '\n' {
            // spaces next to a newline are dropped
            pending_space = false;
            out.push('\n');
            continue;
        }
        if pending_space && !out.is_empty() && !out.ends_with('\n') {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    let trimmed = out.trim();
    if trimmed.len() == out.len() {
        Cow::Owned(out)
    } else {
        Cow::Owned(trimmed.to_string())
    }
}

/// Entity decoding followed by whitespace folding; the treatment every text field gets.
///
/// Returns `None` for input that is empty after normalization.
pub fn normalize_text(raw: &str) -> Option<String> {
    let decoded = decode_entities(raw);
    let cleaned = eliminate_odd_whitespace(&decoded);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.into_owned())
    }
}

/// Replaces `\r\n` and lone `\r` with `\n`.
pub fn normalize_line_breaks(s: &str) -> Cow<'_, str> {
    if !s.contains('\r') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Strips HTML markup, turning block ends (`<br>`, `</p>`, `</li>`, `</hN>`) into newlines
/// and list items into bullet lines, then decodes entities and folds whitespace.
pub fn strip_html(html: &str) -> String {
    let with_bullets = list_item_pattern().replace_all(html, "• ");
    let with_breaks = block_break_pattern().replace_all(&with_bullets, "\n");
    let without_tags = tag_pattern().replace_all(&with_breaks, "");
    let decoded = decode_entities(&without_tags);
    let folded = eliminate_odd_whitespace(&decoded);

    // collapse blank-line runs left behind by nested blocks
    let mut out = String::with_capacity(folded.len());
    let mut newlines = 0;
    for c in folded.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

/// Removes `<ul>`/`<ol>` list markup from an HTML fragment, keeping item text
/// as bullet lines separated by `<br>`.
pub fn strip_html_lists(html: &str) -> String {
    static LIST: OnceLock<Regex> = OnceLock::new();
    let list = LIST.get_or_init(|| Regex::new(r"(?i)</?(ul|ol)(\s[^>]*)?>").expect("static list pattern"));
    static ITEM_END: OnceLock<Regex> = OnceLock::new();
    let item_end = ITEM_END.get_or_init(|| Regex::new(r"(?i)</li\s*>").expect("static item end pattern"));

    let without_lists = list.replace_all(html, "");
    let bullets = list_item_pattern().replace_all(&without_lists, "• ");
    item_end.replace_all(&bullets, "<br>").into_owned()
}

/// Removes `<a>` tags from an HTML fragment while keeping the link text.
pub fn strip_html_links(html: &str) -> Cow<'_, str> {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    let anchor = ANCHOR.get_or_init(|| Regex::new(r"(?i)</?a(\s[^>]*)?>").expect("static anchor pattern"));
    anchor.replace_all(html, "")
}

/// Drops every character outside printable ASCII (`0x20..=0x7E`) and the
/// Latin-1 supplement (`0xA0..=0xFF`).
///
/// Used for user-entered filter phrases.
pub fn sanitize_phrase(s: &str) -> Cow<'_, str> {
    let keep = |c: char| matches!(c as u32, 0x20..=0x7E | 0xA0..=0xFF);
    if s.chars().all(keep) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| keep(c)).collect())
}

/// Splits text on runs of non-word characters, skipping empty tokens.
pub fn split_words(s: &str) -> impl Iterator<Item = &str> {
    non_word_pattern().split(s).filter(|t| !t.is_empty())
}
