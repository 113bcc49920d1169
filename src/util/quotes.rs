//! German quotation-mark correction.
//!
//! Upstream texts mix straight quotes (`"`), English curly quotes (`“ ”`) and
//! German low-high quotes (`„ “`). [`correct_quotation_marks`] rewrites every
//! double quotation mark into the German pair, deciding opening vs. closing from
//! the preceding output character. Markup inside `<...>` is left untouched so
//! attribute values in HTML fragments survive.

use std::borrow::Cow;

/// German opening quotation mark (low double quote).
pub const OPENING: char = '\u{201E}';
/// German closing quotation mark (high double quote).
pub const CLOSING: char = '\u{201C}';

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}')
}

/// Characters after which a quotation mark opens a quote.
fn opens_after(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => {
            c.is_whitespace()
                || matches!(c, '(' | '[' | '{' | '-' | '\u{2013}' | '\u{2014}' | '/' | ':' | OPENING)
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    Tag,
}

/// Rewrites double quotation marks into German `„…“` pairs.
///
/// Returns `Cow::Borrowed` when the text contains no quotation mark or is already correct.
///
/// # Examples
///
/// ```
/// use newsblob::util::correct_quotation_marks;
///
/// assert_eq!(
///     correct_quotation_marks("Richtung \"Arena\""),
///     "Richtung \u{201E}Arena\u{201C}"
/// );
/// ```
pub fn correct_quotation_marks(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_quote) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 8);
    let mut state = State::Text;
    let mut prev: Option<char> = None;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Tag => {
                if c == '>' {
                    state = State::Text;
                }
                out.push(c);
            }
            State::Text => {
                if c == '<' && chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || *n == '/') {
                    state = State::Tag;
                    out.push(c);
                    // tags do not count as preceding text
                    continue;
                }
                let emitted = if is_quote(c) {
                    if opens_after(prev) {
                        OPENING
                    } else {
                        CLOSING
                    }
                } else {
                    c
                };
                out.push(emitted);
                prev = Some(emitted);
            }
        }
    }

    if out == s {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_straight_quotes_in_sentence() {
        assert_eq!(
            correct_quotation_marks("Dort zeigt ein Verkehrsschild in Richtung \"Arena\""),
            "Dort zeigt ein Verkehrsschild in Richtung „Arena“"
        );
    }

    #[test]
    fn test_english_quotes_converted() {
        assert_eq!(
            correct_quotation_marks("Er sagte: “Wir bleiben.” Dann ging er."),
            "Er sagte: „Wir bleiben.“ Dann ging er."
        );
    }

    #[test]
    fn test_wrong_opening_mark() {
        assert_eq!(correct_quotation_marks("Das “Ende“ naht"), "Das „Ende“ naht");
    }

    #[test]
    fn test_quote_at_start_and_in_parentheses() {
        assert_eq!(correct_quotation_marks("\"Ja\", sagte sie"), "„Ja“, sagte sie");
        assert_eq!(correct_quotation_marks("(\"Nein\")"), "(„Nein“)");
    }

    #[test]
    fn test_correct_text_is_borrowed() {
        assert!(matches!(correct_quotation_marks("ohne Zitat"), Cow::Borrowed(_)));
        assert!(matches!(correct_quotation_marks("schon „richtig“"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_markup_attributes_untouched() {
        let html = "<a href=\"https://example.com\">\"Link\"</a>";
        assert_eq!(
            correct_quotation_marks(html),
            "<a href=\"https://example.com\">„Link“</a>"
        );
    }

    #[test]
    fn test_less_than_in_text_is_not_a_tag() {
        assert_eq!(correct_quotation_marks("3 < 4 \"wahr\""), "3 < 4 „wahr“");
    }

    proptest! {
        #[test]
        fn correction_is_idempotent(s in "[a-z \"“”„(<>/]{0,40}") {
            let once = correct_quotation_marks(&s).into_owned();
            let twice = correct_quotation_marks(&once).into_owned();
            prop_assert_eq!(once, twice);
        }
    }
}
