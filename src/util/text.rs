use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Any tag, comment or doctype. An unterminated `<` runs to the end of input.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>?").expect("valid regex"));

/// Normalizes feed-supplied text for classification and output.
///
/// Applies, in order: HTML tag removal, entity decoding, control character
/// removal and whitespace collapsing. The result is trimmed.
///
/// # Examples
///
/// ```
/// use feedcrawl::util::clean_text;
///
/// assert_eq!(clean_text("<p>New <b>GPT</b>&nbsp;model</p>\n"), "New GPT model");
/// assert_eq!(clean_text("   "), "");
/// ```
pub fn clean_text(s: &str) -> String {
    let stripped = strip_html_tags(s);
    let decoded = decode_entities(&stripped);
    let visible = strip_control_chars(&decoded);
    collapse_whitespace(&visible)
}

/// Replaces every tag with a space, since tags usually separate words
/// (`<br>`, `</p>`).
///
/// Returns `Cow::Borrowed` when the input contains no tag. An unterminated
/// `<` swallows the rest of the string, matching how browsers treat a broken
/// tag at the end of a fragment.
pub fn strip_html_tags(s: &str) -> Cow<'_, str> {
    TAG_RE.replace_all(s, " ")
}

/// Decodes HTML5 named entities and decimal/hex numeric references.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(s)
}

/// Strips ASCII control characters and ANSI escape sequences.
///
/// Preserves tab, newline and carriage return; those are folded later by
/// whitespace collapsing. Returns `Cow::Borrowed` for clean input.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let needs_strip = s
        .bytes()
        .any(|b| b == 0x1b || b == 0x7f || (b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r'));

    if !needs_strip {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // CSI: ESC [ params... final byte in 0x40..=0x7e
            if chars.peek() == Some(&'[') {
                chars.next();
                for next in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        if c.is_ascii_control() && c != '\t' && c != '\n' && c != '\r' {
            continue;
        }
        out.push(c);
    }
    Cow::Owned(out)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
