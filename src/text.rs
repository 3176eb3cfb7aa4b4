//! Name layout policy for the square image: escaping, truncation and the
//! two-bucket font size.

pub const DISPLAY_NAME_MAX_CHARS: usize = 25;
pub const TRUNCATED_PREFIX_CHARS: usize = 22;
pub const ELLIPSIS: &str = "...";
pub const LONG_NAME_THRESHOLD: usize = 18;
pub const SHORT_NAME_FONT_SIZE: u32 = 56;
pub const LONG_NAME_FONT_SIZE: u32 = 42;

/// Replaces `& < > "` with their HTML entities.
pub fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Upper-cases, escapes, then cuts to 22 chars plus `...` when over 25.
///
/// Upper-casing happens first so entities stay lower-case.
pub fn escape_and_truncate(name: &str) -> String {
    let escaped = escape_markup(&name.to_uppercase());
    if escaped.chars().count() <= DISPLAY_NAME_MAX_CHARS {
        return escaped;
    }
    let mut out: String = escaped.chars().take(TRUNCATED_PREFIX_CHARS).collect();
    out.push_str(ELLIPSIS);
    out
}

pub fn select_font_size(display_name: &str) -> u32 {
    if display_name.chars().count() > LONG_NAME_THRESHOLD {
        LONG_NAME_FONT_SIZE
    } else {
        SHORT_NAME_FONT_SIZE
    }
}

/// Turns complete entities back into characters for drawing; a fragment
/// left by truncation (`&AM...`) stays as written.
pub fn unescape_markup(input: &str) -> String {
    const ENTITIES: [(&str, char); 4] = [("&amp;", '&'), ("&lt;", '<'), ("&gt;", '>'), ("&quot;", '"')];
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    'outer: while let Some(ch) = rest.chars().next() {
        if ch == '&' {
            for (entity, raw) in ENTITIES {
                if let Some(tail) = rest.strip_prefix(entity) {
                    out.push(raw);
                    rest = tail;
                    continue 'outer;
                }
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}
