pub const MAX_STEM_CHARS: usize = 50;
pub const FILENAME_PREFIX: &str = "Unbedenklichkeitszertifikat";
pub const FALLBACK_STEM: &str = "certificate";

fn is_kept(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, 'ä' | 'ö' | 'ü' | 'Ä' | 'Ö' | 'Ü' | 'ß' | '-' | '_')
        || ch.is_whitespace()
}

/// Download-safe stem: disallowed characters dropped, whitespace runs turned
/// into one `_`, cut to 50 chars. May be empty.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_space = false;
    for ch in name.chars().filter(|ch| is_kept(*ch)) {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out.chars().take(MAX_STEM_CHARS).collect()
}

/// `Unbedenklichkeitszertifikat_<stem>.<ext>`, with a placeholder for empty stems.
pub fn suggested_filename(stem: &str, extension: &str) -> String {
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };
    format!("{FILENAME_PREFIX}_{stem}.{extension}")
}
