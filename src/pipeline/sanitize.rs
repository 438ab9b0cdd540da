//! Input cleanup applied to notes before they are embedded into a prompt.
//!
//! Only invisible characters are removed; visible text is left untouched so
//! that model-returned `sourceText` snippets can stay verbatim against the
//! notes.

/// Strip zero-width, directional-override and control characters from `text`.
/// Standard whitespace (space, tab, newline, carriage return) is preserved.
pub fn strip_invisible_chars(text: &str) -> String {
    let cleaned: String = text.chars().filter(|c| is_visible(*c)).collect();

    let removed = text.chars().count() - cleaned.chars().count();
    if removed > 0 {
        tracing::warn!(removed, "invisible characters stripped from notes input");
    }

    cleaned
}

fn is_visible(c: char) -> bool {
    if c == ' ' || c == '\n' || c == '\t' || c == '\r' {
        return true;
    }
    if matches!(
        c,
        '\u{200B}'  // zero-width space
        | '\u{200C}' // zero-width non-joiner
        | '\u{200D}' // zero-width joiner
        | '\u{200E}' // left-to-right mark
        | '\u{200F}' // right-to-left mark
        | '\u{202A}' // left-to-right embedding
        | '\u{202B}' // right-to-left embedding
        | '\u{202C}' // pop directional formatting
        | '\u{202D}' // left-to-right override
        | '\u{202E}' // right-to-left override
        | '\u{2060}' // word joiner
        | '\u{FEFF}' // BOM / zero-width no-break space
    ) {
        return false;
    }
    !c.is_control()
}
