use std::borrow::Cow;

use unicode_width::UnicodeWidthChar;

const ELLIPSIS: char = '…';

/// Prepares server-provided text for a single terminal line.
///
/// Control characters (including ESC, so no ANSI sequence survives) are
/// dropped, runs of whitespace collapse to one space, and the result is
/// cut to `max_width` display columns with a trailing ellipsis.
///
/// ```
/// use newsdeck::util::display_line;
///
/// assert_eq!(display_line("  Breaking:\n\tmarkets  rally ", 80), "Breaking: markets rally");
/// assert_eq!(display_line("Hello World", 6), "Hello…");
/// ```
pub fn display_line(s: &str, max_width: usize) -> Cow<'_, str> {
    let cleaned = sanitize(s);
    if max_width == 0 {
        return Cow::Borrowed("");
    }

    let mut width = 0;
    let mut cut = None;
    for (idx, c) in cleaned.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        // Leave one column for the ellipsis
        if cut.is_none() && width + w > max_width.saturating_sub(1) {
            cut = Some(idx);
        }
        if width + w > max_width {
            let mut out = cleaned[..cut.unwrap_or(idx)].trim_end().to_string();
            out.push(ELLIPSIS);
            return Cow::Owned(out);
        }
        width += w;
    }
    cleaned
}

fn sanitize(s: &str) -> Cow<'_, str> {
    let trimmed = s.trim();
    let clean = !trimmed.chars().any(|c| c.is_control())
        && !trimmed.contains("  ");
    if clean {
        return Cow::Borrowed(trimmed);
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut pending_space = false;
    for c in trimmed.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if c.is_control() {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    Cow::Owned(out)
}
