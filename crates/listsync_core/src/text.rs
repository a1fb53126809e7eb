//! Text cleanup applied to names and titles before comparison.

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn clean_spaces(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip a trailing series annotation such as `"Title (Series, #2)"`.
///
/// Only a final parenthesised group containing `#` counts as a series
/// marker; anything else is returned cleaned but otherwise untouched.
pub fn title_without_series(title: &str) -> String {
    let cleaned = clean_spaces(title);
    let Some(body) = cleaned.strip_suffix(')') else {
        return cleaned;
    };
    let Some(open) = matching_open(body) else {
        return cleaned;
    };
    let annotation = &body[open + 1..];
    let head = body[..open].trim_end();
    if !annotation.contains('#') || head.is_empty() {
        return cleaned;
    }
    head.to_string()
}

/// Byte offset of the `(` closing at the end of `body`, whose final `)` has
/// already been stripped. `None` when the parentheses do not balance.
fn matching_open(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (index, c) in body.char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' if depth == 0 => return Some(index),
            '(' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Case-folded form used for name based dedup keys.
pub(crate) fn fold(input: &str) -> String {
    clean_spaces(input).to_lowercase()
}
