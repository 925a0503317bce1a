use std::borrow::Cow;

/// Strips control characters from text destined for the terminal.
///
/// Feed metadata is attacker-controlled: a title can embed terminal escape
/// sequences that would survive into stdout. Returns a borrowed `Cow` when
/// the input is already clean, so the common case allocates nothing.
pub fn strip_control_chars(input: &str) -> Cow<'_, str> {
    if input.chars().any(char::is_control) {
        Cow::Owned(input.chars().filter(|c| !c.is_control()).collect())
    } else {
        Cow::Borrowed(input)
    }
}

/// Truncates a string to at most `max_chars` characters, appending an
/// ellipsis when anything was cut. Operates on char boundaries, never bytes.
pub fn truncate_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    match input.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => Cow::Owned(format!("{}…", &input[..byte_idx])),
        None => Cow::Borrowed(input),
    }
}
