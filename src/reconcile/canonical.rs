/// Comparison key for a line of text: lowercase ASCII letters and digits only.
///
/// Two strings share a key exactly when they differ only in case, whitespace or
/// punctuation. Everything outside `[a-z0-9]` after lowercasing is dropped.
pub fn canonicalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_whitespace_and_punctuation_are_ignored() {
        let key = canonicalize("Meeting Notes");
        assert_eq!(key, "meetingnotes");
        assert_eq!(canonicalize("meeting   notes"), key);
        assert_eq!(canonicalize("MEETING NOTES."), key);
        assert_eq!(canonicalize("  meeting-notes!\n"), key);
    }

    #[test]
    fn digits_survive_and_words_still_differ() {
        assert_eq!(canonicalize("Call Bob at 5pm"), "callbobat5pm");
        assert_ne!(canonicalize("Call Bob"), canonicalize("Call Rob"));
    }

    #[test]
    fn empty_and_symbol_only_inputs() {
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("-- ... !!"), "");
        assert_eq!(canonicalize("Café"), "caf");
    }
}
