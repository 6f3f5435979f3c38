//! Strip invisible / steganographic Unicode code points before text reaches
//! the journal, a prompt, or a peer wire message.
//!
//! Folded in from the teacher's `crates/symbi-invis-strip` (which shipped no
//! source in the retrieval pack — this reimplements its stated purpose as a
//! plain function rather than a separate crate, since every caller already
//! depends on `fulcrum-common`).

/// Remove Unicode tag characters (U+E0000–U+E007F, used for invisible
/// prompt-injection payloads), zero-width characters, and bidi control
/// characters from `input`. Leaves ordinary whitespace and printable text
/// untouched.
pub fn strip_invisible(input: &str) -> String {
    input.chars().filter(|c| !is_invisible(*c)).collect()
}

fn is_invisible(c: char) -> bool {
    matches!(c,
        '\u{200B}'..='\u{200F}' // zero-width space/joiners, LRM/RLM
        | '\u{202A}'..='\u{202E}' // bidi embedding/override
        | '\u{2060}'..='\u{2064}' // word joiner, invisible operators
        | '\u{FEFF}' // BOM / zero-width no-break space
        | '\u{E0000}'..='\u{E007F}' // Unicode tag block
    )
}

/// `true` if `input` contains any code point [`strip_invisible`] would
/// remove. Useful for an approval relay or journal writer that wants to
/// flag rather than silently rewrite.
pub fn contains_invisible(input: &str) -> bool {
    input.chars().any(is_invisible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_zero_width_and_tag_characters() {
        let poisoned = "hello\u{200B}world\u{E0041}\u{E0042}";
        assert_eq!(strip_invisible(poisoned), "helloworld");
    }

    #[test]
    fn leaves_ordinary_text_untouched() {
        let clean = "hello, world! 日本語";
        assert_eq!(strip_invisible(clean), clean);
        assert!(!contains_invisible(clean));
    }

    #[test]
    fn detects_without_mutating() {
        let poisoned = "safe\u{FEFF}text";
        assert!(contains_invisible(poisoned));
    }
}
