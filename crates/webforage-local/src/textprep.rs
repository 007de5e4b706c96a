//! Deterministic text shaping helpers for excerpts and code samples.

/// Char-based truncation (never splits a code point). Returns the possibly
/// shortened string and whether anything was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> (String, bool) {
    let mut count = 0usize;
    for (i, _) in s.char_indices() {
        if count == max_chars {
            return (s[..i].to_string(), true);
        }
        count += 1;
    }
    (s.to_string(), false)
}

/// Collapse all whitespace runs to single spaces and trim the ends.
pub fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed, non-empty lines in order, capped at `max_lines`.
pub fn excerpt_lines(text: &str, max_lines: usize) -> Vec<String> {
    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .take(max_lines)
        .map(|l| l.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn truncate_chars_counts_chars_not_bytes() {
        let (out, cut) = truncate_chars("héllo", 3);
        assert_eq!(out, "hél");
        assert!(cut);

        let (out, cut) = truncate_chars("héllo", 5);
        assert_eq!(out, "héllo");
        assert!(!cut);

        let (out, cut) = truncate_chars("", 10);
        assert_eq!(out, "");
        assert!(!cut);
    }

    #[test]
    fn excerpt_lines_trims_filters_and_caps() {
        let text = "  first  \n\n\n second\n\t\nthird\nfourth";
        assert_eq!(excerpt_lines(text, 3), vec!["first", "second", "third"]);
        assert_eq!(excerpt_lines("", 5), Vec::<String>::new());
    }

    #[test]
    fn norm_ws_collapses_runs() {
        assert_eq!(norm_ws("  a\t\tb \n c  "), "a b c");
        assert_eq!(norm_ws(""), "");
    }

    proptest! {
        #[test]
        fn truncate_chars_never_exceeds_max_and_is_a_prefix(
            s in any::<String>(),
            max in 0usize..200,
        ) {
            let (out, cut) = truncate_chars(&s, max);
            prop_assert!(out.chars().count() <= max || !cut);
            prop_assert!(s.starts_with(&out));
            if cut {
                prop_assert_eq!(out.chars().count(), max);
            } else {
                prop_assert_eq!(&out, &s);
            }
        }

        #[test]
        fn excerpt_lines_never_returns_blank_or_padded_lines(s in any::<String>()) {
            for line in excerpt_lines(&s, 50) {
                prop_assert!(!line.is_empty());
                prop_assert_eq!(line.trim().len(), line.len());
            }
        }
    }
}
