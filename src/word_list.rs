use crate::MAX_WORD_LENGTH;

/// Lowercase a word for indexing, or reject it if it's empty, too long, or contains anything but
/// ASCII letters (which also rules out compound entries with spaces).
pub fn normalize_word(word: &str) -> Option<String> {
    let word = word.trim();

    if word.is_empty() || word.len() >= MAX_WORD_LENGTH {
        return None;
    }
    if !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some(word.to_ascii_lowercase())
}

/// Parse a word list with one `word` or `word,score` entry per line. Lines with more than two
/// fields or a non-numeric score are skipped; a missing score counts as 0. Words are returned as
/// written so that the index can decide what to reject.
pub fn parse_word_list(text: &str) -> Vec<(String, i32)> {
    text.lines()
        .filter_map(|line| {
            let line_parts: Vec<_> = line.split(',').collect();

            match line_parts.as_slice() {
                [word] if !word.trim().is_empty() => Some((word.trim().to_string(), 0)),
                [word, score] => {
                    let score: i32 = score.trim().parse().ok()?;
                    Some((word.trim().to_string(), score))
                }
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::word_list::{normalize_word, parse_word_list};
    use crate::MAX_WORD_LENGTH;

    #[test]
    fn test_normalize_word() {
        assert_eq!(normalize_word("Cat"), Some("cat".to_string()));
        assert_eq!(normalize_word(" dog "), Some("dog".to_string()));
        assert_eq!(normalize_word("ice cream"), None);
        assert_eq!(normalize_word("o'clock"), None);
        assert_eq!(normalize_word(""), None);
        assert_eq!(normalize_word(&"a".repeat(MAX_WORD_LENGTH)), None);
        assert!(normalize_word(&"a".repeat(MAX_WORD_LENGTH - 1)).is_some());
    }

    #[test]
    fn test_parse_word_list() {
        let words = parse_word_list("cat,10\ncar\n\ncop, 1\nbad,score\na,b,c\n");

        assert_eq!(
            words,
            vec![("cat".to_string(), 10), ("car".to_string(), 0), ("cop".to_string(), 1)]
        );
    }
}
