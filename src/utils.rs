//! Utility functions for clitree

/// Maximum number of "did you mean" entries returned by [`suggest`]
pub const MAX_SUGGESTIONS: usize = 3;

/// Rank `candidates` by closeness to `typed`.
///
/// A candidate that starts with `typed` scores 0, anything else scores its
/// Levenshtein distance. Candidates scoring above `max_distance` are dropped
/// and at most [`MAX_SUGGESTIONS`] are returned, best first.
pub fn suggest<'c, I>(typed: &str, candidates: I, max_distance: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'c str>,
{
    if typed.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter(|c| *c != typed)
        .map(|c| {
            let score = if c.starts_with(typed) {
                0
            } else {
                strsim::levenshtein(typed, c)
            };
            (score, c)
        })
        .filter(|(score, _)| *score <= max_distance)
        .collect();

    scored.sort();
    scored.dedup_by(|a, b| a.1 == b.1);
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, c)| c.to_string())
        .collect()
}

/// Quote a word for a POSIX shell script.
///
/// Words made of safe characters are left alone; anything else is single
/// quoted, which also keeps embedded tabs and newlines intact.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
