//! Case-insensitive phrase matching over free-text context.

/// True when `phrase` occurs in `haystack` on word boundaries.
///
/// Both arguments are expected to be lowercased already. Boundaries are any
/// non-alphanumeric character, so `at&t` matches in "analyse at&t" while `uk`
/// does not match inside "ukulele".
pub(crate) fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }

    let mut start = 0;
    while let Some(pos) = haystack[start..].find(phrase) {
        let begin = start + pos;
        let end = begin + phrase.len();

        let before_ok = haystack[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());

        if before_ok && after_ok {
            return true;
        }

        start = begin + haystack[begin..].chars().next().map_or(1, char::len_utf8);
    }

    false
}

/// Lowercased words of a company name, without punctuation or legal suffixes.
pub(crate) fn name_words(name: &str) -> Vec<String> {
    const IGNORED: &[&str] = &[
        "inc", "corp", "corporation", "ltd", "limited", "llc", "plc", "sa", "nv", "ag", "co",
        "company", "the", "and", "adr",
    ];

    let mut words: Vec<String> = Vec::new();
    for word in name
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '&' || c == '-'))
        .map(|w| w.trim_matches('-'))
        .filter(|w| w.chars().count() >= 3 && !IGNORED.contains(w))
    {
        if !words.iter().any(|existing| existing == word) {
            words.push(word.to_string());
        }
    }
    words
}
