//! Post field normalization.

/// Trim tags, drop blanks and repeated entries while keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() || normalized.iter().any(|existing| existing == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

/// Case-insensitive substring match used for title/content search.
pub fn matches_search(needle: &str, haystacks: &[&str]) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    haystacks
        .iter()
        .any(|haystack| haystack.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_tags_keeps_order_and_drops_blanks() {
        let tags = normalize_tags([" rust ", "", "web", "rust", "  "]);
        assert_eq!(tags, vec!["rust".to_string(), "web".to_string()]);
    }

    #[test]
    fn search_is_case_insensitive() {
        assert!(matches_search("hello", &["Title", "Say Hello World"]));
        assert!(!matches_search("bye", &["Title", "Say Hello World"]));
        assert!(matches_search("   ", &["anything"]));
    }
}
