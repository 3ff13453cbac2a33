use super::error::DomainError;

/// Trim comment text, rejecting content that is blank.
pub fn normalize_comment(content: &str) -> Result<String, DomainError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("comment content must not be blank"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_comment_is_rejected() {
        assert!(normalize_comment("   ").is_err());
        assert!(normalize_comment("\n\t").is_err());
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(normalize_comment("  hi  ").expect("valid comment"), "hi");
    }
}
