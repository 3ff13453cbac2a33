use super::error::{DomainError, ensure_non_empty};

/// Validated, trimmed name pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName {
    pub first_name: String,
    pub last_name: String,
}

impl PersonName {
    pub fn new(first_name: &str, last_name: &str) -> Result<Self, DomainError> {
        ensure_non_empty(first_name, "first_name")?;
        ensure_non_empty(last_name, "last_name")?;
        Ok(Self {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
        })
    }

    /// Whether two names collide under the case-insensitive uniqueness rule.
    pub fn collides_with(&self, first_name: &str, last_name: &str) -> bool {
        self.first_name.to_lowercase() == first_name.trim().to_lowercase()
            && self.last_name.to_lowercase() == last_name.trim().to_lowercase()
    }
}

pub fn normalize_email(email: &str) -> Result<String, DomainError> {
    ensure_non_empty(email, "email")?;
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(DomainError::validation("`email` must contain a local part and a domain")),
    }
}
