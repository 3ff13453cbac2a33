use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Reject values that are empty once surrounding whitespace is removed.
pub fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("`{field}` must not be blank")));
    }
    Ok(())
}
