//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

/// Publication filter applied to post listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Published,
    Unpublished,
}

impl StatusFilter {
    /// Parse a raw filter token. Absent or unrecognized tokens mean `All`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("published") => Self::Published,
            Some(value) if value.eq_ignore_ascii_case("unpublished") => Self::Unpublished,
            _ => Self::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Published => "published",
            StatusFilter::Unpublished => "unpublished",
        }
    }

    /// The `published` flag a post must carry to pass this filter, if any.
    pub fn published(self) -> Option<bool> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Published => Some(true),
            StatusFilter::Unpublished => Some(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "author")]
    Author,
}

impl SortField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "createdAt" => Some(Self::CreatedAt),
            "title" => Some(Self::Title),
            "author" => Some(Self::Author),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::Title => "title",
            SortField::Author => "author",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim();
        if value.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Resolved ordering for post listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl SortSpec {
    /// Resolve raw sort tokens.
    ///
    /// Absent tokens take their default individually. Any token that is
    /// present but unrecognized collapses the whole spec to `createdAt desc`.
    pub fn resolve(field: Option<&str>, direction: Option<&str>) -> Self {
        let default = Self::default();
        let field = match field.filter(|value| !value.trim().is_empty()) {
            Some(raw) => match SortField::parse(raw) {
                Some(field) => field,
                None => return default,
            },
            None => default.field,
        };
        let direction = match direction.filter(|value| !value.trim().is_empty()) {
            Some(raw) => match SortDirection::parse(raw) {
                Some(direction) => direction,
                None => return default,
            },
            None => default.direction,
        };
        Self { field, direction }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Author,
    Reader,
}

impl UserRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "author" => Some(Self::Author),
            "reader" => Some(Self::Reader),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Author => "author",
            UserRole::Reader => "reader",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_defaults_to_all() {
        assert_eq!(StatusFilter::parse(None), StatusFilter::All);
        assert_eq!(StatusFilter::parse(Some("bogus")), StatusFilter::All);
        assert_eq!(StatusFilter::parse(Some("Published")), StatusFilter::Published);
        assert_eq!(StatusFilter::parse(Some("unpublished")), StatusFilter::Unpublished);
    }

    #[test]
    fn sort_spec_falls_back_on_unknown_field() {
        assert_eq!(SortSpec::resolve(Some("bogus"), Some("asc")), SortSpec::default());
    }

    #[test]
    fn sort_spec_falls_back_on_unknown_direction() {
        assert_eq!(SortSpec::resolve(Some("title"), Some("sideways")), SortSpec::default());
    }

    #[test]
    fn sort_spec_fills_absent_parts_individually() {
        let spec = SortSpec::resolve(Some("title"), None);
        assert_eq!(spec.field, SortField::Title);
        assert_eq!(spec.direction, SortDirection::Desc);

        let spec = SortSpec::resolve(None, Some("ASC"));
        assert_eq!(spec.field, SortField::CreatedAt);
        assert_eq!(spec.direction, SortDirection::Asc);
    }
}
