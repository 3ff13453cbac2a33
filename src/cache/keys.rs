//! Cache key construction.
//!
//! Keys take the form `namespace:token:token:...`. Absent parameters are
//! replaced by their default token before joining, so a request that omits a
//! parameter and one that passes its default value share an entry.

use url::form_urlencoded::byte_serialize;
use uuid::Uuid;

use crate::application::pagination::{normalize_limit, normalize_page};
use crate::domain::types::{SortSpec, StatusFilter};

pub const POST_DETAIL: &str = "postDetail";
pub const POST_LIST: &str = "postList";
pub const ALL_POSTS: &str = "allPosts";
pub const POST_COMMENTS: &str = "postComments";
pub const ADMIN_USERS_LIST: &str = "adminUsersList";

const SEPARATOR: char = ':';
const ALL_TOKEN: &str = "all";

/// Namespace of a key: everything before the first separator.
pub fn namespace_of(key: &str) -> &str {
    key.split_once(SEPARATOR)
        .map_or(key, |(namespace, _)| namespace)
}

/// Search token. Search is case-insensitive, so case is folded; user text is
/// percent-encoded so it can never contain the separator or pose as `all`.
fn search_token(search: Option<&str>) -> String {
    match search.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => {
            let encoded: String = byte_serialize(value.to_lowercase().as_bytes()).collect();
            format!("q={encoded}")
        }
        None => ALL_TOKEN.to_string(),
    }
}

pub fn post_detail(post_id: Uuid) -> String {
    format!("{POST_DETAIL}{SEPARATOR}{post_id}")
}

pub fn post_list(
    search: Option<&str>,
    status: Option<&str>,
    sort_field: Option<&str>,
    sort_direction: Option<&str>,
    page: Option<i64>,
    limit: Option<i64>,
) -> String {
    let status = StatusFilter::parse(status);
    let sort = SortSpec::resolve(sort_field, sort_direction);
    [
        POST_LIST.to_string(),
        search_token(search),
        status.as_str().to_string(),
        sort.field.as_str().to_string(),
        sort.direction.as_str().to_string(),
        normalize_page(page).to_string(),
        normalize_limit(limit).to_string(),
    ]
    .join(":")
}

pub fn all_posts() -> String {
    ALL_POSTS.to_string()
}

pub fn post_comments(post_id: Uuid) -> String {
    format!("{POST_COMMENTS}{SEPARATOR}{post_id}")
}

pub fn admin_users_list(search: Option<&str>, page: Option<i64>, limit: Option<i64>) -> String {
    [
        ADMIN_USERS_LIST.to_string(),
        search_token(search),
        normalize_page(page).to_string(),
        normalize_limit(limit).to_string(),
    ]
    .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_default_parameters_collide() {
        let implicit = post_list(None, None, None, None, None, None);
        let explicit = post_list(
            Some(""),
            Some("all"),
            Some("createdAt"),
            Some("desc"),
            Some(1),
            Some(10),
        );
        assert_eq!(implicit, explicit);
        assert_eq!(implicit, "postList:all:all:createdAt:desc:1:10");
    }

    #[test]
    fn unrecognized_sort_shares_default_key() {
        assert_eq!(
            post_list(None, None, Some("bogus"), Some("asc"), None, None),
            post_list(None, None, Some("createdAt"), Some("desc"), None, None),
        );
    }

    #[test]
    fn distinct_parameters_produce_distinct_keys() {
        let base = post_list(Some("rust"), None, None, None, Some(1), Some(10));
        assert_ne!(base, post_list(Some("rust"), None, None, None, Some(2), Some(10)));
        assert_ne!(base, post_list(Some("rust"), Some("published"), None, None, Some(1), Some(10)));
        assert_ne!(base, post_list(Some("rust"), None, Some("title"), None, Some(1), Some(10)));
    }

    #[test]
    fn search_text_cannot_impersonate_tokens() {
        assert_ne!(
            post_list(Some("all"), None, None, None, None, None),
            post_list(None, None, None, None, None, None),
        );
        let key = post_list(Some("a:b"), None, None, None, None, None);
        assert_eq!(key.matches(':').count(), 6);
        assert_eq!(namespace_of(&key), POST_LIST);
    }

    #[test]
    fn search_token_folds_case() {
        assert_eq!(
            admin_users_list(Some("Ada"), None, None),
            admin_users_list(Some("ada"), Some(1), Some(10)),
        );
    }

    #[test]
    fn namespace_is_the_leading_segment() {
        let id = Uuid::nil();
        assert_eq!(namespace_of(&post_detail(id)), POST_DETAIL);
        assert_eq!(namespace_of(&post_comments(id)), POST_COMMENTS);
        assert_eq!(namespace_of(&all_posts()), ALL_POSTS);
    }
}
