//! Post listing contract: search, status filter, sort and pagination.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Deserialize;
use tracing::instrument;

use crate::application::error::AppError;
use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{PostFilter, PostListQuery, PostsRepo};
use crate::cache::keys;
use crate::domain::entities::PostRecord;
use crate::domain::posts::matches_search;
use crate::domain::types::{SortDirection, SortField, SortSpec, StatusFilter};

/// Raw listing parameters as they arrive from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub sort_field: Option<String>,
    pub sort_dir: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PostListQuery {
    /// Normalize raw parameters. Unknown status and sort tokens fall back to
    /// their defaults; only an oversized `limit` is rejected.
    pub fn from_params(params: &PostListParams) -> Result<Self, AppError> {
        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Self {
            filter: PostFilter {
                search,
                status: StatusFilter::parse(params.status.as_deref()),
            },
            sort: SortSpec::resolve(params.sort_field.as_deref(), params.sort_dir.as_deref()),
            page: PageRequest::from_raw(params.page, params.limit)?,
        })
    }

    pub fn cache_key(&self) -> String {
        keys::post_list(
            self.filter.search.as_deref(),
            Some(self.filter.status.as_str()),
            Some(self.sort.field.as_str()),
            Some(self.sort.direction.as_str()),
            Some(i64::from(self.page.page)),
            Some(i64::from(self.page.limit)),
        )
    }
}

impl PostFilter {
    /// In-process evaluation of the filter, for adapters without a query language.
    pub fn matches(&self, post: &PostRecord) -> bool {
        let status_ok = self
            .status
            .published()
            .is_none_or(|published| post.published == published);
        let search_ok = self
            .search
            .as_deref()
            .is_none_or(|needle| matches_search(needle, &[&post.title, &post.content]));
        status_ok && search_ok
    }
}

/// Total order over posts for `sort`, with id ascending as the tie-break.
pub fn compare_posts(a: &PostRecord, b: &PostRecord, sort: SortSpec) -> Ordering {
    let primary = match sort.field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortField::Author => a
            .author
            .display_name()
            .to_lowercase()
            .cmp(&b.author.display_name().to_lowercase()),
    };
    let primary = match sort.direction {
        SortDirection::Asc => primary,
        SortDirection::Desc => primary.reverse(),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

pub struct ContentQueryEngine {
    posts: Arc<dyn PostsRepo>,
}

impl ContentQueryEngine {
    pub fn new(posts: Arc<dyn PostsRepo>) -> Self {
        Self { posts }
    }

    /// Run a listing: one ordered page plus the size of the filtered set.
    /// A page past the end yields no items and the true total.
    #[instrument(skip(self), fields(page = query.page.page, limit = query.page.limit))]
    pub async fn query(&self, query: &PostListQuery) -> Result<Page<PostRecord>, AppError> {
        let (items, total) = tokio::try_join!(
            self.posts.list_posts(query),
            self.posts.count_posts(&query.filter)
        )?;
        Ok(Page::new(items, total, query.page))
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    use super::*;
    use crate::domain::entities::AuthorSummary;

    fn post(n: u128, title: &str, author: (&str, &str), minutes: i64) -> PostRecord {
        let at = OffsetDateTime::UNIX_EPOCH + Duration::minutes(minutes);
        PostRecord {
            id: Uuid::from_u128(n),
            title: title.to_string(),
            content: String::new(),
            published: true,
            author: AuthorSummary {
                id: Uuid::from_u128(1000 + n),
                first_name: author.0.to_string(),
                last_name: author.1.to_string(),
            },
            tags: Vec::new(),
            views: 0,
            likes: 0,
            created_at: at,
            updated_at: at,
        }
    }

    fn sorted(mut posts: Vec<PostRecord>, sort: SortSpec) -> Vec<u128> {
        posts.sort_by(|a, b| compare_posts(a, b, sort));
        posts.iter().map(|p| p.id.as_u128()).collect()
    }

    #[test]
    fn params_normalize_to_defaults() {
        let query = PostListQuery::from_params(&PostListParams {
            sort_field: Some("bogus".to_string()),
            sort_dir: Some("asc".to_string()),
            page: Some(0),
            ..Default::default()
        })
        .expect("valid params");
        assert_eq!(query, PostListQuery::default());
        assert_eq!(query.cache_key(), "postList:all:all:createdAt:desc:1:10");
    }

    #[test]
    fn blank_search_is_no_search() {
        let query = PostListQuery::from_params(&PostListParams {
            search: Some("   ".to_string()),
            ..Default::default()
        })
        .expect("valid params");
        assert_eq!(query.filter.search, None);
    }

    #[test]
    fn oversized_limit_is_a_validation_error() {
        let err = PostListQuery::from_params(&PostListParams {
            limit: Some(500),
            ..Default::default()
        })
        .expect_err("limit too large");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn author_sort_uses_display_name() {
        let posts = vec![
            post(1, "a", ("Zed", "Young"), 0),
            post(2, "b", ("Ada", "Lovelace"), 1),
            post(3, "c", ("Grace", "Hopper"), 2),
        ];
        let sort = SortSpec::resolve(Some("author"), Some("asc"));
        assert_eq!(sorted(posts, sort), vec![2, 3, 1]);
    }

    #[test]
    fn ties_break_by_id_ascending() {
        let posts = vec![
            post(3, "same", ("A", "A"), 0),
            post(1, "same", ("A", "A"), 0),
            post(2, "same", ("A", "A"), 0),
        ];
        let sort = SortSpec::resolve(Some("title"), Some("desc"));
        assert_eq!(sorted(posts, sort), vec![1, 2, 3]);
    }

    #[test]
    fn filter_matches_title_or_content_and_status() {
        let mut draft = post(1, "Draft", ("A", "B"), 0);
        draft.published = false;
        draft.content = "...Hello World...".to_string();

        let filter = PostFilter {
            search: Some("hello".to_string()),
            status: StatusFilter::All,
        };
        assert!(filter.matches(&draft));

        let filter = PostFilter {
            search: Some("hello".to_string()),
            status: StatusFilter::Published,
        };
        assert!(!filter.matches(&draft));
    }
}
