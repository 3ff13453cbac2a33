//! In-process storage adapter.
//!
//! Every operation takes the state lock once, so each trait call is a single
//! atomic unit exactly as the Postgres adapter's statements are. Used when no
//! database URL is configured, and by the test suites.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::query::compare_posts;
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, CreateUserParams, DeletedUser, LikesRepo,
    PostFilter, PostListQuery, PostPatch, PostsRepo, PostsWriteRepo, RepoError, UpdateUserParams,
    UserQuery, UsersRepo,
};
use crate::cache::{Clock, SystemClock};
use crate::domain::entities::{AuthorSummary, CommentRecord, PostRecord, UserRecord};
use crate::domain::posts::matches_search;
use crate::domain::types::SortSpec;
use crate::domain::users::PersonName;

const USERS_EMAIL_KEY: &str = "users_email_key";
const USERS_NAME_KEY: &str = "users_name_key";
const POST_LIKES_PKEY: &str = "post_likes_pkey";

#[derive(Default)]
struct State {
    users: HashMap<Uuid, UserRecord>,
    posts: HashMap<Uuid, PostRecord>,
    /// Insertion order doubles as the tie-break for equal timestamps.
    comments: Vec<CommentRecord>,
    likes: HashSet<(Uuid, Uuid)>,
}

impl State {
    fn author(&self, user_id: Uuid) -> Result<AuthorSummary, RepoError> {
        self.users
            .get(&user_id)
            .map(AuthorSummary::from)
            .ok_or_else(|| RepoError::InvalidInput {
                message: format!("user {user_id} does not exist"),
            })
    }

    fn filtered_posts(&self, filter: &PostFilter) -> impl Iterator<Item = &PostRecord> {
        self.posts.values().filter(move |post| filter.matches(post))
    }

    fn filtered_users<'a>(&'a self, search: Option<&'a str>) -> impl Iterator<Item = &'a UserRecord> {
        self.users.values().filter(move |user| {
            search.is_none_or(|needle| {
                matches_search(needle, &[&user.first_name, &user.last_name, &user.email])
            })
        })
    }

    fn remove_post(&mut self, id: Uuid) -> Option<PostRecord> {
        let post = self.posts.remove(&id)?;
        self.comments.retain(|comment| comment.post_id != id);
        self.likes.retain(|(_, post_id)| *post_id != id);
        Some(post)
    }

    fn refresh_author(&mut self, user: &UserRecord) {
        let author = AuthorSummary::from(user);
        for post in self.posts.values_mut().filter(|p| p.author.id == user.id) {
            post.author = author.clone();
        }
        for comment in self.comments.iter_mut().filter(|c| c.author.id == user.id) {
            comment.author = author.clone();
        }
    }
}

#[derive(Clone)]
pub struct MemoryRepositories {
    state: Arc<RwLock<State>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryRepositories {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Timestamps come from `clock`, so tests can control creation order.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            clock,
        }
    }
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn list_posts(&self, query: &PostListQuery) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.read().await;
        let mut posts: Vec<PostRecord> = state.filtered_posts(&query.filter).cloned().collect();
        posts.sort_by(|a, b| compare_posts(a, b, query.sort));
        Ok(query.page.slice(&posts))
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state.filtered_posts(filter).count() as u64)
    }

    async fn list_all_posts(&self) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.read().await;
        let mut posts: Vec<PostRecord> = state.posts.values().cloned().collect();
        posts.sort_by(|a, b| compare_posts(a, b, SortSpec::default()));
        Ok(posts)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.state.read().await.posts.get(&id).cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        let author = state.author(params.author_id)?;
        let now = self.clock.now();
        let post = PostRecord {
            id: Uuid::new_v4(),
            title: params.title,
            content: params.content,
            published: params.published,
            author,
            tags: params.tags,
            views: 0,
            likes: 0,
            created_at: now,
            updated_at: now,
        };
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<PostRecord, RepoError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let post = state.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(title) = patch.title {
            post.title = title;
        }
        if let Some(content) = patch.content {
            post.content = content;
        }
        if let Some(published) = patch.published {
            post.published = published;
        }
        if let Some(tags) = patch.tags {
            post.tags = tags;
        }
        post.updated_at = now;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        self.state
            .write()
            .await
            .remove_post(id)
            .ok_or(RepoError::NotFound)
    }

    async fn delete_posts(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, RepoError> {
        let mut state = self.state.write().await;
        let mut removed = Vec::new();
        for id in ids {
            if state.remove_post(*id).is_some() {
                removed.push(*id);
            }
        }
        Ok(removed)
    }

    async fn increment_views(&self, id: Uuid) -> Result<u64, RepoError> {
        let mut state = self.state.write().await;
        let post = state.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.views += 1;
        Ok(post.views)
    }
}

#[async_trait]
impl LikesRepo for MemoryRepositories {
    async fn has_like(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError> {
        Ok(self.state.read().await.likes.contains(&(user_id, post_id)))
    }

    async fn add_like(&self, user_id: Uuid, post_id: Uuid) -> Result<u64, RepoError> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&post_id) {
            return Err(RepoError::NotFound);
        }
        state.author(user_id)?;
        if !state.likes.insert((user_id, post_id)) {
            return Err(RepoError::duplicate(POST_LIKES_PKEY));
        }
        let post = state.posts.get_mut(&post_id).ok_or(RepoError::NotFound)?;
        post.likes += 1;
        Ok(post.likes)
    }

    async fn remove_like(&self, user_id: Uuid, post_id: Uuid) -> Result<Option<u64>, RepoError> {
        let mut state = self.state.write().await;
        if !state.likes.remove(&(user_id, post_id)) {
            return Ok(None);
        }
        let post = state.posts.get_mut(&post_id).ok_or(RepoError::NotFound)?;
        post.likes = post.likes.saturating_sub(1);
        Ok(Some(post.likes))
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepositories {
    async fn create_comment(&self, params: CreateCommentParams) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&params.post_id) {
            return Err(RepoError::NotFound);
        }
        let author = state.author(params.user_id)?;
        let now = self.clock.now();
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author,
            content: params.content,
            created_at: now,
            updated_at: now,
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.read().await;
        let mut comments: Vec<CommentRecord> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equal timestamps.
        comments.sort_by_key(|comment| comment.created_at);
        Ok(comments)
    }

    async fn count_by_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .count() as u64)
    }

    async fn update_comment(&self, id: Uuid, content: String) -> Result<CommentRecord, RepoError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let comment = state
            .comments
            .iter_mut()
            .find(|comment| comment.id == id)
            .ok_or(RepoError::NotFound)?;
        comment.content = content;
        comment.updated_at = now;
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let mut state = self.state.write().await;
        let position = state.comments.iter().position(|comment| comment.id == id);
        Ok(position.map(|index| state.comments.remove(index)))
    }
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn list_users(&self, query: &UserQuery) -> Result<Vec<UserRecord>, RepoError> {
        let state = self.state.read().await;
        let mut users: Vec<UserRecord> = state
            .filtered_users(query.search.as_deref())
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(query.page.slice(&users))
    }

    async fn count_users(&self, search: Option<&str>) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state.filtered_users(search).count() as u64)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let name = PersonName::new(&params.first_name, &params.last_name).map_err(|err| {
            RepoError::InvalidInput {
                message: err.to_string(),
            }
        })?;
        let mut state = self.state.write().await;
        for existing in state.users.values() {
            if existing.email.to_lowercase() == params.email.to_lowercase() {
                return Err(RepoError::duplicate(USERS_EMAIL_KEY));
            }
            if name.collides_with(&existing.first_name, &existing.last_name) {
                return Err(RepoError::duplicate(USERS_NAME_KEY));
            }
        }

        let now = self.clock.now();
        let user = UserRecord {
            id: Uuid::new_v4(),
            first_name: name.first_name,
            last_name: name.last_name,
            email: params.email,
            role: params.role,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let current = state.users.get(&params.id).ok_or(RepoError::NotFound)?;
        let first_name = params
            .first_name
            .unwrap_or_else(|| current.first_name.clone());
        let last_name = params.last_name.unwrap_or_else(|| current.last_name.clone());
        let name = PersonName::new(&first_name, &last_name).map_err(|err| {
            RepoError::InvalidInput {
                message: err.to_string(),
            }
        })?;

        let collides = state
            .users
            .values()
            .filter(|other| other.id != params.id)
            .any(|other| name.collides_with(&other.first_name, &other.last_name));
        if collides {
            return Err(RepoError::duplicate(USERS_NAME_KEY));
        }

        let user = state.users.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        user.first_name = name.first_name;
        user.last_name = name.last_name;
        user.updated_at = now;
        let user = user.clone();
        state.refresh_author(&user);
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<DeletedUser, RepoError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        if state.posts.values().any(|post| post.author.id == id) {
            return Err(RepoError::Integrity {
                message: "user still authors posts".to_string(),
            });
        }

        let liked: Vec<Uuid> = state
            .likes
            .iter()
            .filter(|(user_id, _)| *user_id == id)
            .map(|(_, post_id)| *post_id)
            .collect();
        let mut touched_posts: BTreeSet<Uuid> = BTreeSet::new();
        for post_id in liked {
            state.likes.remove(&(id, post_id));
            if let Some(post) = state.posts.get_mut(&post_id) {
                post.likes = post.likes.saturating_sub(1);
            }
            touched_posts.insert(post_id);
        }
        touched_posts.extend(
            state
                .comments
                .iter()
                .filter(|comment| comment.author.id == id)
                .map(|comment| comment.post_id),
        );
        state.comments.retain(|comment| comment.author.id != id);

        let user = state.users.remove(&id).ok_or(RepoError::NotFound)?;
        Ok(DeletedUser {
            user,
            touched_posts: touched_posts.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::cache::ManualClock;
    use crate::domain::types::UserRole;

    async fn seeded() -> (MemoryRepositories, Arc<ManualClock>, UserRecord) {
        let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
        let repos = MemoryRepositories::with_clock(clock.clone());
        let user = repos
            .create_user(CreateUserParams {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                role: UserRole::Author,
            })
            .await
            .expect("create user");
        (repos, clock, user)
    }

    async fn post(repos: &MemoryRepositories, author: Uuid, title: &str) -> PostRecord {
        repos
            .create_post(CreatePostParams {
                author_id: author,
                title: title.to_string(),
                content: "body".to_string(),
                published: true,
                tags: Vec::new(),
            })
            .await
            .expect("create post")
    }

    #[tokio::test]
    async fn add_like_twice_is_duplicate_and_counts_once() {
        let (repos, _, user) = seeded().await;
        let post = post(&repos, user.id, "p").await;

        assert_eq!(repos.add_like(user.id, post.id).await.expect("like"), 1);
        let err = repos.add_like(user.id, post.id).await.expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { .. }));

        let stored = repos.find_by_id(post.id).await.expect("find").expect("post");
        assert_eq!(stored.likes, 1);
    }

    #[tokio::test]
    async fn remove_missing_like_is_none() {
        let (repos, _, user) = seeded().await;
        let post = post(&repos, user.id, "p").await;

        assert_eq!(repos.remove_like(user.id, post.id).await.expect("unlike"), None);
        let stored = repos.find_by_id(post.id).await.expect("find").expect("post");
        assert_eq!(stored.likes, 0);
    }

    #[tokio::test]
    async fn delete_post_cascades() {
        let (repos, _, user) = seeded().await;
        let post = post(&repos, user.id, "p").await;
        repos
            .create_comment(CreateCommentParams {
                post_id: post.id,
                user_id: user.id,
                content: "hi".to_string(),
            })
            .await
            .expect("comment");
        repos.add_like(user.id, post.id).await.expect("like");

        repos.delete_post(post.id).await.expect("delete");

        assert_eq!(repos.count_by_post(post.id).await.expect("count"), 0);
        assert!(!repos.has_like(user.id, post.id).await.expect("has like"));
    }

    #[tokio::test]
    async fn comments_keep_insertion_order_on_equal_timestamps() {
        let (repos, _, user) = seeded().await;
        let post = post(&repos, user.id, "p").await;
        for content in ["first", "second", "third"] {
            repos
                .create_comment(CreateCommentParams {
                    post_id: post.id,
                    user_id: user.id,
                    content: content.to_string(),
                })
                .await
                .expect("comment");
        }

        let contents: Vec<String> = repos
            .list_by_post(post.id)
            .await
            .expect("list")
            .into_iter()
            .map(|comment| comment.content)
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn duplicate_name_pair_ignores_case() {
        let (repos, _, _) = seeded().await;
        let err = repos
            .create_user(CreateUserParams {
                first_name: "ADA".to_string(),
                last_name: "lovelace".to_string(),
                email: "other@example.com".to_string(),
                role: UserRole::Reader,
            })
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { constraint } if constraint == USERS_NAME_KEY));
    }

    #[tokio::test]
    async fn author_cannot_be_deleted_while_posting() {
        let (repos, _, user) = seeded().await;
        post(&repos, user.id, "p").await;

        let err = repos.delete_user(user.id).await.expect_err("integrity");
        assert!(matches!(err, RepoError::Integrity { .. }));
    }

    #[tokio::test]
    async fn deleting_user_reports_posts_that_lost_engagement() {
        let (repos, _, author) = seeded().await;
        let reader = repos
            .create_user(CreateUserParams {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                email: "grace@example.com".to_string(),
                role: UserRole::Reader,
            })
            .await
            .expect("reader");
        let liked = post(&repos, author.id, "liked").await;
        let commented = post(&repos, author.id, "commented").await;
        post(&repos, author.id, "untouched").await;

        repos.add_like(reader.id, liked.id).await.expect("like");
        repos
            .create_comment(CreateCommentParams {
                post_id: commented.id,
                user_id: reader.id,
                content: "hi".to_string(),
            })
            .await
            .expect("comment");

        let deleted = repos.delete_user(reader.id).await.expect("delete");

        let mut expected = vec![liked.id, commented.id];
        expected.sort();
        assert_eq!(deleted.user.id, reader.id);
        assert_eq!(deleted.touched_posts, expected);
        let liked = repos.find_by_id(liked.id).await.expect("find").expect("post");
        assert_eq!(liked.likes, 0);
        assert_eq!(repos.count_by_post(commented.id).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn renaming_user_updates_embedded_authors() {
        let (repos, clock, user) = seeded().await;
        let post = post(&repos, user.id, "p").await;
        clock.advance(Duration::seconds(1));

        repos
            .update_user(UpdateUserParams {
                id: user.id,
                first_name: Some("Augusta".to_string()),
                last_name: None,
            })
            .await
            .expect("rename");

        let stored = repos.find_by_id(post.id).await.expect("find").expect("post");
        assert_eq!(stored.author.display_name(), "Augusta Lovelace");
    }
}
