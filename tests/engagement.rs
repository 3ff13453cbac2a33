mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use penmark::application::engagement::LikeOutcome;
use penmark::application::error::AppError;
use penmark::application::repos::{LikesRepo, RepoError};
use penmark::cache::keys;
use penmark::infra::memory::MemoryRepositories;

use support::Harness;

#[tokio::test]
async fn toggling_alternates_liked_and_tracks_the_counter() {
    let harness = Harness::new();
    let author = harness.author().await;
    let reader = harness.user("Grace", "Hopper", "reader").await;
    let post = harness.post(&author, "Toggles", "on and off").await;

    for round in 1..=5u64 {
        let outcome = harness
            .engagement
            .toggle_like(reader.id, post.id)
            .await
            .expect("toggle");
        let liked = round % 2 == 1;
        assert_eq!(
            outcome,
            LikeOutcome {
                likes: u64::from(liked),
                liked
            }
        );
        assert_eq!(
            harness
                .engagement
                .has_liked(reader.id, post.id)
                .await
                .expect("has_liked"),
            liked
        );
    }
}

#[tokio::test]
async fn likes_from_different_users_accumulate() {
    let harness = Harness::new();
    let author = harness.author().await;
    let first = harness.user("Grace", "Hopper", "reader").await;
    let second = harness.user("Alan", "Turing", "reader").await;
    let post = harness.post(&author, "Popular", "liked twice").await;

    harness.engagement.toggle_like(first.id, post.id).await.expect("like");
    let outcome = harness
        .engagement
        .toggle_like(second.id, post.id)
        .await
        .expect("like");
    assert_eq!(outcome.likes, 2);

    let outcome = harness
        .engagement
        .toggle_like(first.id, post.id)
        .await
        .expect("unlike");
    assert_eq!(outcome, LikeOutcome { likes: 1, liked: false });
}

#[tokio::test]
async fn concurrent_toggles_keep_counter_consistent_with_relation() {
    let harness = Harness::new();
    let author = harness.author().await;
    let reader = harness.user("Grace", "Hopper", "reader").await;
    let post = harness.post(&author, "Racy", "double clicks").await;

    for _ in 0..10 {
        let (left, right) = tokio::join!(
            harness.engagement.toggle_like(reader.id, post.id),
            harness.engagement.toggle_like(reader.id, post.id),
        );
        left.expect("left toggle");
        right.expect("right toggle");

        let detail = harness.feed.post_detail(post.id).await.expect("detail");
        let liked = harness
            .engagement
            .has_liked(reader.id, post.id)
            .await
            .expect("has_liked");
        assert_eq!(detail.post.likes, u64::from(liked));
    }
}

#[tokio::test]
async fn toggling_a_missing_post_is_not_found() {
    let harness = Harness::new();
    let reader = harness.user("Grace", "Hopper", "reader").await;

    let err = harness
        .engagement
        .toggle_like(reader.id, Uuid::new_v4())
        .await
        .expect_err("missing post");
    assert!(matches!(err, AppError::NotFound { entity: "post" }));
}

/// Answers the first `has_like` with the opposite of the truth, as if another
/// request flipped the relation between the read and the write.
struct StaleFirstRead {
    inner: Arc<MemoryRepositories>,
    stale: AtomicBool,
}

#[async_trait]
impl LikesRepo for StaleFirstRead {
    async fn has_like(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError> {
        let actual = self.inner.has_like(user_id, post_id).await?;
        if self.stale.swap(false, Ordering::SeqCst) {
            return Ok(!actual);
        }
        Ok(actual)
    }

    async fn add_like(&self, user_id: Uuid, post_id: Uuid) -> Result<u64, RepoError> {
        self.inner.add_like(user_id, post_id).await
    }

    async fn remove_like(&self, user_id: Uuid, post_id: Uuid) -> Result<Option<u64>, RepoError> {
        self.inner.remove_like(user_id, post_id).await
    }
}

fn racing_harness() -> (Harness, Arc<StaleFirstRead>) {
    let repos = Arc::new(MemoryRepositories::new());
    let likes = Arc::new(StaleFirstRead {
        inner: repos.clone(),
        stale: AtomicBool::new(false),
    });
    (Harness::with_likes(likes.clone(), repos), likes)
}

#[tokio::test]
async fn lost_like_race_reports_current_state() {
    let (harness, likes) = racing_harness();
    let author = harness.author().await;
    let reader = harness.user("Grace", "Hopper", "reader").await;
    let post = harness.post(&author, "Contested", "body").await;

    harness.repos.add_like(reader.id, post.id).await.expect("seed like");
    likes.stale.store(true, Ordering::SeqCst);

    let outcome = harness
        .engagement
        .toggle_like(reader.id, post.id)
        .await
        .expect("lost race is not an error");
    assert_eq!(outcome, LikeOutcome { likes: 1, liked: true });
}

#[tokio::test]
async fn lost_unlike_race_never_goes_negative() {
    let (harness, likes) = racing_harness();
    let author = harness.author().await;
    let reader = harness.user("Grace", "Hopper", "reader").await;
    let post = harness.post(&author, "Contested", "body").await;

    likes.stale.store(true, Ordering::SeqCst);

    let outcome = harness
        .engagement
        .toggle_like(reader.id, post.id)
        .await
        .expect("lost race is not an error");
    assert_eq!(outcome, LikeOutcome { likes: 0, liked: false });
}

#[tokio::test]
async fn registering_a_view_purges_only_the_detail_entry() {
    let harness = Harness::new();
    let author = harness.author().await;
    let post = harness.post(&author, "Viewed", "body").await;

    harness.feed.post_detail(post.id).await.expect("detail");
    harness
        .feed
        .list_posts(&Default::default())
        .await
        .expect("list");
    harness.feed.all_posts().await.expect("all");

    harness.engagement.register_view(post.id).await.expect("view");

    assert!(harness.cache.get_value(&keys::post_detail(post.id)).is_none());
    assert!(harness.cache.get_value(&keys::all_posts()).is_some());
    assert_eq!(harness.cache.namespace_keys(keys::POST_LIST).len(), 1);

    let detail = harness.feed.post_detail(post.id).await.expect("detail");
    assert_eq!(detail.post.views, 1);

    // Lists keep the cached snapshot until their TTL runs out.
    let all = harness.feed.all_posts().await.expect("all");
    assert_eq!(all[0].views, 0);
}

#[tokio::test]
async fn registering_a_view_on_a_missing_post_is_not_found() {
    let harness = Harness::new();

    let err = harness
        .engagement
        .register_view(Uuid::new_v4())
        .await
        .expect_err("missing post");
    assert!(matches!(err, AppError::NotFound { .. }));
}
