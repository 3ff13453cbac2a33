mod support;

use std::collections::HashSet;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use metrics_util::debugging::DebuggingRecorder;
use time::Duration;
use tower::ServiceExt;

use penmark::cache::keys;
use penmark::infra::http::build_router;

use support::Harness;

#[tokio::test]
async fn cache_and_http_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let harness = Harness::new();
    let author = harness.author().await;
    let post = harness.post(&author, "Metered", "body").await;

    // miss, then hit
    harness.feed.post_detail(post.id).await.expect("detail");
    harness.feed.post_detail(post.id).await.expect("detail");

    harness.engagement.register_view(post.id).await.expect("view");

    harness.feed.all_posts().await.expect("all");
    harness.clock.advance(Duration::hours(1));
    assert_eq!(harness.cache.sweep_expired(), 1);
    assert!(harness.cache.get_value(&keys::all_posts()).is_none());

    let response = build_router(harness.http_state())
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router is infallible");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        "penmark_cache_hit_total",
        "penmark_cache_miss_total",
        "penmark_cache_evict_total",
        "penmark_cache_invalidated_total",
        "penmark_http_request_ms",
    ] {
        assert!(names.contains(expected), "missing metric `{expected}` in {names:?}");
    }
}
