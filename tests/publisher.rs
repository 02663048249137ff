// tests/publisher.rs
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use event_sync::ingest::Record;
use event_sync::publish::mock::MockBackend;
use event_sync::publish::{PublishOutcome, Publisher, SessionState, SkipReason};
use event_sync::SyncError;

fn rec(key: &str) -> Record {
    Record {
        key: key.into(),
        occurs_at: Utc.with_ymd_and_hms(2018, 11, 20, 18, 30, 0).unwrap(),
        title: format!("{key} night"),
        summary: "An event held by SD Rust for Rustaceans".into(),
        body: String::new(),
        origin_url: Some(format!("https://meetup.test/{key}")),
    }
}

async fn connected(backend: Arc<MockBackend>) -> Publisher {
    let p = Publisher::new(backend);
    p.connect().await.expect("mock login");
    p
}

#[tokio::test]
async fn one_tag_per_source_regardless_of_order() {
    let backend = Arc::new(MockBackend::new());
    let p = connected(backend.clone()).await;

    p.publish("Meetup", &rec("B"), None).await.unwrap();
    p.publish("Meetup", &rec("A"), None).await.unwrap();

    let tags = backend.tags();
    assert_eq!(tags.iter().filter(|t| t.name == "Meetup").count(), 1);
    assert_eq!(backend.create_tag_calls(), 1);
    // cached after the first resolution
    assert_eq!(backend.list_tag_calls(), 1);

    let posts = backend.created_posts();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p.tags[0].name == "Meetup"));
}

#[tokio::test]
async fn existing_tag_is_reused() {
    let backend = Arc::new(MockBackend::new());
    let seeded = backend.seed_tag("Meetup");
    let p = connected(backend.clone()).await;

    p.publish("Meetup", &rec("A"), Some("https://img.test/logo.png"))
        .await
        .unwrap();
    assert_eq!(backend.create_tag_calls(), 0);
    assert_eq!(backend.created_posts()[0].tags, vec![seeded]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishers_share_one_tag() {
    let backend = Arc::new(MockBackend::new());
    let p = Arc::new(connected(backend.clone()).await);

    let mut handles = Vec::new();
    for i in 0..8 {
        let p = p.clone();
        handles.push(tokio::spawn(async move {
            p.publish("Meetup", &rec(&format!("E{i}")), None).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    assert_eq!(backend.create_tag_calls(), 1);
    assert_eq!(backend.created_posts().len(), 8);
}

#[tokio::test]
async fn incomplete_record_is_skipped_without_backend_calls() {
    let backend = Arc::new(MockBackend::new());
    let p = connected(backend.clone()).await;

    let mut r = rec("A");
    r.title.clear();
    let out = p.publish("Meetup", &r, None).await.unwrap();
    assert_eq!(out, PublishOutcome::Skipped(SkipReason::Incomplete));
    assert!(backend.created_posts().is_empty());
    assert_eq!(backend.list_tag_calls(), 0);
}

#[tokio::test]
async fn post_fields_follow_the_record() {
    let backend = Arc::new(MockBackend::new());
    let p = connected(backend.clone()).await;

    let mut r = rec("A");
    r.title = "x".repeat(300);
    p.publish("Meetup", &r, None).await.unwrap();

    let post = &backend.created_posts()[0];
    assert_eq!(post.title.chars().count(), 255);
    assert_eq!(post.custom_excerpt, r.summary);
    assert_eq!(
        post.markdown,
        format!("{}\n\n[Original Source](https://meetup.test/A)", r.summary)
    );
    assert_eq!(post.status, "published");
    assert_eq!(post.visibility, "public");
    assert!(!post.featured && !post.page);
}

#[tokio::test]
async fn failed_post_does_not_block_the_next() {
    let backend = Arc::new(MockBackend::new());
    backend.fail_post_titled("A night");
    let p = connected(backend.clone()).await;

    assert!(matches!(
        p.publish("Meetup", &rec("A"), None).await,
        Err(SyncError::Transport(_))
    ));
    assert!(matches!(
        p.publish("Meetup", &rec("B"), None).await,
        Ok(PublishOutcome::Published { .. })
    ));
    assert!(p.is_connected().await);
}

#[tokio::test]
async fn same_key_is_published_once() {
    let backend = Arc::new(MockBackend::new());
    let p = connected(backend.clone()).await;

    p.publish("Meetup", &rec("A"), None).await.unwrap();
    let again = p.publish("Meetup", &rec("A"), None).await.unwrap();
    assert_eq!(again, PublishOutcome::Skipped(SkipReason::AlreadyPublished));
    assert_eq!(backend.created_posts().len(), 1);

    // Another source may use the same key.
    p.publish("Eventbrite", &rec("A"), None).await.unwrap();
    assert_eq!(backend.created_posts().len(), 2);
}

#[tokio::test]
async fn failed_login_makes_operations_no_ops() {
    let backend = Arc::new(MockBackend::new());
    backend.fail_login(true);
    let p = Publisher::new(backend.clone());

    assert!(matches!(p.connect().await, Err(SyncError::BackendAuth(_))));
    assert_eq!(p.state().await, SessionState::Disconnected);

    assert!(matches!(
        p.publish("Meetup", &rec("A"), None).await,
        Err(SyncError::NotConnected)
    ));
    assert!(matches!(
        p.delete_posts("Meetup").await,
        Err(SyncError::NotConnected)
    ));
    assert!(backend.created_posts().is_empty());
    assert_eq!(backend.list_tag_calls(), 0);

    // A later connect recovers.
    backend.fail_login(false);
    p.connect().await.unwrap();
    assert!(p.publish("Meetup", &rec("A"), None).await.is_ok());
}

#[tokio::test]
async fn dedup_memory_is_bounded() {
    let backend = Arc::new(MockBackend::new());
    let p = Publisher::new(backend.clone()).with_dedup_capacity(2);
    p.connect().await.unwrap();

    for key in ["A", "B", "C"] {
        p.publish("Meetup", &rec(key), None).await.unwrap();
    }
    assert_eq!(p.remembered(), 2);

    // C is still remembered, A was evicted first.
    let c = p.publish("Meetup", &rec("C"), None).await.unwrap();
    assert_eq!(c, PublishOutcome::Skipped(SkipReason::AlreadyPublished));
    let a = p.publish("Meetup", &rec("A"), None).await.unwrap();
    assert!(matches!(a, PublishOutcome::Published { .. }));
    assert_eq!(backend.created_posts().len(), 4);
    assert_eq!(p.remembered(), 2);
}
