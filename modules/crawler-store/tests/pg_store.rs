//! Integration tests against a real Postgres instance. Requires Docker and
//! the `test-utils` feature: `cargo test -p crawler-store --features test-utils`.

#![cfg(feature = "test-utils")]

use chrono::Utc;
use crawler_common::{CandidateStatus, Source, SourceMeta};
use crawler_store::testutil::postgres_store;
use crawler_store::{NewArticle, Store};
use uuid::Uuid;

fn make_source(host: &str) -> Source {
    Source {
        id: Uuid::new_v4(),
        host: host.to_string(),
        display_name: host.to_string(),
        dataset: "test".to_string(),
        meta: SourceMeta::default(),
        attempt_count: 0,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn upsert_source_is_idempotent_on_host_and_dataset() {
    let (_container, store) = postgres_store().await;

    let (id1, created1) = store.upsert_source(make_source("example.com")).await.unwrap();
    assert!(created1);

    let (id2, created2) = store.upsert_source(make_source("example.com")).await.unwrap();
    assert!(!created2);
    assert_eq!(id1, id2);
}

#[tokio::test]
async fn candidate_lifecycle_round_trips_through_postgres() {
    let (_container, store) = postgres_store().await;
    let (source_id, _) = store.upsert_source(make_source("news.example")).await.unwrap();

    let (candidate_id, inserted) = store
        .upsert_candidate("https://news.example/a?utm_source=x", source_id)
        .await
        .unwrap();
    assert!(inserted);

    let fetched = store.get_candidate(candidate_id).await.unwrap().unwrap();
    assert_eq!(fetched.url, "https://news.example/a");
    assert_eq!(fetched.status, CandidateStatus::Discovered);

    let transitioned = store
        .promote_candidate_status(candidate_id, CandidateStatus::Discovered, CandidateStatus::Verified)
        .await
        .unwrap();
    assert!(transitioned);

    let fetched = store.get_candidate(candidate_id).await.unwrap().unwrap();
    assert_eq!(fetched.status, CandidateStatus::Verified);
    assert!(fetched.verified_at.is_some());
}

#[tokio::test]
async fn batch_claim_respects_skip_locked_under_concurrent_callers() {
    let (_container, store) = postgres_store().await;
    let (source_id, _) = store.upsert_source(make_source("dupe.example")).await.unwrap();

    for i in 0..5 {
        let (cid, _) = store
            .upsert_candidate(&format!("https://dupe.example/{i}"), source_id)
            .await
            .unwrap();
        store
            .promote_candidate_status(cid, CandidateStatus::Discovered, CandidateStatus::Verified)
            .await
            .unwrap();
        store
            .promote_candidate_status(cid, CandidateStatus::Verified, CandidateStatus::Article)
            .await
            .unwrap();
    }

    let domains = vec!["dupe.example".to_string()];
    let (batch1, batch2) = tokio::join!(
        store.batch_claim_for_extraction(&domains, 3),
        store.batch_claim_for_extraction(&domains, 3)
    );
    let batch1 = batch1.unwrap();
    let batch2 = batch2.unwrap();

    let mut claimed_ids: Vec<_> = batch1.iter().chain(batch2.iter()).map(|c| c.id).collect();
    claimed_ids.sort();
    claimed_ids.dedup();
    assert_eq!(
        claimed_ids.len(),
        batch1.len() + batch2.len(),
        "no candidate should be claimed by both concurrent callers"
    );
}

#[tokio::test]
async fn insert_article_if_absent_is_unique_on_url() {
    let (_container, store) = postgres_store().await;
    let (source_id, _) = store.upsert_source(make_source("wire.example")).await.unwrap();
    let (candidate_id, _) = store
        .upsert_candidate("https://wire.example/story", source_id)
        .await
        .unwrap();

    let article = NewArticle {
        candidate_link_id: candidate_id,
        url: "https://wire.example/story".to_string(),
        title: "Headline".to_string(),
        text: Some("body text".to_string()),
        authors: vec!["A. Writer".to_string()],
        publish_date: None,
        extraction_method: "cached_snapshot".to_string(),
        proxy_status: None,
    };

    let first = store.insert_article_if_absent(article.clone()).await.unwrap();
    assert!(first.is_some());
    let second = store.insert_article_if_absent(article).await.unwrap();
    assert!(second.is_none());
}
