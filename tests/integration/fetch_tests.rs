use crate::support::Harness;
use catalog_harvest::storage::{lock_storage, Storage};
use catalog_harvest::HarvestError;
use catalog_harvest::ItemStatus;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_fetch_batch_writes_raw_pages() {
    let h = Harness::start().await;

    for id in ["1001", "1002"] {
        Mock::given(method("GET"))
            .and(path("/goods"))
            .and(query_param("goodsNo", id))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("<p>item {}</p>", id)))
            .expect(1)
            .mount(&h.server)
            .await;
    }
    h.enqueue(&["1001", "1002"]);

    let summary = h.pipeline.fetch_batch(10).await.unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(h.count("FETCHED"), 2);
    assert_eq!(h.count("FETCHING"), 0);

    let body = std::fs::read_to_string(h.raw_page("1001")).unwrap();
    assert_eq!(body, "<p>item 1001</p>");
    assert!(h.raw_page("1002").exists());
}

#[tokio::test]
async fn test_fetch_gives_up_after_max_attempts() {
    let h = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/goods"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&h.server)
        .await;
    h.enqueue(&["2001"]);

    let summary = h.pipeline.fetch_batch(1).await.unwrap();

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(h.count("FAILED"), 1);
    assert!(!h.raw_page("2001").exists());
}

#[tokio::test]
async fn test_fetch_recovers_after_transient_error() {
    let h = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/goods"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/goods"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&h.server)
        .await;
    h.enqueue(&["3001"]);

    let summary = h.pipeline.fetch_batch(1).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(h.count("FETCHED"), 1);
}

#[tokio::test]
async fn test_fetch_claims_at_most_batch_size() {
    let h = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/goods"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(2)
        .mount(&h.server)
        .await;
    h.enqueue(&["1", "2", "3", "4", "5"]);

    let summary = h.pipeline.fetch_batch(2).await.unwrap();

    assert_eq!(summary.processed(), 2);
    assert_eq!(h.count("FETCHED"), 2);
    assert_eq!(h.count("NEW"), 3);

    // lowest ids are claimed first
    let fetched = lock_storage(h.pipeline.storage())
        .unwrap()
        .items_by_status(ItemStatus::Fetched)
        .unwrap();
    let ids: Vec<i64> = fetched.iter().map(|item| item.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_empty_queue_is_a_no_op() {
    let h = Harness::start().await;

    let summary = h.pipeline.fetch_batch(50).await.unwrap();

    assert_eq!(summary.processed(), 0);
    assert_eq!(h.count("TOTAL"), 0);
}

#[tokio::test]
async fn test_batch_size_is_validated() {
    let h = Harness::start().await;

    for bad in [0, 1001] {
        assert!(matches!(
            h.pipeline.fetch_batch(bad).await,
            Err(HarvestError::InvalidArgument(_))
        ));
        assert!(h.pipeline.parse_batch(bad).await.is_err());
        assert!(h.pipeline.fetch_assets_batch(bad).await.is_err());
    }
}
