use crate::support::{item_page, Harness};
use catalog_harvest::storage::{lock_storage, AssetRef, Storage};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

async fn serve_item(h: &Harness, id: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/goods"))
        .and(query_param("goodsNo", id))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&h.server)
        .await;
}

#[tokio::test]
async fn test_parse_extracts_record_from_fetched_page() {
    let h = Harness::start().await;
    serve_item(
        &h,
        "1001",
        item_page("AC-1001", &["/img/1.jpg", "https://cdn.example.com/2.png"]),
    )
    .await;
    h.enqueue(&["1001"]);

    h.pipeline.fetch_batch(10).await.unwrap();
    let summary = h.pipeline.parse_batch(10).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(h.count("PARSED"), 1);

    let stored = lock_storage(h.pipeline.storage())
        .unwrap()
        .get_record(1)
        .unwrap()
        .expect("record should exist");
    let record = stored.record;
    assert_eq!(record.brand.as_deref(), Some("Acme"));
    assert_eq!(record.name.as_deref(), Some("Trail Runner"));
    assert_eq!(record.external_id, "AC-1001");
    assert_eq!(record.price, 79000);
    assert_eq!(
        record.assets[0],
        Some(AssetRef::Remote(format!("{}/img/1.jpg", h.server.uri())))
    );
    assert_eq!(
        record.assets[1],
        Some(AssetRef::Remote("https://cdn.example.com/2.png".to_string()))
    );
    assert_eq!(record.assets[2], None);
}

#[tokio::test]
async fn test_page_without_identifier_fails() {
    let h = Harness::start().await;
    serve_item(&h, "1001", "<html><h1>Gone</h1></html>".to_string()).await;
    serve_item(&h, "1002", item_page("AC-1002", &[])).await;
    h.enqueue(&["1001", "1002"]);

    h.pipeline.fetch_batch(10).await.unwrap();
    let summary = h.pipeline.parse_batch(10).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(h.count("FAILED"), 1);
    assert_eq!(h.count("PARSED"), 1);
    assert_eq!(
        lock_storage(h.pipeline.storage())
            .unwrap()
            .count_records()
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_missing_raw_page_fails() {
    let h = Harness::start().await;
    serve_item(&h, "1001", item_page("AC-1001", &[])).await;
    h.enqueue(&["1001"]);

    h.pipeline.fetch_batch(1).await.unwrap();
    std::fs::remove_file(h.raw_page("1001")).unwrap();

    let summary = h.pipeline.parse_batch(1).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(h.count("FAILED"), 1);
}

#[tokio::test]
async fn test_parse_only_sees_fetched_items() {
    let h = Harness::start().await;
    h.enqueue(&["1001"]);

    let summary = h.pipeline.parse_batch(10).await.unwrap();

    assert_eq!(summary.processed(), 0);
    assert_eq!(h.count("NEW"), 1);
}
