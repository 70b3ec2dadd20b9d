use crate::support::{item_page, Harness};
use catalog_harvest::storage::{lock_storage, AssetRef, Storage};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

/// Fetches and parses one item whose page references `images`
async fn parsed_item(h: &Harness, sku: &str, images: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/goods"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page(sku, images)))
        .mount(&h.server)
        .await;
    h.enqueue(&["1001"]);

    h.pipeline.fetch_batch(1).await.unwrap();
    let summary = h.pipeline.parse_batch(1).await.unwrap();
    assert_eq!(summary.succeeded, 1);
}

async fn serve_image(h: &Harness, image_path: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .mount(&h.server)
        .await;
}

#[tokio::test]
async fn test_assets_download_into_brand_shard() {
    let h = Harness::start().await;
    parsed_item(&h, "AC-1001", &["/img/a.jpg", "/img/b.png"]).await;
    serve_image(&h, "/img/a.jpg", 200).await;
    serve_image(&h, "/img/b.png", 200).await;

    let summary = h.pipeline.fetch_assets_batch(10).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(h.count("ASSETS_READY"), 1);

    let shard = h.dir.path().join("assets").join("ACME").join("images00001_01800");
    assert_eq!(std::fs::read(shard.join("AC-1001_1.jpg")).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    assert!(shard.join("AC-1001_2.png").exists());

    let record = lock_storage(h.pipeline.storage())
        .unwrap()
        .get_record(1)
        .unwrap()
        .unwrap()
        .record;
    assert!(matches!(&record.assets[0], Some(AssetRef::Local(p)) if p.ends_with("AC-1001_1.jpg")));
    assert!(matches!(&record.assets[1], Some(AssetRef::Local(p)) if p.ends_with("AC-1001_2.png")));
    assert_eq!(record.assets[2], None);
}

#[tokio::test]
async fn test_failed_slot_keeps_sentinel_and_fails_item() {
    let h = Harness::start().await;
    let images = [
        "/img/1.jpg",
        "/img/2.jpg",
        "/img/3.jpg",
        "/img/4.jpg",
        "/img/5.jpg",
        "/img/6.jpg",
    ];
    parsed_item(&h, "AC-1001", &images).await;
    for (i, image) in images.iter().enumerate() {
        serve_image(&h, image, if i == 2 { 404 } else { 200 }).await;
    }

    let summary = h.pipeline.fetch_assets_batch(10).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(h.count("FAILED"), 1);

    let record = lock_storage(h.pipeline.storage())
        .unwrap()
        .get_record(1)
        .unwrap()
        .unwrap()
        .record;

    let failed_url = format!("{}/img/3.jpg", h.server.uri());
    assert_eq!(record.assets[2], Some(AssetRef::Failed(failed_url.clone())));
    assert_eq!(
        record.assets[2].as_ref().unwrap().to_db_string(),
        format!("DOWNLOAD_FAILED: {}", failed_url)
    );

    let local = record
        .assets
        .iter()
        .filter(|slot| matches!(slot, Some(AssetRef::Local(_))))
        .count();
    assert_eq!(local, 5);
}

#[tokio::test]
async fn test_record_without_assets_is_ready() {
    let h = Harness::start().await;
    parsed_item(&h, "AC-1001", &[]).await;

    let summary = h.pipeline.fetch_assets_batch(10).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(h.count("ASSETS_READY"), 1);
}

#[tokio::test]
async fn test_reset_returns_everything_to_new() {
    let h = Harness::start().await;
    parsed_item(&h, "AC-1001", &["/img/a.jpg"]).await;
    serve_image(&h, "/img/a.jpg", 200).await;
    h.pipeline.fetch_assets_batch(10).await.unwrap();
    h.pipeline.cache().add("https://elsewhere.example/x");

    let reset = h.pipeline.reset_all().unwrap();

    assert_eq!(reset, 1);
    assert_eq!(h.count("NEW"), 1);
    assert_eq!(h.count("ASSETS_READY"), 0);
    assert_eq!(
        lock_storage(h.pipeline.storage())
            .unwrap()
            .count_records()
            .unwrap(),
        0
    );
    assert!(h.pipeline.cache().is_empty());
}
