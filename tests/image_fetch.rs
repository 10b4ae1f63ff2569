mod http_stub;

use std::sync::Arc;

use http_stub::HttpStub;
use vinted_scraper::images::ImageFetcher;
use vinted_scraper::pacing::NoPacing;
use vinted_scraper::storage::{BlobStore as _, MemoryBlobStore};

#[tokio::test]
async fn failed_download_leaves_a_gap_in_numbering() -> anyhow::Result<()> {
    let stub = HttpStub::spawn(|req| match req.url.as_str() {
        "/photos/a.jpg" => (200, b"jpeg-a".to_vec()),
        "/photos/c.jpg" => (200, b"jpeg-c".to_vec()),
        _ => (404, b"gone".to_vec()),
    });
    let store = Arc::new(MemoryBlobStore::new());
    let fetcher = ImageFetcher::new(store.clone(), Arc::new(NoPacing))?;

    let urls = ["a", "b", "c"]
        .iter()
        .map(|name| format!("{}/photos/{name}.jpg", stub.base_url))
        .collect::<Vec<_>>();
    let keys = fetcher.fetch_and_store("p-1", &urls).await;

    assert_eq!(
        keys,
        vec![
            "images/p-1_image_1.jpg".to_owned(),
            "images/p-1_image_3.jpg".to_owned()
        ]
    );
    assert_eq!(
        store.get("images/p-1_image_3.jpg").await?,
        Some(b"jpeg-c".to_vec())
    );
    assert_eq!(
        store.content_type("images/p-1_image_1.jpg").await.as_deref(),
        Some("image/jpeg")
    );
    assert_eq!(stub.requests().len(), 3);
    Ok(())
}

#[tokio::test]
async fn unreachable_host_is_skipped() -> anyhow::Result<()> {
    let store = Arc::new(MemoryBlobStore::new());
    let fetcher = ImageFetcher::new(store.clone(), Arc::new(NoPacing))?;

    let keys = fetcher
        .fetch_and_store("p-2", &["http://127.0.0.1:9/nothing.jpg".to_owned()])
        .await;

    assert!(keys.is_empty());
    assert!(store.keys().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn no_images_means_no_requests() -> anyhow::Result<()> {
    let stub = HttpStub::spawn(|_| (200, Vec::new()));
    let fetcher = ImageFetcher::new(Arc::new(MemoryBlobStore::new()), Arc::new(NoPacing))?;

    assert!(fetcher.fetch_and_store("p-3", &[]).await.is_empty());
    assert!(stub.requests().is_empty());
    Ok(())
}
