use std::sync::Arc;

use vinted_scraper::model::ProductRecord;
use vinted_scraper::sink::ResultSink;
use vinted_scraper::storage::LocalFsBlobStore;

const KEY: &str = "vinted_products_20240309.json";

fn read_ids(path: &std::path::Path) -> anyhow::Result<Vec<String>> {
    let entries: Vec<serde_json::Value> = serde_json::from_slice(&std::fs::read(path)?)?;
    Ok(entries
        .iter()
        .map(|e| e["id"].as_str().unwrap_or_default().to_owned())
        .collect())
}

#[tokio::test]
async fn appends_preserve_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = ResultSink::new(Arc::new(LocalFsBlobStore::new(dir.path())));
    let first = ProductRecord::new("https://shop.test/items/1");
    let second = ProductRecord::new("https://shop.test/items/2");

    sink.append(KEY, &first).await?;
    sink.append(KEY, &second).await?;

    assert_eq!(
        read_ids(&dir.path().join(KEY))?,
        vec![first.id.clone(), second.id.clone()]
    );
    Ok(())
}

#[tokio::test]
async fn malformed_collection_starts_over() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join(KEY), "{ not json")?;
    let sink = ResultSink::new(Arc::new(LocalFsBlobStore::new(dir.path())));
    let record = ProductRecord::new("https://shop.test/items/3");

    assert!(sink.read_collection(KEY).await.is_empty());
    sink.append(KEY, &record).await?;

    assert_eq!(read_ids(&dir.path().join(KEY))?, vec![record.id.clone()]);
    Ok(())
}

#[tokio::test]
async fn foreign_entries_are_kept_verbatim() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join(KEY), r#"[{"id":"legacy","extra":true}]"#)?;
    let sink = ResultSink::new(Arc::new(LocalFsBlobStore::new(dir.path())));

    sink.append(KEY, &ProductRecord::new("https://shop.test/items/4"))
        .await?;

    let entries = sink.read_collection(KEY).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], serde_json::json!({"id": "legacy", "extra": true}));
    Ok(())
}

#[tokio::test]
async fn saved_record_is_pretty_json() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = ResultSink::new(Arc::new(LocalFsBlobStore::new(dir.path())));
    let mut record = ProductRecord::new("https://shop.test/items/5");
    record.set_image_paths(vec!["images/x_image_1.jpg".to_owned()]);

    let key = sink.save_product(&record).await?;

    let raw = std::fs::read_to_string(dir.path().join(&key))?;
    assert!(raw.contains("\n  \"id\""));
    let parsed: ProductRecord = serde_json::from_str(&raw)?;
    assert_eq!(parsed.image_count(), 1);
    assert_eq!(parsed.id, record.id);
    Ok(())
}
