use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::USER_AGENT;

use crate::error::ImageFetchError;
use crate::pacing::Pacer;
use crate::storage::BlobStore;

const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

pub fn image_key(product_id: &str, sequence: usize) -> String {
    format!("images/{product_id}_image_{sequence}.jpg")
}

/// Downloads listing photos and stores them next to the records.
pub struct ImageFetcher {
    client: reqwest::Client,
    store: Arc<dyn BlobStore>,
    pacer: Arc<dyn Pacer>,
}

impl ImageFetcher {
    pub fn new(store: Arc<dyn BlobStore>, pacer: Arc<dyn Pacer>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build image http client")?;
        Ok(Self {
            client,
            store,
            pacer,
        })
    }

    /// Returns the keys of the stored images, in input order. Failed
    /// downloads are dropped; their sequence numbers are not reused.
    pub async fn fetch_and_store(&self, product_id: &str, image_urls: &[String]) -> Vec<String> {
        let mut keys = Vec::with_capacity(image_urls.len());
        for (idx, url) in image_urls.iter().enumerate() {
            if idx > 0 {
                self.pacer.pace().await;
            }
            let key = image_key(product_id, idx + 1);
            match self.fetch_one(url, &key).await {
                Ok(()) => {
                    tracing::info!(uri = %self.store.uri(&key), "stored image");
                    keys.push(key);
                }
                Err(err) => tracing::warn!(product_id, error = %err, "image skipped"),
            }
        }
        keys
    }

    async fn fetch_one(&self, url: &str, key: &str) -> Result<(), ImageFetchError> {
        let transport = |source| ImageFetchError::Transport {
            url: url.to_owned(),
            source,
        };

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, concat!("vinted-scraper/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(ImageFetchError::Status {
                url: url.to_owned(),
                status: response.status(),
            });
        }
        let bytes = response.bytes().await.map_err(transport)?;

        self.store
            .put(key, bytes.to_vec(), IMAGE_CONTENT_TYPE)
            .await
            .map_err(|source| ImageFetchError::Storage {
                key: key.to_owned(),
                source,
            })
    }
}
