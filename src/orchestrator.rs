use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Local;
use futures::FutureExt as _;
use serde::Serialize;

use crate::config::{PacingConfig, ScraperConfig, TimeoutConfig};
use crate::driver::{PageDriver, SessionFactory};
use crate::extract::Extractor;
use crate::images::ImageFetcher;
use crate::index::ProductIndex;
use crate::model::ProductRecord;
use crate::navigate::{ListingEntry, Navigator};
use crate::pacing::{MinIntervalPacer, Pacer, RandomDelay};
use crate::sink::{ResultSink, collection_key};
use crate::site::SiteProfile;
use crate::storage::BlobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    SessionOpen,
    Navigating,
    Scraping { index: usize },
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub collection_key: String,
    pub attempted: usize,
    pub saved: usize,
    pub failed: usize,
    pub final_state: RunState,
}

#[derive(Debug)]
struct Lifecycle {
    state: RunState,
}

impl Lifecycle {
    fn enter(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }
}

/// Owns the browser session for a run and drives navigation, extraction and persistence.
pub struct Orchestrator {
    sessions: Arc<dyn SessionFactory>,
    site: SiteProfile,
    timeouts: TimeoutConfig,
    max_pages: usize,
    settle: Arc<dyn Pacer>,
    product_pacer: Arc<dyn Pacer>,
    sink: ResultSink,
    images: ImageFetcher,
    index: Option<ProductIndex>,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        store: Arc<dyn BlobStore>,
        site: SiteProfile,
        timeouts: TimeoutConfig,
        pacing: &PacingConfig,
    ) -> anyhow::Result<Self> {
        let image_pacer: Arc<dyn Pacer> = Arc::new(MinIntervalPacer::new(pacing.image.clone()));
        Ok(Self {
            sessions,
            site,
            timeouts,
            max_pages: 50,
            settle: Arc::new(RandomDelay::new(pacing.settle.clone())),
            product_pacer: Arc::new(MinIntervalPacer::new(pacing.product.clone())),
            sink: ResultSink::new(Arc::clone(&store)),
            images: ImageFetcher::new(store, image_pacer)?,
            index: None,
        })
    }

    pub fn from_config(
        config: &ScraperConfig,
        sessions: Arc<dyn SessionFactory>,
        store: Arc<dyn BlobStore>,
    ) -> anyhow::Result<Self> {
        let mut orchestrator = Self::new(
            sessions,
            store,
            config.site.clone(),
            config.timeouts,
            &config.pacing,
        )?
        .with_max_pages(config.max_pages);
        if let Some(path) = config.index_db.as_deref() {
            orchestrator = orchestrator.with_index(ProductIndex::open(path)?);
        }
        Ok(orchestrator)
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_index(mut self, index: ProductIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Scrapes up to `max_items` products into today's collection.
    ///
    /// A failed navigation ends the run with an error; a failed product is
    /// logged and skipped. The session is closed on every path.
    pub async fn run(&self, max_items: usize, entry: &ListingEntry) -> anyhow::Result<RunSummary> {
        let collection_key = collection_key(Local::now().date_naive());
        let mut lifecycle = Lifecycle {
            state: RunState::Idle,
        };

        let driver = self
            .sessions
            .open()
            .await
            .context("open browser session")?;
        lifecycle.enter(RunState::SessionOpen);

        let outcome = guarded(
            driver.as_ref(),
            self.scrape_listing(
                driver.as_ref(),
                max_items,
                entry,
                &collection_key,
                &mut lifecycle,
            ),
        )
        .await;
        lifecycle.enter(RunState::Closed);

        let mut summary = outcome?;
        summary.final_state = lifecycle.state;
        tracing::info!(
            collection = %summary.collection_key,
            attempted = summary.attempted,
            saved = summary.saved,
            failed = summary.failed,
            "run finished"
        );
        Ok(summary)
    }

    async fn scrape_listing(
        &self,
        driver: &dyn PageDriver,
        max_items: usize,
        entry: &ListingEntry,
        collection_key: &str,
        lifecycle: &mut Lifecycle,
    ) -> anyhow::Result<RunSummary> {
        lifecycle.enter(RunState::Navigating);
        let mut navigator = self.navigator(driver);
        navigator
            .reach_listing_page(entry)
            .await
            .context("reach listing page")?;

        let mut summary = RunSummary {
            collection_key: collection_key.to_owned(),
            attempted: 0,
            saved: 0,
            failed: 0,
            final_state: lifecycle.state,
        };

        while summary.attempted < max_items {
            let urls = navigator
                .collect_page_urls(max_items - summary.attempted)
                .await;
            for url in urls {
                lifecycle.enter(RunState::Scraping {
                    index: summary.attempted,
                });
                self.product_pacer.pace().await;
                summary.attempted += 1;

                let saved = match self.scrape_product(driver, &url).await {
                    Ok(record) => self.persist(collection_key, &record).await,
                    Err(err) => Err(err),
                };
                match saved {
                    Ok(()) => summary.saved += 1,
                    Err(err) => {
                        summary.failed += 1;
                        tracing::warn!(url, ?err, "product skipped");
                    }
                }
            }

            if summary.attempted >= max_items || !navigator.advance_page().await {
                break;
            }
        }

        Ok(summary)
    }

    /// Candidate product URLs, without visiting them.
    pub async fn list(&self, max_items: usize, entry: &ListingEntry) -> anyhow::Result<Vec<String>> {
        let driver = self
            .sessions
            .open()
            .await
            .context("open browser session")?;

        guarded(driver.as_ref(), async {
            let mut navigator = self.navigator(driver.as_ref());
            navigator
                .reach_listing_page(entry)
                .await
                .context("reach listing page")?;
            anyhow::Ok(navigator.collect_candidate_urls(max_items).await)
        })
        .await
    }

    /// Scrapes one product page and saves it as a single-record dump.
    ///
    /// Unlike [`Orchestrator::run`], storage failures are returned.
    pub async fn scrape_single(&self, url: &str, append: bool) -> anyhow::Result<ProductRecord> {
        let driver = self
            .sessions
            .open()
            .await
            .context("open browser session")?;

        guarded(driver.as_ref(), async {
            let record = self.scrape_product(driver.as_ref(), url).await?;
            self.sink
                .save_product(&record)
                .await
                .context("save product")?;
            if append {
                let key = collection_key(Local::now().date_naive());
                self.sink
                    .append(&key, &record)
                    .await
                    .context("append product")?;
            }
            self.index_record(&record);
            anyhow::Ok(record)
        })
        .await
    }

    fn navigator<'a>(&'a self, driver: &'a dyn PageDriver) -> Navigator<'a> {
        Navigator::new(
            driver,
            &self.site,
            self.timeouts.step,
            Arc::clone(&self.settle),
            self.max_pages,
        )
    }

    async fn scrape_product(
        &self,
        driver: &dyn PageDriver,
        url: &str,
    ) -> anyhow::Result<ProductRecord> {
        tracing::info!(url, "scraping product");
        driver
            .navigate(url)
            .await
            .with_context(|| format!("open product page {url}"))?;
        self.settle.pace().await;

        let mut record = Extractor::new(&self.site, self.timeouts.field)
            .extract(driver, url)
            .await;
        let paths = self
            .images
            .fetch_and_store(&record.id, &record.image_urls)
            .await;
        record.set_image_paths(paths);

        if tracing::enabled!(tracing::Level::DEBUG) {
            match serde_json::to_string_pretty(&record) {
                Ok(json) => tracing::debug!(%json, "product data"),
                Err(err) => tracing::debug!(?err, "product data not printable"),
            }
        }
        tracing::info!(
            id = %record.id,
            title = %record.title,
            images = record.image_count(),
            "scraped product"
        );
        Ok(record)
    }

    async fn persist(&self, collection_key: &str, record: &ProductRecord) -> anyhow::Result<()> {
        self.sink
            .append(collection_key, record)
            .await
            .context("append to collection")?;
        self.index_record(record);
        Ok(())
    }

    fn index_record(&self, record: &ProductRecord) {
        if let Some(index) = &self.index {
            if let Err(err) = index.insert(record) {
                tracing::warn!(id = %record.id, ?err, "index insert failed");
            }
        }
    }
}

/// Runs `work`, then closes the session even if `work` panicked.
async fn guarded<T>(
    driver: &dyn PageDriver,
    work: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    let outcome = AssertUnwindSafe(work).catch_unwind().await;
    close_session(driver).await;
    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn close_session(driver: &dyn PageDriver) {
    tracing::info!("closing browser session");
    if let Err(err) = driver.quit().await {
        tracing::warn!(?err, "browser session did not close cleanly");
    }
}
