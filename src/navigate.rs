use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::driver::PageDriver;
use crate::error::{DriverError, NavigationError};
use crate::pacing::Pacer;
use crate::site::{NavStep, SiteProfile};

/// Where traversal of the product listing starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEntry {
    /// Home page, popups, then the fixed category path. Every step is required.
    Category,
    /// A catalog or search URL; popups are dismissed when they show up.
    Url(String),
}

/// Drives the browser to the listing and walks its pages.
pub struct Navigator<'a> {
    driver: &'a dyn PageDriver,
    site: &'a SiteProfile,
    step_timeout: Duration,
    settle: Arc<dyn Pacer>,
    max_pages: usize,
    listing_url: Option<String>,
    pages_seen: usize,
}

impl<'a> Navigator<'a> {
    pub fn new(
        driver: &'a dyn PageDriver,
        site: &'a SiteProfile,
        step_timeout: Duration,
        settle: Arc<dyn Pacer>,
        max_pages: usize,
    ) -> Self {
        Self {
            driver,
            site,
            step_timeout,
            settle,
            max_pages: max_pages.max(1),
            listing_url: None,
            pages_seen: 0,
        }
    }

    pub async fn reach_listing_page(&mut self, entry: &ListingEntry) -> Result<(), NavigationError> {
        let start_url = match entry {
            ListingEntry::Category => self.site.home_url.as_str(),
            ListingEntry::Url(url) => url.as_str(),
        };
        tracing::info!(url = start_url, "opening start page");
        self.driver
            .navigate(start_url)
            .await
            .map_err(|source| NavigationError {
                step: format!("load {start_url}"),
                source,
            })?;
        self.settle.pace().await;

        for step in &self.site.popup_steps {
            match entry {
                ListingEntry::Category => self.perform(step).await?,
                ListingEntry::Url(_) => {
                    if let Err(err) = self.perform(step).await {
                        tracing::info!(step = %step.label, error = %err.source, "popup not shown; continuing");
                    }
                }
            }
        }
        if *entry == ListingEntry::Category {
            for step in &self.site.category_steps {
                self.perform(step).await?;
            }
        }

        self.listing_url = None;
        self.pages_seen = 0;
        Ok(())
    }

    async fn perform(&self, step: &NavStep) -> Result<(), NavigationError> {
        tracing::info!(step = %step.label, "navigation step");
        let fail = |source| NavigationError {
            step: step.label.clone(),
            source,
        };
        let element = self
            .driver
            .wait_until_clickable(&step.selector, self.step_timeout)
            .await
            .map_err(fail)?;
        element.click().await.map_err(fail)?;
        self.settle.pace().await;
        Ok(())
    }

    /// Product URLs on the current listing page, at most `limit`.
    ///
    /// An empty page yields an empty list, never an error.
    pub async fn collect_page_urls(&mut self, limit: usize) -> Vec<String> {
        let page_url = match self.driver.current_url().await {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(?err, "cannot read listing url");
                return Vec::new();
            }
        };
        self.listing_url = Some(page_url.clone());
        self.pages_seen += 1;

        let links = match self.driver.find_all(&self.site.product_link).await {
            Ok(links) => links,
            Err(err) => {
                tracing::warn!(?err, "product link lookup failed");
                return Vec::new();
            }
        };

        let mut urls = Vec::new();
        for link in links {
            if urls.len() >= limit {
                break;
            }
            match link.attribute("href").await {
                Ok(Some(href)) => match resolve_href(&page_url, &href) {
                    Some(url) => urls.push(url),
                    None => tracing::debug!(href, "skipping unusable product link"),
                },
                Ok(None) => {}
                Err(err) => tracing::debug!(?err, "skipping unreadable product link"),
            }
        }
        tracing::info!(page = self.pages_seen, found = urls.len(), "collected product links");
        urls
    }

    /// Moves to the next listing page. `false` means traversal is over.
    pub async fn advance_page(&mut self) -> bool {
        if self.pages_seen >= self.max_pages {
            tracing::info!(max_pages = self.max_pages, "page limit reached");
            return false;
        }
        let Some(listing_url) = self.listing_url.clone() else {
            return false;
        };

        if let Err(err) = self.return_to(&listing_url).await {
            tracing::warn!(?err, url = %listing_url, "cannot return to listing page");
            return false;
        }

        let next = match self.driver.find_one(&self.site.next_page).await {
            Ok(Some(next)) => next,
            Ok(None) => {
                tracing::info!("no next page");
                return false;
            }
            Err(err) => {
                tracing::info!(?err, "next page lookup failed; stopping");
                return false;
            }
        };
        if let Err(err) = next.click().await {
            tracing::info!(?err, "next page not clickable; stopping");
            return false;
        }
        self.settle.pace().await;
        true
    }

    async fn return_to(&self, listing_url: &str) -> Result<(), DriverError> {
        if self.driver.current_url().await? != listing_url {
            self.driver.navigate(listing_url).await?;
            self.settle.pace().await;
        }
        Ok(())
    }

    /// Walks listing pages until `max_items` URLs are collected or the last page.
    pub async fn collect_candidate_urls(&mut self, max_items: usize) -> Vec<String> {
        let mut urls = Vec::new();
        while urls.len() < max_items {
            let page = self.collect_page_urls(max_items - urls.len()).await;
            urls.extend(page);
            if urls.len() >= max_items || !self.advance_page().await {
                break;
            }
        }
        urls
    }
}

fn resolve_href(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let resolved = match Url::parse(page_url) {
        Ok(base) => base.join(href).ok()?,
        Err(_) => Url::parse(href).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}
