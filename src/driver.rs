//! Browser capability surface used by the navigator and the extractor.
//!
//! The real backend is [`crate::webdriver::WebDriverSession`]; tests drive a
//! scripted in-memory page instead.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::site::Selector;

#[async_trait]
pub trait PageElement: Send + Sync {
    async fn text(&self) -> Result<String, DriverError>;
    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError>;
    async fn click(&self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// Polls until `selector` matches a displayed, enabled element or `timeout` elapses.
    async fn wait_until_clickable(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Box<dyn PageElement>, DriverError>;

    /// `Ok(None)` when nothing matches; errors are reserved for backend failures.
    async fn find_one(&self, selector: &Selector)
    -> Result<Option<Box<dyn PageElement>>, DriverError>;

    async fn find_all(&self, selector: &Selector) -> Result<Vec<Box<dyn PageElement>>, DriverError>;

    /// Ends the browser session. Called exactly once by the orchestrator.
    async fn quit(&self) -> Result<(), DriverError>;
}

/// Opens browser sessions. The orchestrator owns each session it opens.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> anyhow::Result<Box<dyn PageDriver>>;
}
