use std::time::Duration;

use crate::site::Selector;

/// Failure reported by a [`crate::driver::PageDriver`] backend.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("webdriver: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("{selector} did not become clickable within {timeout:?}")]
    NotClickable { selector: Selector, timeout: Duration },

    #[error("navigate to {url}: {reason}")]
    Navigation { url: String, reason: String },
}

/// A single field could not be read from the page.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("no element matches {0}")]
    Missing(Selector),

    #[error("element {selector} has no `{attribute}` attribute")]
    MissingAttribute {
        selector: Selector,
        attribute: String,
    },

    #[error("lookup of {selector} timed out after {timeout:?}")]
    TimedOut { selector: Selector, timeout: Duration },

    #[error("lookup of {selector}: {source}")]
    Driver {
        selector: Selector,
        #[source]
        source: DriverError,
    },
}

/// A required step of the fixed listing navigation never became interactable.
#[derive(Debug, thiserror::Error)]
#[error("navigation step `{step}` failed")]
pub struct NavigationError {
    pub step: String,
    #[source]
    pub source: DriverError,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageFetchError {
    #[error("GET {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("store image {key}: {source:#}")]
    Storage { key: String, source: anyhow::Error },
}
