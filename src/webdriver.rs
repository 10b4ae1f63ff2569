//! [`PageDriver`] backed by a WebDriver server such as chromedriver.

use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use thirtyfour::ChromeCapabilities;
use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;

use crate::config::BrowserConfig;
use crate::driver::{PageDriver, PageElement, SessionFactory};
use crate::error::DriverError;
use crate::site::Selector;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn by(selector: &Selector) -> By {
    match selector {
        Selector::Css(value) => By::Css(value.as_str()),
        Selector::XPath(value) => By::XPath(value.as_str()),
        Selector::LinkText(value) => By::LinkText(value.as_str()),
        Selector::Id(value) => By::Id(value.as_str()),
    }
}

pub struct ChromeSessionFactory {
    config: BrowserConfig,
}

impl ChromeSessionFactory {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn capabilities(&self) -> WebDriverResult<ChromeCapabilities> {
        let mut caps = DesiredCapabilities::chrome();
        if self.config.headless {
            caps.set_headless()?;
        }
        caps.set_no_sandbox()?;
        caps.set_disable_dev_shm_usage()?;
        caps.add_chrome_arg("--disable-gpu")?;
        caps.add_chrome_arg("--disable-software-rasterizer")?;
        caps.add_chrome_arg("--disable-extensions")?;
        caps.add_chrome_arg("--disable-logging")?;
        let (width, height) = self.config.window_size;
        caps.add_chrome_arg(&format!("--window-size={width},{height}"))?;
        Ok(caps)
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self) -> anyhow::Result<Box<dyn PageDriver>> {
        let caps = self.capabilities().context("build chrome capabilities")?;
        tracing::info!(
            server = %self.config.webdriver_url,
            headless = self.config.headless,
            "starting browser session"
        );
        let driver = WebDriver::new(&self.config.webdriver_url, caps)
            .await
            .with_context(|| format!("connect to webdriver at {}", self.config.webdriver_url))?;
        Ok(Box::new(WebDriverSession { driver }))
    }
}

pub struct WebDriverSession {
    driver: WebDriver,
}

struct WebDriverElement {
    element: WebElement,
}

#[async_trait]
impl PageElement for WebDriverElement {
    async fn text(&self) -> Result<String, DriverError> {
        Ok(self.element.text().await?)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        Ok(self.element.attr(name).await?)
    }

    async fn click(&self) -> Result<(), DriverError> {
        Ok(self.element.click().await?)
    }
}

fn boxed(element: WebElement) -> Box<dyn PageElement> {
    Box::new(WebDriverElement { element })
}

#[async_trait]
impl PageDriver for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.driver
            .goto(url)
            .await
            .map_err(|err| DriverError::Navigation {
                url: url.to_owned(),
                reason: err.to_string(),
            })
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn wait_until_clickable(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Box<dyn PageElement>, DriverError> {
        let found = self
            .driver
            .query(by(selector))
            .wait(timeout, POLL_INTERVAL)
            .and_clickable()
            .first()
            .await;
        match found {
            Ok(element) => Ok(boxed(element)),
            Err(WebDriverError::NoSuchElement(_)) => Err(DriverError::NotClickable {
                selector: selector.clone(),
                timeout,
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_one(
        &self,
        selector: &Selector,
    ) -> Result<Option<Box<dyn PageElement>>, DriverError> {
        match self.driver.find(by(selector)).await {
            Ok(element) => Ok(Some(boxed(element))),
            Err(WebDriverError::NoSuchElement(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<Box<dyn PageElement>>, DriverError> {
        let elements = self.driver.find_all(by(selector)).await?;
        Ok(elements.into_iter().map(boxed).collect())
    }

    async fn quit(&self) -> Result<(), DriverError> {
        self.driver.clone().quit().await?;
        Ok(())
    }
}
