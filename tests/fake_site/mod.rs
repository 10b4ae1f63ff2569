#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vinted_scraper::driver::{PageDriver, PageElement, SessionFactory};
use vinted_scraper::error::DriverError;
use vinted_scraper::site::{Field, FieldSpec, NavStep, ParseRule, Selector, SiteProfile};

pub const HOME: &str = "https://shop.test/";
pub const CATALOG: &str = "https://shop.test/catalog";

/// Selectors for a minimal storefront served by [`FakeSite`].
pub fn test_profile() -> SiteProfile {
    let spec = |field, css: &str, rule| FieldSpec {
        field,
        selector: Selector::css(css),
        rule,
    };
    SiteProfile {
        home_url: HOME.to_owned(),
        popup_steps: vec![NavStep {
            label: "accept cookies".to_owned(),
            selector: Selector::id("cookies"),
        }],
        category_steps: vec![NavStep {
            label: "open Women category".to_owned(),
            selector: Selector::link_text("Women"),
        }],
        product_link: Selector::css("a.item"),
        next_page: Selector::css("a.next"),
        images: Selector::css("img.photo"),
        fields: vec![
            spec(Field::Title, ".title", ParseRule::Text),
            spec(Field::Price, ".price", ParseRule::Amount),
            spec(Field::Likes, ".likes", ParseRule::Count),
            spec(Field::Brand, ".brand", ParseRule::Text),
            spec(Field::SellerName, ".seller .name", ParseRule::Text),
            spec(Field::SellerRating, ".seller .rating", ParseRule::Text),
            spec(
                Field::SellerImage,
                ".seller img",
                ParseRule::Attribute("src".to_owned()),
            ),
        ],
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    text: String,
    attrs: HashMap<String, String>,
    opens: Option<String>,
}

impl FakeElement {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            ..Self::default()
        }
    }

    pub fn link(href: &str) -> Self {
        Self::default().with_attr("href", href)
    }

    /// Clickable control; clicking loads `target` when given.
    pub fn button(target: Option<&str>) -> Self {
        Self {
            opens: target.map(str::to_owned),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_owned(), value.to_owned());
        self
    }
}

#[derive(Default)]
struct State {
    current: String,
    pages: HashMap<String, HashMap<Selector, Vec<FakeElement>>>,
    broken: HashSet<String>,
    panicking: HashSet<String>,
    visits: Vec<String>,
}

/// Scripted browser: pages keyed by URL, elements keyed by selector.
#[derive(Default)]
pub struct FakeSite {
    state: Mutex<State>,
    opened: AtomicUsize,
    quits: AtomicUsize,
}

impl FakeSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, url: &str, selector: Selector, element: FakeElement) -> &Self {
        self.state
            .lock()
            .expect("fake site lock")
            .pages
            .entry(url.to_owned())
            .or_default()
            .entry(selector)
            .or_default()
            .push(element);
        self
    }

    /// Navigating to `url` fails.
    pub fn break_url(&self, url: &str) -> &Self {
        self.state
            .lock()
            .expect("fake site lock")
            .broken
            .insert(url.to_owned());
        self
    }

    /// Navigating to `url` panics inside the driver.
    pub fn panic_on(&self, url: &str) -> &Self {
        self.state
            .lock()
            .expect("fake site lock")
            .panicking
            .insert(url.to_owned());
        self
    }

    /// Home page with the cookie popup and the category link to [`CATALOG`].
    pub fn with_storefront(&self) -> &Self {
        self.add(HOME, Selector::id("cookies"), FakeElement::button(None))
            .add(
                HOME,
                Selector::link_text("Women"),
                FakeElement::button(Some(CATALOG)),
            )
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn quits(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().expect("fake site lock").visits.clone()
    }

    pub fn driver(self: &Arc<Self>) -> FakeDriver {
        FakeDriver {
            site: Arc::clone(self),
        }
    }

    fn load(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().expect("fake site lock");
        state.visits.push(url.to_owned());
        if state.panicking.contains(url) {
            drop(state);
            panic!("driver crashed on {url}");
        }
        if state.broken.contains(url) {
            return Err(DriverError::Navigation {
                url: url.to_owned(),
                reason: "connection reset".to_owned(),
            });
        }
        state.current = url.to_owned();
        Ok(())
    }

    fn matching(&self, selector: &Selector) -> Vec<FakeElement> {
        let state = self.state.lock().expect("fake site lock");
        state
            .pages
            .get(&state.current)
            .and_then(|page| page.get(selector))
            .cloned()
            .unwrap_or_default()
    }
}

pub struct FakeSessions(pub Arc<FakeSite>);

#[async_trait]
impl SessionFactory for FakeSessions {
    async fn open(&self) -> anyhow::Result<Box<dyn PageDriver>> {
        self.0.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.0.driver()))
    }
}

pub struct FakeDriver {
    site: Arc<FakeSite>,
}

struct BoundElement {
    site: Arc<FakeSite>,
    element: FakeElement,
}

#[async_trait]
impl PageElement for BoundElement {
    async fn text(&self) -> Result<String, DriverError> {
        Ok(self.element.text.clone())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        Ok(self.element.attrs.get(name).cloned())
    }

    async fn click(&self) -> Result<(), DriverError> {
        match &self.element.opens {
            Some(target) => self.site.load(target),
            None => Ok(()),
        }
    }
}

impl FakeDriver {
    fn bind(&self, element: FakeElement) -> Box<dyn PageElement> {
        Box::new(BoundElement {
            site: Arc::clone(&self.site),
            element,
        })
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.site.load(url)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.site.state.lock().expect("fake site lock").current.clone())
    }

    async fn wait_until_clickable(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Box<dyn PageElement>, DriverError> {
        match self.site.matching(selector).into_iter().next() {
            Some(element) => Ok(self.bind(element)),
            None => Err(DriverError::NotClickable {
                selector: selector.clone(),
                timeout,
            }),
        }
    }

    async fn find_one(
        &self,
        selector: &Selector,
    ) -> Result<Option<Box<dyn PageElement>>, DriverError> {
        Ok(self
            .site
            .matching(selector)
            .into_iter()
            .next()
            .map(|element| self.bind(element)))
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<Box<dyn PageElement>>, DriverError> {
        Ok(self
            .site
            .matching(selector)
            .into_iter()
            .map(|element| self.bind(element))
            .collect())
    }

    async fn quit(&self) -> Result<(), DriverError> {
        self.site.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
