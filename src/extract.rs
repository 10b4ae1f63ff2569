use std::time::Duration;

use crate::driver::PageDriver;
use crate::error::LookupError;
use crate::model::ProductRecord;
use crate::site::{Field, FieldSpec, ParseRule, Selector, SiteProfile};

/// Value produced for one field by its parse rule.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Count(u64),
    Amount(f64),
}

/// Substitutes a field's default for a failed lookup.
pub trait FailSoft<T> {
    fn or_default_logged(self, what: &dyn std::fmt::Debug) -> T;
}

impl<T: Default> FailSoft<T> for Result<T, LookupError> {
    fn or_default_logged(self, what: &dyn std::fmt::Debug) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(field = ?what, error = %err, "lookup failed; using default");
                T::default()
            }
        }
    }
}

/// Turns a loaded product page into a [`ProductRecord`].
pub struct Extractor<'a> {
    site: &'a SiteProfile,
    lookup_timeout: Duration,
}

impl<'a> Extractor<'a> {
    pub fn new(site: &'a SiteProfile, lookup_timeout: Duration) -> Self {
        Self {
            site,
            lookup_timeout,
        }
    }

    /// Never fails: every field that cannot be read keeps its default.
    pub async fn extract(&self, driver: &dyn PageDriver, url: &str) -> ProductRecord {
        let mut record = ProductRecord::new(url);

        for spec in &self.site.fields {
            let value = self
                .lookup(driver, spec)
                .await
                .map(Some)
                .or_default_logged(&spec.field);
            if let Some(value) = value {
                apply(&mut record, spec.field, value);
            }
        }

        record.image_urls = self
            .image_urls(driver)
            .await
            .or_default_logged(&"image_urls");
        record
    }

    async fn lookup(
        &self,
        driver: &dyn PageDriver,
        spec: &FieldSpec,
    ) -> Result<FieldValue, LookupError> {
        let selector = &spec.selector;
        let element = self
            .within_timeout(selector, driver.find_one(selector))
            .await?
            .ok_or_else(|| LookupError::Missing(selector.clone()))?;

        match &spec.rule {
            ParseRule::Text => {
                let text = self.within_timeout(selector, element.text()).await?;
                Ok(FieldValue::Text(text.trim().to_owned()))
            }
            ParseRule::Count => {
                let text = self.within_timeout(selector, element.text()).await?;
                Ok(FieldValue::Count(parse_count(&text)))
            }
            ParseRule::Amount => {
                let text = self.within_timeout(selector, element.text()).await?;
                Ok(FieldValue::Amount(parse_amount(&text)))
            }
            ParseRule::Attribute(name) => {
                let value = self
                    .within_timeout(selector, element.attribute(name))
                    .await?
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| LookupError::MissingAttribute {
                        selector: selector.clone(),
                        attribute: name.clone(),
                    })?;
                Ok(FieldValue::Text(value.trim().to_owned()))
            }
        }
    }

    async fn image_urls(&self, driver: &dyn PageDriver) -> Result<Vec<String>, LookupError> {
        let selector = &self.site.images;
        let elements = self
            .within_timeout(selector, driver.find_all(selector))
            .await?;

        let mut urls = Vec::with_capacity(elements.len());
        for element in elements {
            match self.within_timeout(selector, element.attribute("src")).await {
                Ok(Some(src)) if !src.trim().is_empty() => urls.push(src.trim().to_owned()),
                Ok(_) => {}
                Err(err) => tracing::debug!(error = %err, "skipping unreadable image element"),
            }
        }
        Ok(urls)
    }

    async fn within_timeout<T>(
        &self,
        selector: &Selector,
        fut: impl Future<Output = Result<T, crate::error::DriverError>>,
    ) -> Result<T, LookupError> {
        match tokio::time::timeout(self.lookup_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(LookupError::Driver {
                selector: selector.clone(),
                source,
            }),
            Err(_) => Err(LookupError::TimedOut {
                selector: selector.clone(),
                timeout: self.lookup_timeout,
            }),
        }
    }
}

fn apply(record: &mut ProductRecord, field: Field, value: FieldValue) {
    match (field, value) {
        (Field::Title, FieldValue::Text(v)) => record.title = v,
        (Field::Description, FieldValue::Text(v)) => record.description = v,
        (Field::Brand, FieldValue::Text(v)) => record.brand = v,
        (Field::Size, FieldValue::Text(v)) => record.size = v,
        (Field::Condition, FieldValue::Text(v)) => record.condition = v,
        (Field::Location, FieldValue::Text(v)) => record.location = v,
        (Field::BuyerProtection, FieldValue::Text(v)) => record.buyer_protection = v,
        (Field::SellerName, FieldValue::Text(v)) => record.seller_info.seller_name = v,
        (Field::SellerImage, FieldValue::Text(v)) => record.seller_info.seller_image = v,
        (Field::SellerRating, FieldValue::Text(v)) => record.seller_info.seller_rating = v,
        (Field::SellerLocation, FieldValue::Text(v)) => record.seller_info.seller_location = v,
        (Field::UploadFrequency, FieldValue::Text(v)) => record.seller_info.upload_frequency = v,
        (Field::Likes, FieldValue::Count(v)) => record.likes = v,
        (Field::Views, FieldValue::Count(v)) => record.views = v,
        (Field::SellerReviewCount, FieldValue::Count(v)) => record.seller_info.review_count = v,
        (Field::Price, FieldValue::Amount(v)) => record.price = v,
        (Field::ShippingCost, FieldValue::Amount(v)) => record.shipping_cost = v,
        (field, value) => {
            tracing::warn!(?field, ?value, "value kind does not match field; keeping default")
        }
    }
}

/// Digits of `text` as an integer; `0` when there are none. Saturates at
/// `u64::MAX`.
pub fn parse_count(text: &str) -> u64 {
    let mut value = 0u64;
    for digit in text.chars().filter_map(|c| c.to_digit(10)) {
        value = value.saturating_mul(10).saturating_add(u64::from(digit));
    }
    if value == u64::MAX {
        tracing::debug!(text, "count saturated");
    }
    value
}

/// Digits of `text` read as one decimal number; `0.0` when there are none.
///
/// Separators are dropped with every other non-digit, so `€12.50` reads as
/// `1250.0`.
pub fn parse_amount(text: &str) -> f64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return 0.0;
    }
    digits.parse().unwrap_or(0.0)
}
