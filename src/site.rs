use std::fmt;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    Css(String),
    #[serde(rename = "xpath")]
    XPath(String),
    LinkText(String),
    Id(String),
}

impl Selector {
    pub fn css(value: impl Into<String>) -> Self {
        Self::Css(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::XPath(value.into())
    }

    pub fn link_text(value: impl Into<String>) -> Self {
        Self::LinkText(value.into())
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::Id(value.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(value) => write!(f, "css `{value}`"),
            Self::XPath(value) => write!(f, "xpath `{value}`"),
            Self::LinkText(value) => write!(f, "link text `{value}`"),
            Self::Id(value) => write!(f, "id `{value}`"),
        }
    }
}

/// Logical product field filled by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Price,
    Description,
    Likes,
    Views,
    Brand,
    Size,
    Condition,
    Location,
    ShippingCost,
    BuyerProtection,
    SellerName,
    SellerImage,
    SellerRating,
    SellerReviewCount,
    SellerLocation,
    UploadFrequency,
}

impl Field {
    /// The parse rule a field's value must be produced with.
    pub fn expected_rule(self) -> ParseRuleKind {
        match self {
            Self::Price | Self::ShippingCost => ParseRuleKind::Amount,
            Self::Likes | Self::Views | Self::SellerReviewCount => ParseRuleKind::Count,
            Self::SellerImage => ParseRuleKind::Attribute,
            _ => ParseRuleKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseRule {
    /// Trimmed element text.
    Text,
    /// Digits of the element text as a non-negative integer.
    Count,
    /// Digits of the element text as a decimal amount.
    Amount,
    /// Value of the named attribute.
    Attribute(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseRuleKind {
    Text,
    Count,
    Amount,
    Attribute,
}

impl ParseRule {
    pub fn kind(&self) -> ParseRuleKind {
        match self {
            Self::Text => ParseRuleKind::Text,
            Self::Count => ParseRuleKind::Count,
            Self::Amount => ParseRuleKind::Amount,
            Self::Attribute(_) => ParseRuleKind::Attribute,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: Field,
    pub selector: Selector,
    pub rule: ParseRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavStep {
    pub label: String,
    pub selector: Selector,
}

/// Everything that ties the scraper to one site's markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub home_url: String,
    /// Region and cookie overlays shown on first visit.
    pub popup_steps: Vec<NavStep>,
    pub category_steps: Vec<NavStep>,
    pub product_link: Selector,
    pub next_page: Selector,
    pub images: Selector,
    pub fields: Vec<FieldSpec>,
}

impl SiteProfile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read site profile: {}", path.display()))?;
        let profile: SiteProfile =
            serde_yaml::from_str(&yaml).context("deserialize site profile")?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.home_url)
            .with_context(|| format!("site profile home_url: {}", self.home_url))?;
        for spec in &self.fields {
            if spec.rule.kind() != spec.field.expected_rule() {
                anyhow::bail!(
                    "site profile field {:?} uses {:?}, expected {:?}",
                    spec.field,
                    spec.rule.kind(),
                    spec.field.expected_rule()
                );
            }
        }
        Ok(())
    }

    pub fn vinted() -> Self {
        const SELLER: &str = r#"//*[@id="sidebar"]/div[2]/div[3]/div"#;

        let text = |field, selector| FieldSpec {
            field,
            selector,
            rule: ParseRule::Text,
        };
        let count = |field, selector| FieldSpec {
            field,
            selector,
            rule: ParseRule::Count,
        };
        let amount = |field, selector| FieldSpec {
            field,
            selector,
            rule: ParseRule::Amount,
        };

        Self {
            home_url: "https://www.vinted.com".to_owned(),
            popup_steps: vec![
                NavStep {
                    label: "close region selection".to_owned(),
                    selector: Selector::css(".web_ui__Navigation__right > .web_ui__Button__button"),
                },
                NavStep {
                    label: "reject cookies".to_owned(),
                    selector: Selector::id("onetrust-reject-all-handler"),
                },
            ],
            category_steps: vec![
                NavStep {
                    label: "open Women category".to_owned(),
                    selector: Selector::link_text("Women"),
                },
                NavStep {
                    label: "view all items".to_owned(),
                    selector: Selector::css(
                        ".web_ui__Cell__default:nth-child(1) .web_ui__Cell__body > .web_ui__Text__body",
                    ),
                },
            ],
            product_link: Selector::css("#content div.new-item-box__image-container > a"),
            next_page: Selector::xpath(r#"//a[contains(@class, "pagination-next")]"#),
            images: Selector::css(".item-photos img.web_ui__Image__content"),
            fields: vec![
                text(
                    Field::Title,
                    Selector::css(".details-list--main-info .web_ui__Text__title"),
                ),
                amount(Field::Price, Selector::css("[data-testid='item-price'] p")),
                text(
                    Field::Description,
                    Selector::xpath(r#"//div[contains(@class, "details-list__item--description")]"#),
                ),
                count(Field::Likes, Selector::css("[data-testid='item-likes']")),
                count(Field::Views, Selector::css("[data-testid='item-views']")),
                text(
                    Field::Brand,
                    Selector::xpath(r#"//div[contains(@class, "details-list__item--brand")]"#),
                ),
                text(
                    Field::Size,
                    Selector::xpath(r#"//div[contains(@class, "details-list__item--size")]"#),
                ),
                text(
                    Field::Condition,
                    Selector::xpath(r#"//div[contains(@class, "details-list__item--condition")]"#),
                ),
                text(
                    Field::Location,
                    Selector::xpath(r#"//div[contains(@class, "item-location")]"#),
                ),
                amount(
                    Field::ShippingCost,
                    Selector::css("[data-testid='shipping-price']"),
                ),
                text(
                    Field::BuyerProtection,
                    Selector::css("[data-testid='service-fee-included-title']"),
                ),
                text(
                    Field::SellerName,
                    Selector::xpath(format!("{SELLER}/a/div[2]/div[1]/div/div/span")),
                ),
                FieldSpec {
                    field: Field::SellerImage,
                    selector: Selector::xpath(format!("{SELLER}/a/div[1]//img")),
                    rule: ParseRule::Attribute("src".to_owned()),
                },
                text(
                    Field::SellerRating,
                    Selector::xpath(format!("{SELLER}/a/div[2]/div[2]/div")),
                ),
                count(
                    Field::SellerReviewCount,
                    Selector::xpath(format!("{SELLER}/a/div[2]/div[2]/div/div[6]/h4")),
                ),
                text(
                    Field::SellerLocation,
                    Selector::xpath(format!("{SELLER}/div[4]/div/div/div[1]/div[2]")),
                ),
                text(
                    Field::UploadFrequency,
                    Selector::xpath(format!("{SELLER}/div[2]/div/div[2]/div[1]/div")),
                ),
            ],
        }
    }
}
