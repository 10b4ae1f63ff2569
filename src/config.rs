use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context as _;

use crate::cli::{BrowserArgs, CommonArgs, PacingArgs, StorageArgs, StorageKind};
use crate::site::SiteProfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local { root: PathBuf },
    Gcs(GcsConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsConfig {
    pub bucket_name: String,
    pub credentials_path: Option<PathBuf>,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_size: (u32, u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingConfig {
    pub settle: RangeInclusive<Duration>,
    pub product: RangeInclusive<Duration>,
    pub image: RangeInclusive<Duration>,
}

impl PacingConfig {
    pub fn none() -> Self {
        Self {
            settle: Duration::ZERO..=Duration::ZERO,
            product: Duration::ZERO..=Duration::ZERO,
            image: Duration::ZERO..=Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Bounded wait for each listing navigation control.
    pub step: Duration,
    /// Bounded wait for each product field lookup.
    pub field: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(10),
            field: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub storage: StorageConfig,
    pub browser: BrowserConfig,
    pub pacing: PacingConfig,
    pub timeouts: TimeoutConfig,
    pub max_pages: usize,
    pub site: SiteProfile,
    pub index_db: Option<PathBuf>,
}

impl ScraperConfig {
    pub fn from_args(args: &CommonArgs) -> anyhow::Result<Self> {
        let site = match args.site_profile.as_deref() {
            Some(path) => SiteProfile::load(path).context("load --site-profile")?,
            None => SiteProfile::vinted(),
        };

        Ok(Self {
            storage: storage_config(&args.storage)?,
            browser: browser_config(&args.browser)?,
            pacing: pacing_config(&args.pacing),
            timeouts: TimeoutConfig {
                step: Duration::from_secs(args.step_timeout_secs),
                field: Duration::from_millis(args.field_timeout_ms),
            },
            max_pages: args.max_pages.max(1),
            site,
            index_db: args.index_db.clone(),
        })
    }
}

fn storage_config(args: &StorageArgs) -> anyhow::Result<StorageConfig> {
    match args.storage {
        StorageKind::Local => Ok(StorageConfig::Local {
            root: args.out.clone(),
        }),
        StorageKind::Gcs => {
            let bucket_name = args
                .bucket
                .clone()
                .filter(|b| !b.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("--bucket is required with --storage gcs"))?;
            Ok(StorageConfig::Gcs(GcsConfig {
                bucket_name,
                credentials_path: args.credentials.clone(),
                endpoint: args.gcs_endpoint.clone(),
            }))
        }
    }
}

fn browser_config(args: &BrowserArgs) -> anyhow::Result<BrowserConfig> {
    let webdriver_url = url::Url::parse(&args.webdriver_url).context("parse --webdriver-url")?;
    Ok(BrowserConfig {
        webdriver_url: webdriver_url.to_string(),
        headless: !args.visible,
        window_size: parse_window_size(&args.window_size)?,
    })
}

fn pacing_config(args: &PacingArgs) -> PacingConfig {
    PacingConfig {
        settle: args.settle_delay_ms.as_range(),
        product: args.product_delay_ms.as_range(),
        image: args.image_delay_ms.as_range(),
    }
}

fn parse_window_size(input: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = input
        .split_once([',', 'x'])
        .ok_or_else(|| anyhow::anyhow!("--window-size must be WIDTH,HEIGHT: {input}"))?;
    let w = w.trim().parse().context("parse window width")?;
    let h = h.trim().parse().context("parse window height")?;
    Ok((w, h))
}

/// Millisecond interval given as `MIN..MAX` or a single fixed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub fn as_range(&self) -> RangeInclusive<Duration> {
        Duration::from_millis(self.min_ms)..=Duration::from_millis(self.max_ms)
    }
}

impl FromStr for DelayRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u64>()
                .map_err(|err| format!("invalid milliseconds `{v}`: {err}"))
        };
        let (min_ms, max_ms) = match s.split_once("..") {
            Some((min, max)) => (parse(min)?, parse(max)?),
            None => {
                let fixed = parse(s)?;
                (fixed, fixed)
            }
        };
        if min_ms > max_ms {
            return Err(format!("delay range must be MIN..MAX with MIN <= MAX: {s}"));
        }
        Ok(Self { min_ms, max_ms })
    }
}
