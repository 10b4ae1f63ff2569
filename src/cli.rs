use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::DelayRange;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk the listing and scrape products into the dated collection.
    Run(RunArgs),
    /// Scrape a single product page.
    Product(ProductArgs),
    /// Print candidate product URLs without scraping them.
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Maximum products to scrape.
    #[arg(long, default_value_t = 100)]
    pub max_items: usize,

    /// Start from this catalog/search URL instead of the category path.
    #[arg(long)]
    pub search_url: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct ProductArgs {
    /// Product page URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Also append the record to the dated collection.
    #[arg(long)]
    pub append: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Maximum URLs to print.
    #[arg(long, default_value_t = 100)]
    pub max_items: usize,

    /// Start from this catalog/search URL instead of the category path.
    #[arg(long)]
    pub search_url: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct CommonArgs {
    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(flatten)]
    pub browser: BrowserArgs,

    #[command(flatten)]
    pub pacing: PacingArgs,

    /// YAML file overriding the built-in selectors. Selectors are tagged by
    /// kind, e.g. `selector: !css "a.next"` or `selector: !link_text Women`.
    #[arg(long)]
    pub site_profile: Option<PathBuf>,

    /// SQLite file for the product index (disabled when omitted).
    #[arg(long)]
    pub index_db: Option<PathBuf>,

    /// Wait for each navigation control to become clickable.
    #[arg(long, default_value_t = 10)]
    pub step_timeout_secs: u64,

    /// Wait for each product field lookup.
    #[arg(long, default_value_t = 2000)]
    pub field_timeout_ms: u64,

    /// Maximum listing pages to traverse.
    #[arg(long, default_value_t = 50)]
    pub max_pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    Local,
    Gcs,
}

#[derive(Debug, Args)]
pub struct StorageArgs {
    /// Where records and images are written.
    #[arg(long, value_enum, default_value_t = StorageKind::Local)]
    pub storage: StorageKind,

    /// Output directory for local storage.
    #[arg(long, default_value = "data")]
    pub out: PathBuf,

    /// Destination bucket for gcs storage.
    #[arg(long)]
    pub bucket: Option<String>,

    /// `authorized_user` credentials file (default: metadata server).
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    #[arg(long, default_value = "https://storage.googleapis.com", hide = true)]
    pub gcs_endpoint: String,
}

#[derive(Debug, Args)]
pub struct BrowserArgs {
    /// WebDriver server (chromedriver) URL.
    #[arg(long, default_value = "http://localhost:9515")]
    pub webdriver_url: String,

    /// Show the browser window instead of running headless.
    #[arg(long)]
    pub visible: bool,

    #[arg(long, default_value = "1920,1080")]
    pub window_size: String,
}

#[derive(Debug, Args)]
pub struct PacingArgs {
    /// Delay between products, in milliseconds (`MIN..MAX` or a fixed value).
    #[arg(long, default_value = "1000..3000")]
    pub product_delay_ms: DelayRange,

    /// Delay between image downloads, in milliseconds.
    #[arg(long, default_value = "500..1000")]
    pub image_delay_ms: DelayRange,

    /// Pause after each page load, in milliseconds.
    #[arg(long, default_value = "2000..4000")]
    pub settle_delay_ms: DelayRange,
}
