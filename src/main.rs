use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;

use vinted_scraper::cli::{Cli, Command, CommonArgs};
use vinted_scraper::config::ScraperConfig;
use vinted_scraper::navigate::ListingEntry;
use vinted_scraper::orchestrator::Orchestrator;
use vinted_scraper::webdriver::ChromeSessionFactory;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    vinted_scraper::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Run(args) => {
            let orchestrator = orchestrator(&args.common).context("configure run")?;
            let summary = orchestrator
                .run(args.max_items, &listing_entry(args.search_url)?)
                .await
                .context("run")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("encode run summary")?
            );
        }
        Command::Product(args) => {
            let url = url::Url::parse(&args.url).context("parse --url")?;
            anyhow::ensure!(
                matches!(url.scheme(), "http" | "https"),
                "--url must be http or https: {url}"
            );
            let orchestrator = orchestrator(&args.common).context("configure product")?;
            let record = orchestrator
                .scrape_single(url.as_str(), args.append)
                .await
                .context("product")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&record).context("encode product")?
            );
        }
        Command::List(args) => {
            let orchestrator = orchestrator(&args.common).context("configure list")?;
            let urls = orchestrator
                .list(args.max_items, &listing_entry(args.search_url)?)
                .await
                .context("list")?;
            for url in urls {
                println!("{url}");
            }
        }
    }

    Ok(())
}

fn orchestrator(args: &CommonArgs) -> anyhow::Result<Orchestrator> {
    let config = ScraperConfig::from_args(args)?;
    let store = vinted_scraper::storage::open(&config.storage).context("open storage")?;
    let sessions = Arc::new(ChromeSessionFactory::new(config.browser.clone()));
    Orchestrator::from_config(&config, sessions, store)
}

fn listing_entry(search_url: Option<String>) -> anyhow::Result<ListingEntry> {
    match search_url {
        Some(raw) => {
            let url = url::Url::parse(&raw).context("parse --search-url")?;
            Ok(ListingEntry::Url(url.to_string()))
        }
        None => Ok(ListingEntry::Category),
    }
}
