use anyhow::Context as _;

/// Filter used when `RUST_LOG` is unset; the WebDriver client is chatty at info.
const DEFAULT_FILTER: &str = "info,thirtyfour=warn,hyper=warn,reqwest=warn";

pub fn init() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    tracing::debug!(filter = DEFAULT_FILTER, "logging initialized");
    Ok(())
}
