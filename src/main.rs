use anyhow::{Context, Result};
use clap::Parser;
use realestate_hub::{
    cache::{ParquetStatsCache, StatsCache},
    config::Config,
    fetch::{GoogleMaps, ListingSite, RealtorStats},
    loader::StatsLoader,
    render::{render_report, RenderOptions, DEFAULT_TOP_LANGUAGES},
    report::build_report,
    HubError,
};
use reqwest::Client;
use std::{io::Write, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Neighbourhood statistics, sale history and commute times for a location.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Address or neighbourhood, e.g. "37 O'donnell Avenue"
    location: String,

    /// YAML config file; environment variables override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Always fetch fresh statistics and leave the cache untouched
    #[arg(long)]
    no_cache: bool,

    /// Number of languages shown
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TOP_LANGUAGES)]
    top_languages: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("loading config")?;
    info!(location = %args.location, no_cache = args.no_cache, "startup");

    let client = Client::builder()
        .gzip(true)
        .cookie_store(true)
        .build()
        .context("building HTTP client")?;
    let maps = GoogleMaps::new(client.clone(), &config)?;
    let realtor = RealtorStats::new(client.clone(), &config)?;
    let listing = ListingSite::new(client, &config);

    let cache = if args.no_cache {
        None
    } else {
        Some(
            ParquetStatsCache::open(&config.cache_dir, config.cache_freshness_days)
                .with_context(|| format!("opening cache at {}", config.cache_dir.display()))?,
        )
    };
    let loader = StatsLoader::new(&realtor, cache.as_ref().map(|c| c as &dyn StatsCache));

    let report = match build_report(&maps, &loader, &listing, &args.location).await {
        Ok(r) => r,
        Err(HubError::AddressNotFound(_)) => {
            println!("Address not found!");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let opts = RenderOptions {
        top_languages: args.top_languages,
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render_report(&report, &opts, &mut out)?;
    out.flush()?;

    info!("all done");
    Ok(())
}
