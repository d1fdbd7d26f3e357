use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use wohnungsmarkt::config::Config;
use wohnungsmarkt::cursor::PageCursor;
use wohnungsmarkt::geocode::{AddressResolver, NominatimGeocoder};
use wohnungsmarkt::http::Fetcher;
use wohnungsmarkt::logging::init_tracing;
use wohnungsmarkt::pipeline::{self, Pacing};
use wohnungsmarkt::scrapers::{ImmoscoutScraper, SearchParams, SiteAdapter, SparkasseScraper, WgGesuchtScraper};
use wohnungsmarkt::store::PgStore;
use wohnungsmarkt::ScrapeError;

/// Exit code when a site answers with its anti-bot check
const EXIT_CAPTCHA: u8 = 2;

#[derive(Parser)]
#[command(name = "wohnungsmarkt", about = "Scrape German listing portals into PostgreSQL")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "wohnungsmarkt.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl wg-gesucht (0 wg-zimmer, 1 1-zimmer-wohnungen, 2 wohnungen, 3 haeuser)
    WgGesucht { listing_type: String, city: String },
    /// Crawl ImmoScout24 (0 wohnung-mieten)
    Immoscout { listing_type: String, city: String },
    /// Crawl the Sparkasse portal (0 Wohnung, 1 Haus, 2 Grundstück, 3 Zwangsversteigerung, 4 Anlageobjekt)
    Sparkasse { listing_type: String, city: String },
    /// Geocode stored wg-gesucht listings without a resolved address
    Backfill,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing("info") {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<ScrapeError>() {
            Some(scrape) if scrape.is_captcha() => {
                error!("{}; stopping until the check is solved", scrape);
                ExitCode::from(EXIT_CAPTCHA)
            }
            _ => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.config)?;
    let fetcher = Fetcher::new(&config.http)?;
    let store = PgStore::connect(&config.database).await?;

    let params = |listing_type: String, city: String| SearchParams {
        city,
        listing_type,
        strict_districts: config.crawl.strict_districts,
    };

    match cli.command {
        Commands::WgGesucht { listing_type, city } => {
            match config.wg_gesucht.credentials() {
                Some((email, password)) => fetcher.login_wg_gesucht(email, password).await?,
                None => warn!("No wg-gesucht credentials configured, crawling anonymously"),
            }
            let scraper = WgGesuchtScraper::new(&fetcher, params(listing_type, city))?;
            crawl(&scraper, &config, &fetcher, &store).await
        }
        Commands::Immoscout { listing_type, city } => {
            let scraper = ImmoscoutScraper::new(&fetcher, params(listing_type, city))?;
            crawl(&scraper, &config, &fetcher, &store).await
        }
        Commands::Sparkasse { listing_type, city } => {
            let scraper = SparkasseScraper::new(&fetcher, params(listing_type, city))?;
            crawl(&scraper, &config, &fetcher, &store).await
        }
        Commands::Backfill => {
            let geocoder = NominatimGeocoder::new(&fetcher, &store, config.geocoder.clone());
            let stats = pipeline::backfill(&store, &geocoder).await?;
            println!("Resolved {} listings, {} left unresolved", stats.resolved, stats.unresolved);
            Ok(())
        }
    }
}

async fn crawl<A: SiteAdapter>(adapter: &A, config: &Config, fetcher: &Fetcher, store: &PgStore) -> anyhow::Result<()> {
    let cursor = PageCursor::new(&config.crawl.cursor_dir, adapter.site(), adapter.listing_type());
    let geocoder = config
        .crawl
        .geocode
        .then(|| NominatimGeocoder::new(fetcher, store, config.geocoder.clone()));
    let resolver = geocoder.as_ref().map(|g| g as &dyn AddressResolver);

    info!(
        "Crawling {} {} (cursor {})",
        adapter.site().slug(),
        adapter.listing_type().segment,
        cursor.path().display()
    );
    let stats = pipeline::run_crawl(adapter, store, resolver, &cursor, &Pacing::from_config(&config.crawl))
        .await?;

    println!(
        "{} pages, {} new listings, {} already stored, {} images",
        stats.pages, stats.inserted, stats.skipped, stats.images
    );
    Ok(())
}
