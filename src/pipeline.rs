//! Crawl loop shared by all sites, and the address back-fill.
//!
//! A run walks result pages from the page after the stored cursor up to the
//! last page, fetches every listing not stored yet, persists it with its
//! images and only then advances the cursor. Any error ends the run with the
//! cursor on the last completed page, so the next run resumes there.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::CrawlConfig;
use crate::cursor::PageCursor;
use crate::error::Result;
use crate::geocode::{self, AddressResolver};
use crate::scrapers::SiteAdapter;
use crate::store::ListingStore;

/// Pause between detail fetches: a fixed delay plus random jitter
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    delay: Duration,
    jitter: Duration,
}

impl Pacing {
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            delay: config.delay(),
            jitter: config.jitter(),
        }
    }

    pub fn none() -> Self {
        Self {
            delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    fn next_pause(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.delay + Duration::from_millis(extra)
    }

    async fn pause(&self) {
        let pause = self.next_pause();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Result pages completed
    pub pages: u32,
    pub inserted: usize,
    /// Listings already stored, not fetched again
    pub skipped: usize,
    pub images: usize,
}

pub async fn run_crawl<A: SiteAdapter>(
    adapter: &A,
    store: &dyn ListingStore,
    resolver: Option<&dyn AddressResolver>,
    cursor: &PageCursor,
    pacing: &Pacing,
) -> Result<CrawlStats> {
    let site = adapter.site();
    let mut stats = CrawlStats::default();

    let mut seen = store.seen_ids(site, adapter.listing_type()).await?;
    info!(
        "{} listings of {} type {} stored so far",
        seen.len(),
        site.slug(),
        adapter.listing_type().segment
    );

    let start = if adapter.uses_cursor() {
        match cursor.load().await? {
            Some(done) => done + 1,
            None => adapter.first_page(),
        }
    } else {
        adapter.first_page()
    };
    let last = adapter.last_page().await?;
    if start > last {
        info!("All {} pages already processed", last);
        return Ok(stats);
    }

    for page in start..=last {
        info!("Page {} of {}", page, last);
        let refs = adapter.list_page(page).await?;

        let fresh = refs.iter().filter(|r| !seen.contains(&r.id)).count();
        if fresh == 0 && adapter.stop_when_exhausted() {
            info!("No new listings on page {}, stopping", page);
            break;
        }

        for listing in &refs {
            if seen.contains(&listing.id) {
                debug!("Skipping stored listing {}", listing.id);
                stats.skipped += 1;
                continue;
            }

            pacing.pause().await;
            let mut scraped = adapter.fetch_detail(listing).await?;

            if let Some(resolver) = resolver {
                match scraped.listing.address_query() {
                    Some(query) => {
                        let address = resolver.resolve(&query).await?;
                        scraped.listing.apply_address(address);
                    }
                    None => debug!("No geocoder query for listing {}", listing.id),
                }
            }

            store.insert_listing(&scraped.listing).await?;
            for image in &scraped.images {
                store.insert_image(image).await?;
                stats.images += 1;
            }
            seen.insert(listing.id.clone());
            stats.inserted += 1;
        }

        if adapter.uses_cursor() {
            cursor.store(page).await?;
        }
        stats.pages += 1;
    }

    info!(
        "Crawl finished: {} pages, {} new listings, {} skipped, {} images",
        stats.pages, stats.inserted, stats.skipped, stats.images
    );
    Ok(stats)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillStats {
    pub resolved: usize,
    /// Left for a later run
    pub unresolved: usize,
}

/// Geocode stored wg-gesucht listings that have no resolved address yet.
pub async fn backfill(store: &dyn ListingStore, resolver: &dyn AddressResolver) -> Result<BackfillStats> {
    let pending = store.unresolved_listings().await?;
    info!("{} listings without a resolved address", pending.len());

    let mut stats = BackfillStats::default();
    for listing in pending {
        let Some(query) = geocode::query_for(&listing.city, &listing.address) else {
            warn!("Listing {} has no usable address: {:?}", listing.listing_id, listing.address);
            stats.unresolved += 1;
            continue;
        };

        let address = resolver.resolve(&query).await?;
        if !address.is_resolved() {
            debug!("No match for {:?}", query);
            stats.unresolved += 1;
            continue;
        }

        store.apply_resolved_address(&listing.listing_id, &address).await?;
        stats.resolved += 1;
    }

    info!("Back-fill resolved {} of {} listings", stats.resolved, stats.resolved + stats.unresolved);
    Ok(stats)
}
