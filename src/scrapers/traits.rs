use async_trait::async_trait;

use super::types::ListingRef;
use crate::error::Result;
use crate::models::{ListingType, ScrapedListing, Site};

/// One listing site as seen by the crawl loop: a paginated index of
/// listing references plus one detail page per listing.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Result card data carried from the index to the detail fetch
    type Card: Send + Sync;

    fn site(&self) -> Site;

    fn listing_type(&self) -> &ListingType;

    fn first_page(&self) -> u32 {
        1
    }

    /// Whether progress is kept in a page cursor between runs
    fn uses_cursor(&self) -> bool {
        true
    }

    /// End the run at the first page without unseen listings
    fn stop_when_exhausted(&self) -> bool {
        false
    }

    /// Highest page number, read from the pagination of the first page
    async fn last_page(&self) -> Result<u32>;

    async fn list_page(&self, page: u32) -> Result<Vec<ListingRef<Self::Card>>>;

    async fn fetch_detail(&self, listing: &ListingRef<Self::Card>) -> Result<ScrapedListing>;
}
