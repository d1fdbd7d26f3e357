//! Persistence of listings, images and geocoder results.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;

use crate::error::Result;
use crate::models::{Listing, ListingImage, ListingType, ResolvedAddress, Site};

#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgStore;

/// wg-gesucht row still lacking geocoder columns
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedListing {
    pub listing_id: String,
    pub district: Option<String>,
    pub city: String,
    pub address: String,
}

/// Storage port used by the crawl loop, the geocoder and `backfill`.
///
/// Every call stands alone; nothing spans more than one statement.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// External ids already stored for this site and listing type
    async fn seen_ids(&self, site: Site, listing_type: &ListingType) -> Result<HashSet<String>>;

    async fn insert_listing(&self, listing: &Listing) -> Result<()>;

    async fn insert_image(&self, image: &ListingImage) -> Result<()>;

    async fn geocode_exists(&self, osm_id: i64) -> Result<bool>;

    /// Cache the narrowed geocoder response under its OSM id
    async fn insert_geocode(&self, osm_id: i64, feature_collection: &Value, city: Option<&str>) -> Result<()>;

    async fn unresolved_listings(&self) -> Result<Vec<UnresolvedListing>>;

    async fn apply_resolved_address(&self, listing_id: &str, address: &ResolvedAddress) -> Result<()>;
}
