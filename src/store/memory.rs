use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{ListingStore, UnresolvedListing};
use crate::error::Result;
use crate::models::{Listing, ListingImage, ListingType, ResolvedAddress, Site};

/// In-memory store for tests
#[derive(Default)]
pub struct MemoryStore {
    pub seen: Mutex<HashSet<String>>,
    pub listings: Mutex<Vec<Listing>>,
    pub images: Mutex<Vec<ListingImage>>,
    pub geocodes: Mutex<HashMap<i64, Value>>,
    pub geocode_inserts: Mutex<usize>,
    pub unresolved: Mutex<Vec<UnresolvedListing>>,
    pub resolved: Mutex<Vec<(String, ResolvedAddress)>>,
}

impl MemoryStore {
    pub fn with_seen(ids: &[&str]) -> Self {
        let store = Self::default();
        store
            .seen
            .lock()
            .unwrap()
            .extend(ids.iter().map(|id| id.to_string()));
        store
    }

    pub fn listing_ids(&self) -> Vec<String> {
        self.listings
            .lock()
            .unwrap()
            .iter()
            .map(|l| l.external_id().to_string())
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.images.lock().unwrap().len()
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn seen_ids(&self, _site: Site, _listing_type: &ListingType) -> Result<HashSet<String>> {
        Ok(self.seen.lock().unwrap().clone())
    }

    async fn insert_listing(&self, listing: &Listing) -> Result<()> {
        self.seen.lock().unwrap().insert(listing.external_id().to_string());
        self.listings.lock().unwrap().push(listing.clone());
        Ok(())
    }

    async fn insert_image(&self, image: &ListingImage) -> Result<()> {
        self.images.lock().unwrap().push(image.clone());
        Ok(())
    }

    async fn geocode_exists(&self, osm_id: i64) -> Result<bool> {
        Ok(self.geocodes.lock().unwrap().contains_key(&osm_id))
    }

    async fn insert_geocode(&self, osm_id: i64, feature_collection: &Value, _city: Option<&str>) -> Result<()> {
        self.geocodes
            .lock()
            .unwrap()
            .insert(osm_id, feature_collection.clone());
        *self.geocode_inserts.lock().unwrap() += 1;
        Ok(())
    }

    async fn unresolved_listings(&self) -> Result<Vec<UnresolvedListing>> {
        Ok(self.unresolved.lock().unwrap().clone())
    }

    async fn apply_resolved_address(&self, listing_id: &str, address: &ResolvedAddress) -> Result<()> {
        self.resolved
            .lock()
            .unwrap()
            .push((listing_id.to_string(), address.clone()));
        Ok(())
    }
}
