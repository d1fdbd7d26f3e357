//! Address resolution through Nominatim.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GeocoderConfig;
use crate::error::{Result, ScrapeError};
use crate::http::Fetcher;
use crate::models::ResolvedAddress;
use crate::normalize::district;
use crate::store::ListingStore;

/// Feature types that never carry a meaningful street
const STREETLESS_TYPES: &[&str] = &["neighbourhood", "suburb", "administrative", "postcode"];

const CITY_KEYS: &[&str] = &["city", "town", "village"];
const STREET_KEYS: &[&str] = &["road", "pedestrian", "footway", "park", "leisure"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub properties: FeatureProperties,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    #[serde(default)]
    pub osm_id: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub address: Map<String, Value>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Value,
}

impl FeatureProperties {
    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .find_map(|k| self.address.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    }
}

/// Geocoder query for a stored wg-gesucht address line.
///
/// The line reads `"{city} {district} {street...}"`; the query is the city
/// plus the street part, or plus the district when there is no street.
pub fn query_for(city: &str, address: &str) -> Option<String> {
    let words: Vec<&str> = address.split_whitespace().collect();
    let rest = match words.len() {
        0 | 1 => return None,
        2 => words[1..].join(" "),
        _ => words[2..].join(" "),
    };
    Some(format!("{} {}", city, rest))
}

/// First feature that is not a station
pub fn select_feature(fc: &FeatureCollection) -> Option<&Feature> {
    fc.features
        .iter()
        .find(|f| !f.properties.kind.contains("station"))
}

pub fn resolve_feature(feature: &Feature) -> ResolvedAddress {
    let props = &feature.properties;
    let city = props.first_of(CITY_KEYS);

    let district = match (&city, props.address.get("suburb").and_then(Value::as_str)) {
        (Some(city), Some(suburb)) if district::has_districts(city) => {
            let token = format!("{}_{}", suburb, city);
            if token == "Haunstetten_Augsburg" {
                Some("Haunstetten-Siebenbrunn_Augsburg".to_string())
            } else {
                Some(token)
            }
        }
        _ => None,
    };

    let street = if STREETLESS_TYPES.contains(&props.kind.as_str()) {
        None
    } else {
        props.first_of(STREET_KEYS)
    };

    let (longitude, latitude) = match &feature.geometry {
        Some(g) if g.kind == "Point" => (
            g.coordinates.get(0).and_then(Value::as_f64),
            g.coordinates.get(1).and_then(Value::as_f64),
        ),
        _ => (None, None),
    };

    ResolvedAddress {
        osm_id: props.osm_id,
        city,
        district,
        street,
        house_number: props.first_of(&["house_number"]),
        postcode: props.first_of(&["postcode"]),
        neighbourhood: props.first_of(&["neighbourhood"]),
        longitude,
        latitude,
    }
}

/// The response reduced to the chosen feature, as cached in `gis.osm`
pub fn narrowed(fc: &FeatureCollection, feature: &Feature) -> FeatureCollection {
    FeatureCollection {
        features: vec![feature.clone()],
        rest: fc.rest.clone(),
    }
}

#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve a free-text query. No usable match is an all-null address,
    /// not an error.
    async fn resolve(&self, query: &str) -> Result<ResolvedAddress>;
}

pub struct NominatimGeocoder<'a> {
    fetcher: &'a Fetcher,
    store: &'a dyn ListingStore,
    config: GeocoderConfig,
    known: Mutex<HashSet<i64>>,
}

impl<'a> NominatimGeocoder<'a> {
    pub fn new(fetcher: &'a Fetcher, store: &'a dyn ListingStore, config: GeocoderConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
            known: Mutex::new(HashSet::new()),
        }
    }

    fn is_known(&self, osm_id: i64) -> bool {
        self.known
            .lock()
            .map(|known| known.contains(&osm_id))
            .unwrap_or(false)
    }

    fn remember(&self, osm_id: i64) {
        if let Ok(mut known) = self.known.lock() {
            known.insert(osm_id);
        }
    }

    /// Resolve the response and cache it under its OSM id, once per id.
    pub async fn record(&self, fc: &FeatureCollection) -> Result<ResolvedAddress> {
        let Some(feature) = select_feature(fc) else {
            debug!("No usable feature among {} results", fc.features.len());
            return Ok(ResolvedAddress::default());
        };
        let resolved = resolve_feature(feature);

        if let Some(osm_id) = resolved.osm_id {
            if !self.is_known(osm_id) {
                if !self.store.geocode_exists(osm_id).await? {
                    let narrowed = serde_json::to_value(narrowed(fc, feature))?;
                    self.store
                        .insert_geocode(osm_id, &narrowed, resolved.city.as_deref())
                        .await?;
                    info!("Cached OSM feature {}", osm_id);
                }
                self.remember(osm_id);
            }
        }

        Ok(resolved)
    }
}

#[async_trait]
impl<'a> AddressResolver for NominatimGeocoder<'a> {
    async fn resolve(&self, query: &str) -> Result<ResolvedAddress> {
        let mut params = vec![
            ("q", query.to_string()),
            ("format", "geojson".to_string()),
            ("addressdetails", "1".to_string()),
        ];
        if let Some(limit) = self.config.limit {
            params.push(("limit", limit.to_string()));
        }

        let fc: FeatureCollection = self
            .fetcher
            .get_json(&self.config.base_url, &params)
            .await
            .map_err(|e| match e {
                ScrapeError::Request { source, .. } if source.is_decode() => {
                    ScrapeError::Geocode(source.to_string())
                }
                other => other,
            })?;
        let resolved = self.record(&fc).await?;

        tokio::time::sleep(Duration::from_secs(self.config.delay_seconds)).await;
        Ok(resolved)
    }
}
