use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};

mod immoscout;
mod sparkasse;
mod wg_gesucht;

pub use immoscout::{Amenities, BuildingInfo, ImmoscoutCosts, ImmoscoutListing};
pub use sparkasse::{SparkasseListing, SparkasseSections};
pub use wg_gesucht::{Roommates, WgCosts, WgDetails, WgListing, WgSizes};

/// Source of the property listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Site {
    WgGesucht,
    Immoscout,
    Sparkasse,
}

impl Site {
    /// Short name used in cursor file names and log lines
    pub fn slug(self) -> &'static str {
        match self {
            Site::WgGesucht => "wg_gesucht",
            Site::Immoscout => "immoscout",
            Site::Sparkasse => "spk",
        }
    }
}

/// A site's listing category, resolved from the numeric CLI code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingType {
    pub code: String,
    /// URL path segment (or search label) the site uses for this category
    pub segment: &'static str,
}

const WG_GESUCHT_TYPES: &[(&str, &str)] = &[
    ("0", "wg-zimmer"),
    ("1", "1-zimmer-wohnungen"),
    ("2", "wohnungen"),
    ("3", "haeuser"),
];

const IMMOSCOUT_TYPES: &[(&str, &str)] = &[("0", "wohnung-mieten")];

const SPARKASSE_TYPES: &[(&str, &str)] = &[
    ("0", "Wohnung"),
    ("1", "Haus"),
    ("2", "Grundstück"),
    ("3", "Zwangsversteigerung"),
    ("4", "Anlageobjekt"),
];

impl ListingType {
    pub fn resolve(site: Site, code: &str) -> Result<Self> {
        let table = match site {
            Site::WgGesucht => WG_GESUCHT_TYPES,
            Site::Immoscout => IMMOSCOUT_TYPES,
            Site::Sparkasse => SPARKASSE_TYPES,
        };
        table
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(c, segment)| ListingType {
                code: (*c).to_string(),
                segment,
            })
            .ok_or_else(|| ScrapeError::UnknownListingType {
                site: site.slug(),
                code: code.to_string(),
            })
    }
}

/// Structured address as returned by the geocoder; every part is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedAddress {
    pub osm_id: Option<i64>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub postcode: Option<String>,
    pub neighbourhood: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl ResolvedAddress {
    pub fn is_resolved(&self) -> bool {
        self.osm_id.is_some()
    }
}

/// A normalized listing of any supported site
#[derive(Debug, Clone, Serialize)]
pub enum Listing {
    WgGesucht(WgListing),
    Immoscout(ImmoscoutListing),
    Sparkasse(SparkasseListing),
}

impl Listing {
    pub fn site(&self) -> Site {
        match self {
            Listing::WgGesucht(_) => Site::WgGesucht,
            Listing::Immoscout(_) => Site::Immoscout,
            Listing::Sparkasse(_) => Site::Sparkasse,
        }
    }

    pub fn external_id(&self) -> &str {
        match self {
            Listing::WgGesucht(l) => &l.external_id,
            Listing::Immoscout(l) => &l.external_id,
            Listing::Sparkasse(l) => &l.external_id,
        }
    }

    /// Free-text geocoder query, for sites whose table carries resolved
    /// address columns
    pub fn address_query(&self) -> Option<String> {
        match self {
            Listing::WgGesucht(l) => crate::geocode::query_for(&l.city, &l.address),
            _ => None,
        }
    }

    pub fn apply_address(&mut self, address: ResolvedAddress) {
        if let Listing::WgGesucht(l) = self {
            l.apply_address(address);
        }
    }
}

/// One image row; `data` is `None` when the listing only had a placeholder
#[derive(Debug, Clone, Serialize)]
pub struct ListingImage {
    pub site: Site,
    pub listing_id: String,
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    pub tag: Option<String>,
}

/// Everything one detail fetch produces
#[derive(Debug, Clone)]
pub struct ScrapedListing {
    pub listing: Listing,
    pub images: Vec<ListingImage>,
}
