use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::ResolvedAddress;

/// Flat-share occupants, stored as `[total, female, male, diverse]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roommates {
    pub total: u8,
    pub female: u8,
    pub male: u8,
    pub diverse: u8,
}

impl Roommates {
    /// Room currently let: only the total is known
    pub fn occupied(total: u8) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.total, self.female, self.male, self.diverse]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WgSizes {
    #[serde(rename = "size_all")]
    pub total_area: Option<BigDecimal>,
    #[serde(rename = "wg_type_all")]
    pub flat_description: Option<String>,
    #[serde(rename = "room_size")]
    pub room_area: Option<BigDecimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WgCosts {
    pub total: Option<BigDecimal>,
    pub rent: Option<BigDecimal>,
    pub other: Option<BigDecimal>,
    pub utilities: Option<BigDecimal>,
    pub deposit: Option<BigDecimal>,
    pub transfer_fee: Option<BigDecimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WgDetails {
    pub wg_size: Option<String>,
    pub wohnung_size: Option<String>,
    pub roommate_age: Option<String>,
    pub smoking: Option<String>,
    pub wg_type: Option<String>,
    pub languages: Option<String>,
    pub looking_for: Option<String>,
}

/// wg-gesucht.de listing, one row of `wg_gesucht.inserate`
#[derive(Debug, Clone, Serialize)]
pub struct WgListing {
    pub external_id: String,
    pub listing_type: String,
    pub title: String,
    pub district: Option<String>,
    pub city: String,
    /// Cleaned address line as shown on the listing card
    pub address: String,
    pub costs: WgCosts,
    pub available: bool,
    pub free_from: Option<NaiveDate>,
    pub free_until: Option<NaiveDate>,
    pub sizes: WgSizes,
    pub roommates: Roommates,
    pub amenities: Option<serde_json::Map<String, serde_json::Value>>,
    pub details: WgDetails,
    pub online_since: NaiveDateTime,
    pub realtor: Option<String>,
    pub location: Option<ResolvedAddress>,
}

impl WgListing {
    /// Take over geocoder results; city and district follow the geocoder
    /// once it actually found the place.
    pub fn apply_address(&mut self, address: ResolvedAddress) {
        if address.is_resolved() {
            if let Some(city) = &address.city {
                self.city = city.clone();
            }
            self.district = address.district.clone();
        }
        self.location = Some(address);
    }
}
