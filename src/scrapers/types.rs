use chrono::NaiveDateTime;

use crate::normalize::CardAddress;

/// An entry of a search result page, with whatever the result card shows
/// besides the id
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRef<C = ()> {
    pub id: String,
    /// Detail page URL
    pub url: String,
    pub realtor: Option<String>,
    pub card: C,
}

impl ListingRef<()> {
    pub fn new(id: impl Into<String>, url: impl Into<String>, realtor: Option<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            realtor,
            card: (),
        }
    }
}

/// A wg-gesucht result card as listed, normalized only once the listing is
/// actually fetched
#[derive(Debug, Clone, PartialEq)]
pub struct RawWgCard {
    /// Outer HTML of the card
    pub html: String,
    /// When the index page was read; online times are relative to it
    pub listed_at: NaiveDateTime,
}

/// What a wg-gesucht result card adds to the detail page
#[derive(Debug, Clone, PartialEq)]
pub struct WgCard {
    pub realtor: Option<String>,
    pub online_since: NaiveDateTime,
    pub image_url: Option<String>,
    pub address: CardAddress,
    pub available: bool,
}

/// Search parameters of one crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// City as given on the command line
    pub city: String,
    /// Numeric listing type code
    pub listing_type: String,
    /// Unknown districts fail the listing instead of being stored as null
    pub strict_districts: bool,
}
