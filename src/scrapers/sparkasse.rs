use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::browser::{extract_fio_ids, search_city};
use super::html::require;
use super::traits::SiteAdapter;
use super::types::{ListingRef, SearchParams};
use crate::error::{Result, ScrapeError};
use crate::http::Fetcher;
use crate::models::{
    Listing, ListingImage, ListingType, ScrapedListing, Site, SparkasseListing, SparkasseSections,
};

const BASE_URL: &str = "https://immobilien.sparkasse.de/";

#[derive(Debug, Deserialize)]
struct EstateInput {
    estate: Estate,
}

#[derive(Debug, Deserialize)]
struct Estate {
    #[serde(flatten)]
    sections: SparkasseSections,
    #[serde(default)]
    anhaenge: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    #[serde(default)]
    format: String,
    #[serde(default)]
    data: Vec<Value>,
    anhangtitel: Option<String>,
    #[serde(rename = "@attributes")]
    attributes: Option<AttachmentAttributes>,
}

#[derive(Debug, Deserialize)]
struct AttachmentAttributes {
    gruppe: Option<String>,
}

/// A photo attachment of the estate document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstateImage {
    pub url: String,
    pub tag: Option<String>,
}

/// Savings-bank property portal. The search has no pagination: one browser
/// session lists every result at once.
pub struct SparkasseScraper<'a> {
    fetcher: &'a Fetcher,
    params: SearchParams,
    listing_type: ListingType,
}

impl<'a> SparkasseScraper<'a> {
    pub fn new(fetcher: &'a Fetcher, params: SearchParams) -> Result<Self> {
        let listing_type = ListingType::resolve(Site::Sparkasse, &params.listing_type)?;
        Ok(Self {
            fetcher,
            params,
            listing_type,
        })
    }
}

#[async_trait]
impl<'a> SiteAdapter for SparkasseScraper<'a> {
    type Card = ();

    fn site(&self) -> Site {
        Site::Sparkasse
    }

    fn listing_type(&self) -> &ListingType {
        &self.listing_type
    }

    fn uses_cursor(&self) -> bool {
        false
    }

    async fn last_page(&self) -> Result<u32> {
        Ok(self.first_page())
    }

    async fn list_page(&self, _page: u32) -> Result<Vec<ListingRef>> {
        let source = search_city(&self.params.city).await?;
        let ids = extract_fio_ids(&source);
        info!("Portal lists {} estates for {}", ids.len(), self.params.city);
        Ok(ids
            .into_iter()
            .map(|id| {
                let url = format!("{}{}", BASE_URL, id);
                ListingRef::new(id, url, None)
            })
            .collect())
    }

    async fn fetch_detail(&self, listing: &ListingRef) -> Result<ScrapedListing> {
        info!("Parsing estate {}", listing.url);
        let body = self.fetcher.get_html(&listing.url).await?;
        let (sections, attachments) = parse_estate(&body)?;

        let mut images = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let data = match self.fetcher.get_bytes(&attachment.url).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Attachment {} unavailable: {}", attachment.url, e);
                    None
                }
            };
            images.push(ListingImage {
                site: Site::Sparkasse,
                listing_id: listing.id.clone(),
                data,
                tag: attachment.tag,
            });
        }

        Ok(ScrapedListing {
            listing: Listing::Sparkasse(SparkasseListing {
                external_id: listing.id.clone(),
                search_term: self.params.city.to_lowercase(),
                listing_type: self.listing_type.code.clone(),
                sections,
            }),
            images,
        })
    }
}

/// Read the estate document embedded in the detail page.
pub fn parse_estate(body: &str) -> Result<(SparkasseSections, Vec<EstateImage>)> {
    let raw = {
        let doc = Html::parse_document(body);
        let input = require(doc.root_element(), r#"input[name="estate"]"#)?;
        input
            .value()
            .attr("value")
            .ok_or_else(|| ScrapeError::missing("estate value"))?
            .to_string()
    };
    let input: EstateInput = serde_json::from_str(&raw)?;

    let images = input
        .estate
        .anhaenge
        .into_iter()
        .filter(|a| matches!(a.format.as_str(), "JPG" | "PNG"))
        .filter_map(|a| {
            let url = a
                .data
                .iter()
                .find_map(|d| d.get("original").and_then(Value::as_str))
                .map(str::to_string);
            let Some(url) = url else {
                warn!("Attachment without an original rendition");
                return None;
            };
            let tag = a.anhangtitel.or_else(|| a.attributes.and_then(|attrs| attrs.gruppe));
            Some(EstateImage { url, tag })
        })
        .collect();

    Ok((input.estate.sections, images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(estate: &Value) -> String {
        let value = json!({ "estate": estate }).to_string().replace('"', "&quot;");
        format!(r#"<html><body><form><input type="hidden" name="estate" value="{}"/></form></body></html>"#, value)
    }

    #[test]
    fn test_parse_estate() {
        let estate = json!({
            "id": "10915855820",
            "objektkategorie": { "vermarktungsart": "MIETE_PACHT" },
            "geo": { "plz": "86150", "ort": "Augsburg" },
            "preise": { "kaltmiete": 780 },
            "sip": { "id": "SIP-1" },
            "anhaenge": [
                { "format": "JPG", "anhangtitel": "Wohnzimmer",
                  "data": [{ "thumbnail": "https://cdn/t.jpg" }, { "original": "https://cdn/o.jpg" }] },
                { "format": "PNG", "@attributes": { "gruppe": "GRUNDRISS" },
                  "data": [{ "original": "https://cdn/plan.png" }] },
                { "format": "PDF", "anhangtitel": "Exposé", "data": [{ "original": "https://cdn/e.pdf" }] }
            ]
        });

        let (sections, images) = parse_estate(&page(&estate)).unwrap();
        assert_eq!(sections.geo, json!({ "plz": "86150", "ort": "Augsburg" }));
        assert_eq!(sections.preise["kaltmiete"], 780);
        assert_eq!(sections.anbieter, Value::Null);
        assert_eq!(
            images,
            vec![
                EstateImage { url: "https://cdn/o.jpg".into(), tag: Some("Wohnzimmer".into()) },
                EstateImage { url: "https://cdn/plan.png".into(), tag: Some("GRUNDRISS".into()) },
            ]
        );
    }

    #[test]
    fn test_missing_estate_input() {
        assert!(matches!(
            parse_estate("<html><body></body></html>"),
            Err(ScrapeError::MissingElement { .. })
        ));
    }
}
