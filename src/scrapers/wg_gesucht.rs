use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::html::{all, first, heading, parent, require, text_of};
use super::traits::SiteAdapter;
use super::types::{ListingRef, RawWgCard, SearchParams, WgCard};
use crate::error::{Result, ScrapeError};
use crate::http::{Fetcher, WG_GESUCHT_URL};
use crate::models::{
    Listing, ListingImage, ListingType, Roommates, ScrapedListing, Site, WgCosts, WgDetails,
    WgListing, WgSizes,
};
use crate::normalize::number::{all_integers, first_integer, parse_german_decimal};
use crate::normalize::vocabulary::angaben_key;
use crate::normalize::{parse_card_address, parse_date, parse_online_since};

const CITY_CODES: &[(&str, &str)] = &[("Augsburg", "2"), ("Munchen", "90")];

static BACKGROUND_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")]+)['"]?\s*\)"#).expect("valid background url regex")
});

pub fn city_code(city: &str) -> Result<&'static str> {
    CITY_CODES
        .iter()
        .find(|(name, _)| *name == city)
        .map(|(_, code)| *code)
        .ok_or_else(|| ScrapeError::UnknownCity(city.to_string()))
}

/// wg-gesucht.de search for one city and listing type
pub struct WgGesuchtScraper<'a> {
    fetcher: &'a Fetcher,
    params: SearchParams,
    listing_type: ListingType,
    city_code: &'static str,
}

impl<'a> WgGesuchtScraper<'a> {
    pub fn new(fetcher: &'a Fetcher, params: SearchParams) -> Result<Self> {
        let listing_type = ListingType::resolve(Site::WgGesucht, &params.listing_type)?;
        let city_code = city_code(&params.city)?;
        Ok(Self {
            fetcher,
            params,
            listing_type,
            city_code,
        })
    }

    fn page_url(&self, page: u32) -> String {
        format!(
            "{}{}-in-{}.{}.{}.1.{}.html",
            WG_GESUCHT_URL, self.listing_type.segment, self.params.city, self.city_code, self.listing_type.code, page
        )
    }

    async fn fetch_image(&self, url: &str) -> Option<Vec<u8>> {
        match self.fetcher.get_bytes(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Image {} unavailable: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl<'a> SiteAdapter for WgGesuchtScraper<'a> {
    type Card = RawWgCard;

    fn site(&self) -> Site {
        Site::WgGesucht
    }

    fn listing_type(&self) -> &ListingType {
        &self.listing_type
    }

    fn first_page(&self) -> u32 {
        0
    }

    async fn last_page(&self) -> Result<u32> {
        let body = self.fetcher.get_html(&self.page_url(0)).await?;
        let pages = parse_page_count(&body)?;
        info!("There are {} pages available", pages);
        Ok(pages.saturating_sub(1))
    }

    async fn list_page(&self, page: u32) -> Result<Vec<ListingRef<RawWgCard>>> {
        let url = self.page_url(page);
        info!("Listing page {}", url);
        let body = self.fetcher.get_html(&url).await?;
        parse_index(&body, Local::now().naive_local())
    }

    async fn fetch_detail(&self, listing: &ListingRef<RawWgCard>) -> Result<ScrapedListing> {
        let card = parse_card(&listing.card.html, &self.params, listing.card.listed_at)?;

        info!("Parsing WG {}", listing.url);
        let body = self.fetcher.get_html(&listing.url).await?;
        let parsed = parse_detail(&body, card.available)?;

        let wg = WgListing {
            external_id: listing.id.clone(),
            listing_type: self.listing_type.code.clone(),
            title: parsed.title,
            district: card.address.district.clone(),
            city: card.address.city.clone(),
            address: card.address.address.clone(),
            costs: parsed.costs,
            available: card.available,
            free_from: parsed.free_from,
            free_until: parsed.free_until,
            sizes: parsed.sizes,
            roommates: parsed.roommates,
            amenities: parsed.amenities,
            details: parsed.details,
            online_since: card.online_since,
            realtor: card.realtor.clone(),
            location: None,
        };

        let data = match &card.image_url {
            Some(url) => self.fetch_image(url).await,
            None => None,
        };
        let image = ListingImage {
            site: Site::WgGesucht,
            listing_id: listing.id.clone(),
            data,
            tag: None,
        };

        Ok(ScrapedListing {
            listing: Listing::WgGesucht(wg),
            images: vec![image],
        })
    }
}

/// Number of result pages from the pagination bar
pub fn parse_page_count(body: &str) -> Result<u32> {
    let doc = Html::parse_document(body);
    let bar = require(doc.root_element(), "ul.pagination.pagination-sm")?;
    let items = all(bar, "li")?;
    // the last item is the "next" arrow
    let Some(last) = items.len().checked_sub(2).map(|i| items[i]) else {
        return Ok(1);
    };
    let text = text_of(last);
    text.parse().map_err(|_| ScrapeError::parse("page count", text))
}

/// Cards of a result page with only their id and link read. The rest of a
/// card is normalized by [`parse_card`] once the listing turns out to be new.
pub fn parse_index(body: &str, listed_at: NaiveDateTime) -> Result<Vec<ListingRef<RawWgCard>>> {
    let doc = Html::parse_document(body);
    let mut refs = Vec::new();

    for card in all(doc.root_element(), r#"div[id^="liste-details-ad"]"#)? {
        let element_id = card.value().id().unwrap_or_default();
        if element_id.contains("hidden") {
            continue;
        }
        if first(card, r#"span[title="übernachtung"]"#)?.is_some()
            || first(card, r#"span[title="tauschangebot"]"#)?.is_some()
        {
            debug!("Skipping overnight stay or swap offer {}", element_id);
            continue;
        }

        let id = element_id.rsplit('-').next().unwrap_or_default().to_string();
        let link = require(card, "a")?;
        let href = link.value().attr("href").ok_or_else(|| ScrapeError::missing("card link"))?;
        let url = format!("{}{}", WG_GESUCHT_URL, href.trim_start_matches('/'));

        refs.push(ListingRef {
            id,
            url,
            realtor: None,
            card: RawWgCard {
                html: card.html(),
                listed_at,
            },
        });
    }

    Ok(refs)
}

/// Normalize a result card: realtor, online time, image, address, availability.
pub fn parse_card(html: &str, params: &SearchParams, listed_at: NaiveDateTime) -> Result<WgCard> {
    let fragment = Html::parse_fragment(html);
    let card = fragment.root_element();

    let link = require(card, "a")?;
    let image_url = link
        .value()
        .attr("style")
        .and_then(|style| BACKGROUND_URL.captures(style))
        .map(|caps| caps[1].to_string())
        .filter(|url| !url.contains("placeholder"));

    let footer = all(card, "div.col-sm-12.flex_space_between")?
        .pop()
        .ok_or_else(|| ScrapeError::missing("card footer"))?;
    let spans = all(footer, "span")?;
    let realtor = spans.first().map(|s| text_of(*s)).filter(|s| !s.is_empty());
    let online_text = spans
        .last()
        .map(|s| text_of(*s))
        .ok_or_else(|| ScrapeError::missing("online time"))?;
    let online_since = parse_online_since(&online_text, listed_at)?;

    let subtitle = require(card, "div.col-xs-11 span")?;
    let address = parse_card_address(&text_of(subtitle), &params.city, params.strict_districts)?;

    let available = first(card, "span.ribbon-deactivated")?.is_none();

    Ok(WgCard {
        realtor,
        online_since,
        image_url,
        address,
        available,
    })
}

/// Everything the detail page contributes to a listing
#[derive(Debug, Clone, PartialEq)]
pub struct WgDetailPage {
    pub title: String,
    pub sizes: WgSizes,
    pub costs: WgCosts,
    pub amenities: Option<Map<String, Value>>,
    pub details: WgDetails,
    pub roommates: Roommates,
    pub free_from: Option<chrono::NaiveDate>,
    pub free_until: Option<chrono::NaiveDate>,
}

/// Amount or `None` for the `n.a.` placeholder
fn amount(text: &str) -> Option<bigdecimal::BigDecimal> {
    let text = text.trim();
    if text == "n.a." {
        return None;
    }
    parse_german_decimal(text)
}

pub fn parse_detail(body: &str, available: bool) -> Result<WgDetailPage> {
    let doc = Html::parse_document(body);
    let root = doc.root_element();

    let main = require(root, "div#main_column")?;
    let title = text_of(require(main, r#"h1[class^="headline"]"#)?);

    let basic = require(root, "div#basic_facts_wrapper")?;
    let rent_wrapper = require(basic, "div#rent_wrapper")?;
    let total_area = require(rent_wrapper, "div.basic_facts_top_part label.amount")?;
    let description = require(rent_wrapper, "label.description")?;
    let room_area = require(rent_wrapper, "div.basic_facts_bottom_part label")?;
    let sizes = WgSizes {
        total_area: amount(&text_of(total_area)),
        flat_description: Some(text_of(description)).filter(|s| !s.is_empty()),
        room_area: amount(&text_of(room_area)),
    };

    let costs = parse_costs(basic)?;
    let panel_titles = "h3.headline.headline-detailed-view-panel-title";
    let amenities = parse_amenities(root, panel_titles)?;

    let details_panel = heading(root, panel_titles, "WG-Details")?
        .and_then(parent)
        .and_then(parent)
        .ok_or_else(|| ScrapeError::missing("WG-Details panel"))?;
    let (details, roommates) = parse_wg_details(root, details_panel)?;

    let (free_from, free_until) = if available {
        let panel = heading(root, panel_titles, "Verfügbarkeit")?
            .and_then(parent)
            .and_then(parent)
            .ok_or_else(|| ScrapeError::missing("Verfügbarkeit panel"))?;
        parse_availability(panel)?
    } else {
        (None, None)
    };

    Ok(WgDetailPage {
        title,
        sizes,
        costs,
        amenities,
        details,
        roommates,
        free_from,
        free_until,
    })
}

fn parse_costs(basic: ElementRef<'_>) -> Result<WgCosts> {
    let graph = require(basic, "div#graph_wrapper")?;
    // first div wraps the whole graph; the rest are other, utilities, rent, total
    let amounts: Vec<_> = all(graph, "div")?
        .into_iter()
        .skip(1)
        .map(|e| {
            let text = e.text().collect::<String>();
            let line = text.trim().lines().next().unwrap_or_default().replace('€', "");
            amount(&line)
        })
        .collect();
    let nth = |i: usize| amounts.get(i).cloned().flatten();

    let provisions = all(basic, "div.provision-equipment")?;
    let provision = |i: usize| -> Result<Option<bigdecimal::BigDecimal>> {
        match provisions.get(i) {
            Some(p) => Ok(amount(&text_of(require(*p, "label")?).replace('€', ""))),
            None => Ok(None),
        }
    };

    Ok(WgCosts {
        other: nth(0),
        utilities: nth(1),
        rent: nth(2),
        total: nth(3),
        deposit: provision(0)?,
        transfer_fee: provision(1)?,
    })
}

fn parse_amenities(root: ElementRef<'_>, panel_titles: &'static str) -> Result<Option<Map<String, Value>>> {
    let Some(row) = heading(root, panel_titles, "Angaben zum Objekt")?.and_then(parent) else {
        return Ok(None);
    };

    let mut amenities = Map::new();
    for div in all(row, "div")? {
        let Some(span) = first(div, "span")? else {
            continue;
        };
        if span.value().attr("aria-hidden").is_some() {
            continue;
        }
        // icon class like "glyphicons-mixed-buildings"
        let Some(icon) = span
            .value()
            .classes()
            .find_map(|class| class.split_once('-').map(|(_, icon)| icon))
        else {
            continue;
        };
        let key = angaben_key(icon)?;
        let value = if key == "ökostrom" {
            Value::Bool(true)
        } else {
            Value::String(text_of(div))
        };
        amenities.insert(key.to_string(), value);
    }

    Ok(Some(amenities).filter(|a| !a.is_empty()))
}

fn parse_wg_details(root: ElementRef<'_>, panel: ElementRef<'_>) -> Result<(WgDetails, Roommates)> {
    let items = all(panel, "li")?;
    let mut texts: Vec<Option<String>> = items
        .iter()
        .map(|li| Some(text_of(*li)).filter(|s| !s.is_empty()))
        .collect();

    let occupied = items
        .last()
        .map(|li| li.text().collect::<String>().contains("momentan vermietet"))
        .unwrap_or(false);

    let roommates = if occupied {
        let total = texts
            .get(2)
            .cloned()
            .flatten()
            .and_then(|t| first_integer(&t))
            .ok_or_else(|| ScrapeError::missing("roommate count"))?;
        let total = u8::try_from(total).map_err(|_| ScrapeError::parse("roommates", total.to_string()))?;
        Roommates::occupied(total)
    } else {
        let badge = require(root, r#"span[title*="WG"]"#)?;
        let title = badge.value().attr("title").unwrap_or_default();
        parse_roommates(title)?
    };

    // the smoking line is optional
    if texts.len() == 7 {
        texts.insert(4, None);
    }
    let at = |i: usize| texts.get(i).cloned().flatten();

    let details = WgDetails {
        wg_size: at(0),
        wohnung_size: at(1),
        roommate_age: at(3),
        smoking: at(4),
        wg_type: at(5),
        languages: at(6),
        looking_for: at(7),
    };
    Ok((details, roommates))
}

/// `"3er WG (1w,1m,0d)"` -> `[3, 1, 1, 0]`
pub fn parse_roommates(title: &str) -> Result<Roommates> {
    let numbers = all_integers(title);
    if numbers.is_empty() {
        return Err(ScrapeError::parse("roommates", title));
    }
    let byte = |i: usize| -> Result<u8> {
        match numbers.get(i) {
            Some(n) => u8::try_from(*n).map_err(|_| ScrapeError::parse("roommates", title)),
            None => Ok(0),
        }
    };
    Ok(Roommates {
        total: byte(0)?,
        female: byte(1)?,
        male: byte(2)?,
        diverse: byte(3)?,
    })
}

fn parse_availability(panel: ElementRef<'_>) -> Result<(Option<chrono::NaiveDate>, Option<chrono::NaiveDate>)> {
    let p = require(panel, "p")?;
    let text = p.text().collect::<String>();
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let from = lines
        .get(1)
        .ok_or_else(|| ScrapeError::missing("frei ab"))
        .and_then(|d| parse_date(d))?;
    let until = match lines.get(3) {
        Some(d) => Some(parse_date(d)?),
        None => None,
    };
    Ok((Some(from), until))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn params() -> SearchParams {
        SearchParams {
            city: "Augsburg".to_string(),
            listing_type: "0".to_string(),
            strict_districts: true,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    const INDEX: &str = r#"
    <html><body>
      <div id="liste-details-ad-8123456">
        <a href="wg-zimmer-in-Augsburg-Innenstadt.8123456.html"
           style="background-image: url(https://img.wg-gesucht.de/media/up/2021/10/abc.sized.jpg);"></a>
        <div class="col-xs-11"><span>3er WG | 86150 Augsburg Innenstadt | Maxstraße 3</span></div>
        <div class="col-sm-12 flex_space_between"><span>Anna</span></div>
        <div class="col-sm-12 flex_space_between"><span>Hausverwaltung Meier</span><span>Online: 3 Stunden</span></div>
      </div>
      <div id="liste-details-ad-8123457">
        <a href="/wg-zimmer-in-Augsburg-Pfersee.8123457.html"
           style="background-image: url('https://img.wg-gesucht.de/placeholder.jpg');"></a>
        <span class="ribbon-deactivated">deaktiviert</span>
        <div class="col-xs-11"><span>2er WG | Augsburg Pfersee | Augsburger Straße</span></div>
        <div class="col-sm-12 flex_space_between"><span>Max</span><span>Online: 01.03.2021</span></div>
      </div>
      <div id="liste-details-ad-hidden-1"></div>
      <div id="liste-details-ad-8123458">
        <span title="tauschangebot"></span>
      </div>
      <ul class="pagination pagination-sm"><li>1</li><li>2</li><li>7</li><li>»</li></ul>
    </body></html>"#;

    #[test]
    fn test_index_cards() {
        let refs = parse_index(INDEX, now()).unwrap();
        assert_eq!(refs.len(), 2);

        let first = &refs[0];
        assert_eq!(first.id, "8123456");
        assert_eq!(first.url, "https://www.wg-gesucht.de/wg-zimmer-in-Augsburg-Innenstadt.8123456.html");
        assert_eq!(first.card.listed_at, now());

        let card = parse_card(&first.card.html, &params(), first.card.listed_at).unwrap();
        assert_eq!(card.realtor.as_deref(), Some("Hausverwaltung Meier"));
        assert_eq!(card.online_since, now() - Duration::hours(3));
        assert_eq!(
            card.image_url.as_deref(),
            Some("https://img.wg-gesucht.de/media/up/2021/10/abc.sized.jpg")
        );
        assert_eq!(card.address.district.as_deref(), Some("Innenstadt_Augsburg"));
        assert!(card.available);

        let second = &refs[1];
        assert_eq!(second.url, "https://www.wg-gesucht.de/wg-zimmer-in-Augsburg-Pfersee.8123457.html");
        let card = parse_card(&second.card.html, &params(), now()).unwrap();
        assert_eq!(card.image_url, None);
        assert!(!card.available);
        assert_eq!(card.address.district.as_deref(), Some("Pfersee_Augsburg"));
    }

    #[test]
    fn test_unknown_district_only_fails_its_own_card() {
        let body = INDEX.replace("Augsburg Innenstadt", "Augsburg Atlantis");
        let refs = parse_index(&body, now()).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, "8123456");

        assert!(matches!(
            parse_card(&refs[0].card.html, &params(), now()),
            Err(ScrapeError::UnknownDistrict(_))
        ));
        assert!(parse_card(&refs[1].card.html, &params(), now()).is_ok());
    }

    #[test]
    fn test_page_count() {
        assert_eq!(parse_page_count(INDEX).unwrap(), 7);
    }

    #[test]
    fn test_city_codes() {
        assert_eq!(city_code("Munchen").unwrap(), "90");
        assert!(matches!(city_code("Berlin"), Err(ScrapeError::UnknownCity(_))));
    }

    const DETAIL: &str = r#"
    <html><body>
      <div id="main_column"><h1 class="headline headline-detailed-view-title"> Helles Zimmer in 3er WG </h1></div>
      <div id="basic_facts_wrapper">
        <div id="rent_wrapper">
          <div class="basic_facts_top_part"><label class="amount">75m²</label><label class="description">Wohnung</label></div>
          <div class="basic_facts_bottom_part"><label>18m²</label></div>
        </div>
        <div id="graph_wrapper"><div>
          <div>n.a.</div>
          <div>80€
            Nebenkosten</div>
          <div>350€</div>
          <div>430€</div>
        </div></div>
        <div class="provision-equipment"><label>860€</label></div>
        <div class="provision-equipment"><label>n.a.</label></div>
      </div>
      <div class="panel">
        <h3 class="headline headline-detailed-view-panel-title">Angaben zum Objekt</h3>
        <div><span class="glyphicons glyphicons-bed"></span> möbliert </div>
        <div><span class="glyphicons glyphicons-leaf"></span> Ökostrom </div>
        <div><span aria-hidden="true" class="glyphicons glyphicons-rocket"></span></div>
      </div>
      <div class="panel"><div class="row">
        <h3 class="headline headline-detailed-view-panel-title">WG-Details</h3>
      </div>
        <ul>
          <li>3er WG</li><li>Wohnungsgröße: 75m²</li><li>1 Frau und 1 Mann</li>
          <li>Bewohneralter: 22 bis 27 Jahre</li><li>Studenten-WG</li>
          <li>Sprache/n: Deutsch</li><li>Geschlecht egal</li>
        </ul>
      </div>
      <span title="3er WG (1w,1m,0d)"></span>
      <div class="panel"><div class="row">
        <h3 class="headline headline-detailed-view-panel-title">Verfügbarkeit</h3>
      </div>
        <p>
          frei ab:
          01.04.2021
          frei bis:
          30.09.2021
        </p>
      </div>
    </body></html>"#;

    #[test]
    fn test_detail_page() {
        let page = parse_detail(DETAIL, true).unwrap();
        assert_eq!(page.title, "Helles Zimmer in 3er WG");
        assert_eq!(page.sizes.total_area, parse_german_decimal("75"));
        assert_eq!(page.sizes.room_area, parse_german_decimal("18"));
        assert_eq!(page.costs.other, None);
        assert_eq!(page.costs.utilities, parse_german_decimal("80"));
        assert_eq!(page.costs.rent, parse_german_decimal("350"));
        assert_eq!(page.costs.total, parse_german_decimal("430"));
        assert_eq!(page.costs.deposit, parse_german_decimal("860"));
        assert_eq!(page.costs.transfer_fee, None);

        let amenities = page.amenities.unwrap();
        assert_eq!(amenities["einrichtung"], Value::String("möbliert".to_string()));
        assert_eq!(amenities["ökostrom"], Value::Bool(true));

        assert_eq!(page.roommates.to_bytes(), [3, 1, 1, 0]);
        assert_eq!(page.details.smoking, None);
        assert_eq!(page.details.wg_type.as_deref(), Some("Studenten-WG"));
        assert_eq!(page.details.looking_for.as_deref(), Some("Geschlecht egal"));

        assert_eq!(page.free_from, NaiveDate::from_ymd_opt(2021, 4, 1));
        assert_eq!(page.free_until, NaiveDate::from_ymd_opt(2021, 9, 30));
    }

    #[test]
    fn test_unknown_icon_fails() {
        let body = DETAIL.replace("glyphicons-bed", "glyphicons-rocket");
        assert!(matches!(
            parse_detail(&body, true),
            Err(ScrapeError::UnknownVocabulary { kind: "attribute icon", .. })
        ));
    }

    #[test]
    fn test_let_room_has_only_a_total() {
        let body = DETAIL.replace("<li>Geschlecht egal</li>", "<li>Geschlecht egal</li><li>momentan vermietet</li>");
        let page = parse_detail(&body, false).unwrap();
        assert_eq!(page.roommates.to_bytes(), [1, 0, 0, 0]);
        assert_eq!(page.free_from, None);
    }

    #[test]
    fn test_roommate_counts_beyond_a_byte_fail() {
        assert!(matches!(
            parse_roommates("300er WG (1w,1m,0d)"),
            Err(ScrapeError::Parse { field: "roommates", .. })
        ));
        assert!(parse_roommates("3er WG (1w,1m,300d)").is_err());

        let body = DETAIL.replace(
            "<li>1 Frau und 1 Mann</li>",
            "<li>300 Frauen</li>",
        )
        .replace("<li>Geschlecht egal</li>", "<li>Geschlecht egal</li><li>momentan vermietet</li>");
        assert!(matches!(
            parse_detail(&body, false),
            Err(ScrapeError::Parse { field: "roommates", .. })
        ));
    }
}
