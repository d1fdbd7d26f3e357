use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{Local, NaiveDate};
use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};

use super::html::{all, dl_pairs, first, heading, next_sibling_element, require, text_of};
use super::traits::SiteAdapter;
use super::types::{ListingRef, SearchParams};
use crate::error::{Result, ScrapeError};
use crate::http::Fetcher;
use crate::models::{
    Amenities, BuildingInfo, ImmoscoutCosts, ImmoscoutListing, Listing, ListingImage, ListingType,
    ScrapedListing, Site,
};
use crate::normalize::number::{first_integer, parse_german_decimal};
use crate::normalize::parse_move_in;
use crate::normalize::schema::{evaluate, FieldSpec, LabelMatch};
use crate::normalize::vocabulary::{
    ApartmentType, CertificateType, Condition, EnergyCertificate, EnergySource, EquipmentQuality,
    GarageType, HeatingType, PetPolicy, NOT_STATED,
};

const BASE_URL: &str = "https://www.immobilienscout24.de/";

const ADDRESS_ON_REQUEST: &str = "Die vollständige Adresse der Immobilie erhalten Sie vom Anbieter.";

const COSTS: &[FieldSpec] = &[
    FieldSpec::required("cold_rent", LabelMatch::Contains("Kaltmiete")),
    FieldSpec::optional("utilities", LabelMatch::Contains("Nebenkosten")),
    FieldSpec::optional("heating", LabelMatch::Contains("Heizkosten")),
    FieldSpec::optional("deposit", LabelMatch::Contains("Kaution")),
    FieldSpec::optional("parking", LabelMatch::Contains("Miete für Garage")),
    FieldSpec::optional("total", LabelMatch::Contains("Gesamtmiete")),
];

const DETAILS: &[FieldSpec] = &[
    FieldSpec::optional("type", LabelMatch::Exact("Typ")),
    FieldSpec::optional("floor", LabelMatch::Exact("Etage")),
    FieldSpec::required("living_area", LabelMatch::Prefix("Wohnfläche")),
    FieldSpec::optional("usable_area", LabelMatch::Prefix("Nutzfläche")),
    FieldSpec::optional("free_from", LabelMatch::Prefix("Bezugsfrei ab")),
    FieldSpec::optional("bedrooms", LabelMatch::Exact("Schlafzimmer")),
    FieldSpec::optional("bathrooms", LabelMatch::Exact("Badezimmer")),
    FieldSpec::required("rooms", LabelMatch::Exact("Zimmer")),
    FieldSpec::optional("pets", LabelMatch::Prefix("Haustiere")),
    FieldSpec::optional("garage", LabelMatch::Prefix("Garage")),
    FieldSpec::optional("credit_check", LabelMatch::Prefix("Bonitätsauskunft")),
    FieldSpec::ignored("internet", LabelMatch::Prefix("Internet")),
];

const BUILDING: &[FieldSpec] = &[
    FieldSpec::optional("construction_year", LabelMatch::Prefix("Baujahr")),
    FieldSpec::optional("modernisation", LabelMatch::Prefix("Modernisierung")),
    FieldSpec::optional("condition", LabelMatch::Exact("Objektzustand")),
    FieldSpec::optional("equipment_quality", LabelMatch::Contains("Ausstattung")),
    FieldSpec::optional("heating_type", LabelMatch::Prefix("Heizungsart")),
    FieldSpec::optional("energy_source", LabelMatch::Contains("Energieträger")),
    FieldSpec::optional("certificate_type", LabelMatch::Exact("Energieausweistyp")),
    FieldSpec::optional("energy_certificate", LabelMatch::Exact("Energieausweis")),
    FieldSpec::optional("efficiency_class", LabelMatch::Prefix("Energieeffizienzklasse")),
    FieldSpec::ignored("energy_demand", LabelMatch::Prefix("Endenergie")),
];

/// Equipment checklist labels
const AMENITY_LABELS: &[(&str, fn(&mut Amenities))] = &[
    ("Online-Besichtigung", |a| a.online_viewing = Some(true)),
    ("Einbauküche", |a| a.fitted_kitchen = Some(true)),
    ("Balkon/ Terrasse", |a| a.balcony_or_terrace = Some(true)),
    ("Keller", |a| a.cellar = Some(true)),
    ("Personenaufzug", |a| a.lift = Some(true)),
    ("Gäste-WC", |a| a.guest_toilet = Some(true)),
    ("Garten/ -mitbenutzung", |a| a.garden = Some(true)),
    ("WG-geeignet", |a| a.flat_share_suitable = Some(true)),
    ("Stufenloser Zugang", |a| a.step_free_access = Some(true)),
    ("Wohnberechtigungsschein", |a| a.housing_entitlement_certificate = Some(true)),
];

/// immobilienscout24.de rental search for one city
pub struct ImmoscoutScraper<'a> {
    fetcher: &'a Fetcher,
    params: SearchParams,
    listing_type: ListingType,
}

impl<'a> ImmoscoutScraper<'a> {
    pub fn new(fetcher: &'a Fetcher, params: SearchParams) -> Result<Self> {
        let listing_type = ListingType::resolve(Site::Immoscout, &params.listing_type)?;
        Ok(Self {
            fetcher,
            params,
            listing_type,
        })
    }

    fn page_url(&self, page: u32) -> String {
        format!(
            "{}Suche/de/bayern/{}/{}?pagenumber={}",
            BASE_URL,
            self.params.city.to_lowercase(),
            self.listing_type.segment,
            page
        )
    }
}

#[async_trait]
impl<'a> SiteAdapter for ImmoscoutScraper<'a> {
    type Card = ();

    fn site(&self) -> Site {
        Site::Immoscout
    }

    fn listing_type(&self) -> &ListingType {
        &self.listing_type
    }

    fn uses_cursor(&self) -> bool {
        false
    }

    fn stop_when_exhausted(&self) -> bool {
        true
    }

    async fn last_page(&self) -> Result<u32> {
        let body = self.fetcher.get_html(&self.page_url(1)).await?;
        let pages = parse_page_count(&body)?;
        info!("There are {} result pages", pages);
        Ok(pages)
    }

    async fn list_page(&self, page: u32) -> Result<Vec<ListingRef>> {
        let body = self.fetcher.get_html(&self.page_url(page)).await?;
        parse_index(&body)
    }

    async fn fetch_detail(&self, listing: &ListingRef) -> Result<ScrapedListing> {
        info!("Parsing expose {}", listing.url);
        let body = self.fetcher.get_html(&listing.url).await?;
        let (mut expose, image_url) = parse_expose(&body, &listing.id, &self.params.city, Local::now().date_naive())?;
        expose.realtor = listing.realtor.clone();

        let data = match image_url {
            Some(url) => match self.fetcher.get_bytes(&url).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Gallery image {} unavailable: {}", url, e);
                    None
                }
            },
            None => None,
        };

        Ok(ScrapedListing {
            listing: Listing::Immoscout(expose),
            images: vec![ListingImage {
                site: Site::Immoscout,
                listing_id: listing.id.clone(),
                data,
                tag: None,
            }],
        })
    }
}

/// Highest page number of the page selector; a single page has none
pub fn parse_page_count(body: &str) -> Result<u32> {
    let doc = Html::parse_document(body);
    let Some(wrapper) = first(doc.root_element(), "div.select-input-wrapper")? else {
        debug!("No page selector, assuming a single page");
        return Ok(1);
    };
    let options = all(wrapper, "option")?;
    let last = options.last().ok_or_else(|| ScrapeError::missing("page selector options"))?;
    let text = text_of(*last);
    text.parse().map_err(|_| ScrapeError::parse("page count", text))
}

pub fn parse_index(body: &str) -> Result<Vec<ListingRef>> {
    let doc = Html::parse_document(body);
    let Some(list) = first(doc.root_element(), "ul#resultListItems")? else {
        return Ok(Vec::new());
    };

    let mut refs = Vec::new();
    for item in all(list, "li.result-list__listing")? {
        let Some(id) = item.value().attr("data-id") else {
            continue;
        };
        let realtor = match first(item, "div.result-list-entry__realtor-data")? {
            Some(block) => {
                let parts: Vec<String> = all(block, "span")?
                    .into_iter()
                    .map(text_of)
                    .filter(|t| !t.is_empty())
                    .collect();
                Some(parts.join(" ")).filter(|r| !r.is_empty())
            }
            None => None,
        };
        refs.push(ListingRef::new(id, format!("{}expose/{}", BASE_URL, id), realtor));
    }
    Ok(refs)
}

fn decimal(field: &'static str, value: &str) -> Result<BigDecimal> {
    parse_german_decimal(value).ok_or_else(|| ScrapeError::parse(field, value))
}

fn small(value: &str) -> Option<i16> {
    first_integer(value).and_then(|n| i16::try_from(n).ok())
}

/// Parse an expose page. Returns the listing and the gallery image URL.
pub fn parse_expose(
    body: &str,
    id: &str,
    search_term: &str,
    today: NaiveDate,
) -> Result<(ImmoscoutListing, Option<String>)> {
    let doc = Html::parse_document(body);
    let root = doc.root_element();

    let title = text_of(require(root, "h1#expose-title")?);
    let (postcode, address) = parse_address(root)?;
    let costs = parse_costs(root)?;

    let group = require(root, "div.criteriagroup.criteria-group--two-columns")?;
    let d = evaluate("details", DETAILS, &dl_pairs(group)?)?;

    let apartment_type = d
        .get("type")
        .map(|t| ApartmentType::from_label(t).map(|t| t.code()))
        .transpose()?;

    let (floor, floor_count) = match d.get("floor") {
        Some(f) => match f.split_once("von") {
            Some((floor, total)) => (small(floor), small(total)),
            None => (small(f), None),
        },
        None => (None, None),
    };

    let living_area = decimal("living area", d.required("living_area")?)?;
    let usable_area = d.get("usable_area").and_then(parse_german_decimal);
    let free_from = match d.get("free_from") {
        Some(text) => parse_move_in(text, today)?,
        None => None,
    };
    let rooms = decimal("rooms", d.required("rooms")?)?;

    let pets = match d.get("pets") {
        Some(p) => PetPolicy::from_label(p)?.code(),
        None => NOT_STATED,
    };

    let (garage_type, garage_count) = match d.get("garage") {
        Some(g) => {
            let kind = g.split_whitespace().last().unwrap_or_default();
            (GarageType::from_label(kind)?.code(), small(g))
        }
        None => (NOT_STATED, None),
    };

    let credit_check_required = d
        .get("credit_check")
        .map_or(false, |v| v.contains("erforderlich"));

    let listing = ImmoscoutListing {
        external_id: id.to_string(),
        search_term: search_term.to_lowercase(),
        title,
        postcode,
        address,
        realtor: None,
        costs,
        apartment_type,
        floor,
        floor_count,
        living_area,
        usable_area,
        free_from,
        bedrooms: d.get("bedrooms").and_then(small),
        bathrooms: d.get("bathrooms").and_then(small),
        rooms,
        pets,
        garage_type,
        garage_count,
        credit_check_required,
        amenities: parse_amenities(root)?,
        building: parse_building(root)?,
    };

    Ok((listing, parse_gallery_image(root)?))
}

fn parse_address(root: ElementRef<'_>) -> Result<(Option<String>, String)> {
    let block = require(root, "div.address-block")?;
    let parts: Vec<String> = all(block, "span")?.into_iter().map(text_of).collect();
    let collapse = |s: &str| s.replace(',', "").split_whitespace().collect::<Vec<_>>().join(" ");

    if parts.iter().any(|p| p == ADDRESS_ON_REQUEST) || parts.len() < 2 {
        let line = parts.first().ok_or_else(|| ScrapeError::missing("address"))?;
        let address = collapse(line);
        let postcode = address.split_whitespace().next().map(str::to_string);
        return Ok((postcode, address));
    }

    let postcode = parts[1].split_whitespace().next().map(str::to_string);
    let address = collapse(&format!("{} {}", parts[1], parts[0]));
    Ok((postcode, address))
}

fn parse_costs(root: ElementRef<'_>) -> Result<ImmoscoutCosts> {
    let group = heading(root, "h4", "Kosten")?
        .and_then(next_sibling_element)
        .ok_or_else(|| ScrapeError::missing("Kosten group"))?;
    let c = evaluate("costs", COSTS, &dl_pairs(group)?)?;

    Ok(ImmoscoutCosts {
        cold_rent: decimal("cold rent", c.required("cold_rent")?)?,
        utilities: c.get("utilities").and_then(parse_german_decimal),
        heating: c.get("heating").and_then(parse_german_decimal),
        deposit: c.get("deposit").and_then(parse_german_decimal),
        parking: c.get("parking").and_then(parse_german_decimal),
        total: c.get("total").and_then(parse_german_decimal),
    })
}

fn parse_amenities(root: ElementRef<'_>) -> Result<Amenities> {
    let mut amenities = Amenities::default();
    let Some(group) = first(root, "div.criteriagroup.boolean-listing")? else {
        return Ok(amenities);
    };

    for label in all(group, r#"span[class^="palm-hide"]"#)?.into_iter().map(text_of) {
        match AMENITY_LABELS.iter().find(|(known, _)| label.contains(known)) {
            Some((_, set)) => set(&mut amenities),
            None => warn!(label = %label, "unrecognized equipment label"),
        }
    }
    Ok(amenities)
}

fn parse_building(root: ElementRef<'_>) -> Result<BuildingInfo> {
    let mut building = BuildingInfo::default();
    let Some(group) = heading(root, "h4", "Bausubstanz & Energieausweis")?.and_then(next_sibling_element) else {
        return Ok(building);
    };
    let b = evaluate("building", BUILDING, &dl_pairs(group)?)?;

    building.construction_year = b
        .get("construction_year")
        .filter(|y| !y.contains("unbekannt"))
        .and_then(first_integer)
        .map(|y| y as i32);
    building.modernisation_year = b.get("modernisation").and_then(first_integer).map(|y| y as i32);
    if let Some(v) = b.get("condition") {
        building.condition = Condition::from_label(v)?.code();
    }
    if let Some(v) = b.get("equipment_quality") {
        building.equipment_quality = EquipmentQuality::from_label(v)?.code();
    }
    if let Some(v) = b.get("heating_type") {
        building.heating_type = HeatingType::from_label(v)?.code();
    }
    if let Some(v) = b.get("energy_source") {
        // only the first listed source counts
        let primary = v.split(',').next().unwrap_or_default();
        building.energy_source = EnergySource::from_label(primary)?.code();
    }
    building.energy_certificate = b
        .get("energy_certificate")
        .map(|v| EnergyCertificate::from_label(v).map(|c| c.code()))
        .transpose()?;
    building.certificate_type = b
        .get("certificate_type")
        .map(|v| CertificateType::from_label(v).map(|c| c.code()))
        .transpose()?;
    building.efficiency_class = b.get("efficiency_class").map(str::to_string);

    Ok(building)
}

fn parse_gallery_image(root: ElementRef<'_>) -> Result<Option<String>> {
    let Some(gallery) = first(root, "div.is24-expose-gallery-box")? else {
        return Ok(None);
    };
    let Some(child) = gallery.children().find_map(ElementRef::wrap) else {
        return Ok(None);
    };
    if child.value().classes().any(|c| c == "no-header-gallery-image") {
        return Ok(None);
    }
    Ok(first(child, "img")?.and_then(|img| img.value().attr("src").map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        parse_german_decimal(s).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, 10).unwrap()
    }

    const INDEX: &str = r#"
    <html><body>
      <ul id="resultListItems">
        <li class="result-list__listing" data-id="125678901">
          <div class="result-list-entry__realtor-data"><span>Wohnbau</span><span></span><span>GmbH</span></div>
        </li>
        <li class="result-list__listing" data-id="125678902"></li>
        <li class="result-list__listing"></li>
      </ul>
      <div class="select-input-wrapper"><select><option>1</option><option>2</option><option>12</option></select></div>
    </body></html>"#;

    #[test]
    fn test_index() {
        let refs = parse_index(INDEX).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, "125678901");
        assert_eq!(refs[0].url, "https://www.immobilienscout24.de/expose/125678901");
        assert_eq!(refs[0].realtor.as_deref(), Some("Wohnbau GmbH"));
        assert_eq!(refs[1].realtor, None);
        assert_eq!(parse_page_count(INDEX).unwrap(), 12);
        assert_eq!(parse_page_count("<html></html>").unwrap(), 1);
    }

    const EXPOSE: &str = r#"
    <html><body>
      <h1 id="expose-title">Schöne 3-Zimmer-Wohnung mit Balkon</h1>
      <div class="address-block"><span>Maximilianstraße 12,</span><span>86150 Augsburg, Innenstadt</span></div>
      <div class="is24-expose-gallery-box"> <div class="gallery"><img src="https://pictures.immobilienscout24.de/listings/abc.jpg"/></div></div>
      <div class="criteriagroup criteria-group--two-columns">
        <dl><dt>Typ:</dt><dd>Etagenwohnung</dd></dl>
        <dl><dt>Etage:</dt><dd>2 von 4</dd></dl>
        <dl><dt>Wohnfläche ca.:</dt><dd>78,5 m²</dd></dl>
        <dl><dt>Bezugsfrei ab:</dt><dd>01.05.2021</dd></dl>
        <dl><dt>Zimmer:</dt><dd>3</dd></dl>
        <dl><dt>Schlafzimmer:</dt><dd>2</dd></dl>
        <dl><dt>Badezimmer:</dt><dd>1</dd></dl>
        <dl><dt>Haustiere:</dt><dd>Nach Vereinbarung</dd></dl>
        <dl><dt>Garage/ Stellplatz:</dt><dd>1 Tiefgaragen-Stellplatz</dd></dl>
        <dl><dt>Internet:</dt><dd>Verfügbarkeit prüfen</dd></dl>
      </div>
      <div class="criteriagroup boolean-listing padding-top-l">
        <span class="palm-hide">Einbauküche</span>
        <span class="palm-hide">Balkon/ Terrasse</span>
        <span class="palm-hide">Keller</span>
      </div>
      <div class="costs">
        <h4> Kosten </h4>
        <div class="criteriagroup">
          <dl><dt>Kaltmiete:</dt><dd>1.050 €</dd></dl>
          <dl><dt>Nebenkosten:</dt><dd>+ 180 €</dd></dl>
          <dl><dt>Heizkosten:</dt><dd>in Nebenkosten enthalten</dd></dl>
          <dl><dt>Gesamtmiete:</dt><dd>1.230 €</dd></dl>
          <dl><dt>Kaution o. Genossenschaftsanteile:</dt><dd>3.150 €</dd></dl>
        </div>
      </div>
      <div class="building">
        <h4> Bausubstanz &amp; Energieausweis </h4>
        <div class="criteriagroup">
          <dl><dt>Baujahr:</dt><dd>1995</dd></dl>
          <dl><dt>Objektzustand:</dt><dd>Gepflegt</dd></dl>
          <dl><dt>Heizungsart:</dt><dd>Zentralheizung</dd></dl>
          <dl><dt>Wesentliche Energieträger:</dt><dd>Gas, Solar</dd></dl>
          <dl><dt>Energieausweis:</dt><dd>liegt vor</dd></dl>
          <dl><dt>Energieausweistyp:</dt><dd>Verbrauchsausweis</dd></dl>
          <dl><dt>Energieeffizienzklasse:</dt><dd>C</dd></dl>
        </div>
      </div>
    </body></html>"#;

    #[test]
    fn test_expose() {
        let (expose, image) = parse_expose(EXPOSE, "125678901", "Augsburg", today()).unwrap();

        assert_eq!(expose.title, "Schöne 3-Zimmer-Wohnung mit Balkon");
        assert_eq!(expose.postcode.as_deref(), Some("86150"));
        assert_eq!(expose.address, "86150 Augsburg Innenstadt Maximilianstraße 12");
        assert_eq!(expose.search_term, "augsburg");

        assert_eq!(expose.costs.cold_rent, dec("1050"));
        assert_eq!(expose.costs.utilities, Some(dec("180")));
        assert_eq!(expose.costs.heating, None);
        assert_eq!(expose.costs.total, Some(dec("1230")));
        assert_eq!(expose.costs.deposit, Some(dec("3150")));
        assert_eq!(expose.costs.parking, None);

        assert_eq!(expose.apartment_type, Some(4));
        assert_eq!((expose.floor, expose.floor_count), (Some(2), Some(4)));
        assert_eq!(expose.living_area, dec("78.5"));
        assert_eq!(expose.free_from, NaiveDate::from_ymd_opt(2021, 5, 1));
        assert_eq!(expose.rooms, dec("3"));
        assert_eq!((expose.bedrooms, expose.bathrooms), (Some(2), Some(1)));
        assert_eq!(expose.pets, 1);
        assert_eq!((expose.garage_type, expose.garage_count), (6, Some(1)));
        assert!(!expose.credit_check_required);

        assert_eq!(expose.amenities.fitted_kitchen, Some(true));
        assert_eq!(expose.amenities.balcony_or_terrace, Some(true));
        assert_eq!(expose.amenities.cellar, Some(true));
        assert_eq!(expose.amenities.lift, None);

        let b = &expose.building;
        assert_eq!(b.construction_year, Some(1995));
        assert_eq!(b.condition, 8);
        assert_eq!(b.equipment_quality, 1);
        assert_eq!(b.heating_type, 14);
        assert_eq!(b.energy_source, 5);
        assert_eq!(b.energy_certificate, Some(1));
        assert_eq!(b.certificate_type, Some(2));
        assert_eq!(b.efficiency_class.as_deref(), Some("C"));

        assert_eq!(image.as_deref(), Some("https://pictures.immobilienscout24.de/listings/abc.jpg"));
    }

    #[test]
    fn test_address_on_request_and_defaults() {
        let body = EXPOSE
            .replace(
                r#"<span>Maximilianstraße 12,</span><span>86150 Augsburg, Innenstadt</span>"#,
                r#"<span>86150 Augsburg, Innenstadt</span><span>Die vollständige Adresse der Immobilie erhalten Sie vom Anbieter.</span>"#,
            )
            .replace(r#"<dl><dt>Haustiere:</dt><dd>Nach Vereinbarung</dd></dl>"#, "")
            .replace(r#"<dl><dt>Garage/ Stellplatz:</dt><dd>1 Tiefgaragen-Stellplatz</dd></dl>"#, "")
            .replace(r#"<dd>01.05.2021</dd>"#, "<dd>sofort</dd>")
            .replace(r#"<div class="gallery">"#, r#"<div class="no-header-gallery-image">"#);
        let (expose, image) = parse_expose(&body, "1", "Augsburg", today()).unwrap();

        assert_eq!(expose.address, "86150 Augsburg Innenstadt");
        assert_eq!(expose.postcode.as_deref(), Some("86150"));
        assert_eq!(expose.pets, NOT_STATED);
        assert_eq!((expose.garage_type, expose.garage_count), (NOT_STATED, None));
        assert_eq!(expose.free_from, Some(today()));
        assert_eq!(image, None);
    }

    #[test]
    fn test_missing_living_area() {
        let body = EXPOSE.replace(r#"<dl><dt>Wohnfläche ca.:</dt><dd>78,5 m²</dd></dl>"#, "");
        assert!(matches!(
            parse_expose(&body, "1", "Augsburg", today()),
            Err(ScrapeError::MissingElement { .. })
        ));
    }

    #[test]
    fn test_unknown_heating_type() {
        let body = EXPOSE.replace("Zentralheizung", "Kachelofen");
        assert!(matches!(
            parse_expose(&body, "1", "Augsburg", today()),
            Err(ScrapeError::UnknownVocabulary { kind: "heating type", .. })
        ));
    }
}
