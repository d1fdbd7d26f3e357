//! District ("Viertel") canonicalization.
//!
//! Listing sites let users type the district freely. The alias table below
//! maps every spelling seen so far to a canonical `{district}_{city}` token,
//! or to `None` for places outside the city or without districts.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::error::{Result, ScrapeError};

const DISTRICT_ALIASES: &[(&str, Option<&str>)] = &[
    ("uni", Some("Universitätsviertel_Augsburg")),
    ("uni-", Some("Universitätsviertel_Augsburg")),
    ("universitätsviertel", Some("Universitätsviertel_Augsburg")),
    ("pfersee", Some("Pfersee_Augsburg")),
    ("rosenau-thelottviertel", Some("Pfersee_Augsburg")),
    ("thelottviertel", Some("Pfersee_Augsburg")),
    ("antonsviertel", Some("Antonsviertel_Augsburg")),
    ("inningen", Some("Inningen_Augsburg")),
    ("spickel-herrenbach", Some("Spickel-Herrenbach_Augsburg")),
    ("wolframviertel", Some("Spickel-Herrenbach_Augsburg")),
    ("spickel", Some("Spickel-Herrenbach_Augsburg")),
    ("herrenbach", Some("Spickel-Herrenbach_Augsburg")),
    ("textilviertel", Some("Spickel-Herrenbach_Augsburg")),
    ("hochfeld", Some("Hochfeld_Augsburg")),
    ("prinz karl viertel", Some("Hochfeld_Augsburg")),
    ("bergheim", Some("Bergheim_Augsburg")),
    ("haunstetten-siebenbrunn", Some("Haunstetten-Siebenbrunn_Augsburg")),
    ("haunstetten nord", Some("Haunstetten-Siebenbrunn_Augsburg")),
    ("haunstetten süd", Some("Haunstetten-Siebenbrunn_Augsburg")),
    ("haunstetten", Some("Haunstetten-Siebenbrunn_Augsburg")),
    ("göggingen", Some("Göggingen_Augsburg")),
    ("hochzoll", Some("Hochzoll_Augsburg")),
    ("firnhaberau", Some("Firnhaberau_Augsburg")),
    ("hammerschmiede", Some("Hammerschmiede_Augsburg")),
    ("kriegshaber", Some("Kriegshaber_Augsburg")),
    ("bärenkeller", Some("Bärenkeller_Augsburg")),
    ("lechhausen", Some("Lechhausen_Augsburg")),
    ("oberhausen", Some("Oberhausen_Augsburg")),
    ("rechts der wertach", Some("Oberhausen_Augsburg")),
    ("links der wertach", Some("Oberhausen_Augsburg")),
    ("man viertel", Some("Oberhausen_Augsburg")),
    ("innenstadt", Some("Innenstadt_Augsburg")),
    ("zentrum", Some("Innenstadt_Augsburg")),
    ("mitte", Some("Innenstadt_Augsburg")),
    ("jakobervorstadt", Some("Innenstadt_Augsburg")),
    ("jakobervorstadt süd", Some("Innenstadt_Augsburg")),
    ("jakobervorstadt nord", Some("Innenstadt_Augsburg")),
    ("bismarckviertel", Some("Innenstadt_Augsburg")),
    ("bismarkviertel", Some("Innenstadt_Augsburg")),
    ("bismarckviertel innenstadt", Some("Innenstadt_Augsburg")),
    ("georgsviertel", Some("Innenstadt_Augsburg")),
    ("georgs- und kreuzviertel", Some("Innenstadt_Augsburg")),
    ("am schäfflerbach", Some("Innenstadt_Augsburg")),
    ("domviertel", Some("Innenstadt_Augsburg")),
    ("theaterviertel", Some("Innenstadt_Augsburg")),
    ("stadtjägerviertel", Some("Innenstadt_Augsburg")),
    ("stadtjäger", Some("Innenstadt_Augsburg")),
    ("bleiche und pfärrle", Some("Innenstadt_Augsburg")),
    ("bleich und pfärrle", Some("Innenstadt_Augsburg")),
    ("beethovenviertel", Some("Innenstadt_Augsburg")),
    ("heilig-kreuz-viertel", Some("Innenstadt_Augsburg")),
    ("augsburg", None),
    ("bayern - augsburg", None),
    ("bayern augsburg", None),
    ("königsbrunn", None),
    ("stadtbergen", None),
    ("biburg", None),
    ("bergen", None),
    ("pöttmes", None),
    ("zusmarshausen", None),
    ("aystetten", None),
    ("neusäß", None),
    ("steppach", None),
    ("gersthofen", None),
    ("friedberg-west", None),
    ("friedberg", None),
    ("deutschland", None),
    ("", None),
];

/// Districts that are really a separate municipality
const MUNICIPALITY_OVERRIDES: &[(&str, &str)] = &[
    ("königsbrunn", "Königsbrunn"),
    ("stadtbergen", "Stadtbergen"),
    ("biburg", "Diedorf"),
    ("bergen", "Affing"),
    ("pöttmes", "Pöttmes"),
    ("zusmarshausen", "Zusmarshausen"),
    ("aystetten", "Aystetten"),
    ("neusäß", "Neusäß"),
    ("steppach", "Neusäß"),
    ("gersthofen", "Gersthofen"),
];

/// Places the geocoder reports without any sub-districting
pub const CITIES_WITHOUT_DISTRICTS: &[&str] = &[
    "Friedberg",
    "Dasing",
    "Königsbrunn",
    "Neusäß",
    "Aichach",
    "Stadtbergen",
    "Diedorf",
    "Affing",
    "Pöttmes",
    "Zusmarshausen",
    "Aystetten",
    "Gersthofen",
    "Kutzenhausen",
    "Dinkelscherben",
    "Graben",
    "Großaitingen",
    "Igling",
    "Mering",
    "Kissing",
    "Welden",
    "Schwabmünchen",
    "Obergriesbach",
    "Obermeitingen",
];

static ALIASES: Lazy<HashMap<&'static str, Option<&'static str>>> =
    Lazy::new(|| DISTRICT_ALIASES.iter().copied().collect());

/// Lowercased canonical token -> canonical token
static CANONICAL: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    DISTRICT_ALIASES
        .iter()
        .filter_map(|(_, canonical)| *canonical)
        .map(|c| (c.to_lowercase(), c))
        .collect()
});

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("valid parenthetical regex"));

static QUALIFIERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(nähe|umgebung)\b").expect("valid qualifier regex"));

/// Strip qualifier words, alternatives after `/`, a trailing parenthetical
/// note, digits and redundant whitespace.
pub fn strip_qualifiers(raw: &str) -> String {
    let text = PARENTHETICAL.replace(raw, "");
    let text = QUALIFIERS.replace_all(&text, "");
    let text = text.replace(" - ", " ");
    let text = text.split('/').next().unwrap_or_default();
    let text: String = text.chars().filter(|c| !c.is_ascii_digit()).collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map a cleaned, lowercased district name to its canonical token.
///
/// Canonical tokens map to themselves, so the mapping is idempotent.
/// Unknown names are an error when `strict`, otherwise `None`.
pub fn canonicalize(district: &str, strict: bool) -> Result<Option<&'static str>> {
    let key = strip_qualifiers(district).to_lowercase();
    if let Some(canonical) = ALIASES.get(key.as_str()) {
        return Ok(*canonical);
    }
    if let Some(canonical) = CANONICAL.get(&key) {
        return Ok(Some(canonical));
    }
    if strict {
        Err(ScrapeError::UnknownDistrict(key))
    } else {
        tracing::warn!(district = %key, "unmapped district stored as null");
        Ok(None)
    }
}

/// The municipality a district name actually denotes, if it is not the
/// searched city.
pub fn municipality_for(district: &str) -> Option<&'static str> {
    let key = district.to_lowercase();
    if key.contains("friedberg") {
        return Some("Friedberg");
    }
    MUNICIPALITY_OVERRIDES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, city)| *city)
}

pub fn has_districts(city: &str) -> bool {
    !CITIES_WITHOUT_DISTRICTS.contains(&city)
}

/// Location block of a wg-gesucht result card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardAddress {
    /// Cleaned `"{city} {district} {street}"` line, kept for later geocoding
    pub address: String,
    pub district: Option<String>,
    pub city: String,
}

/// Parse a card subtitle like `"3er WG | 86150 Augsburg Innenstadt | Maxstraße 3"`.
///
/// The leading flat description is dropped. The first remaining segment is
/// `"{city} {district}"`, optionally with a postal code and qualifiers.
pub fn parse_card_address(subtitle: &str, default_city: &str, strict: bool) -> Result<CardAddress> {
    let mut segments = subtitle
        .split('|')
        .skip(1)
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "));

    let location = segments
        .next()
        .map(|s| strip_qualifiers(&s))
        .ok_or_else(|| ScrapeError::missing("address segment in card subtitle"))?;
    let street: Vec<String> = segments
        .map(|s| QUALIFIERS.replace_all(&s, "").split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect();

    let raw_district = location
        .split_whitespace()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let city = municipality_for(&raw_district).unwrap_or(default_city).to_string();
    let district = canonicalize(&raw_district, strict)?.map(str::to_string);

    let address = std::iter::once(location)
        .chain(street)
        .collect::<Vec<_>>()
        .join(" ");

    Ok(CardAddress {
        address,
        district,
        city,
    })
}
