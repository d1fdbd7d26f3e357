//! Fixed vocabularies for enumerated free-text labels.
//!
//! Every table maps the site's German label to a stable numeric code. A label
//! missing from a table is an error: new vocabulary has to be added here by
//! hand before it can be stored.

use serde::Serialize;

use crate::error::{Result, ScrapeError};

/// Stored for optional enumerations the listing does not mention at all
pub const NOT_STATED: i16 = 0;

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident = $code:literal => [$($label:literal),+ $(,)?]),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn code(self) -> i16 {
                match self {
                    $(Self::$variant => $code),+
                }
            }

            pub fn from_label(label: &str) -> Result<Self> {
                match label.trim() {
                    $($($label)|+ => Ok(Self::$variant),)+
                    other => Err(ScrapeError::UnknownVocabulary {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

vocabulary! {
    /// Apartment type ("Typ")
    ApartmentType, "apartment type" {
        Souterrain = 1 => ["Souterrain"],
        GroundFloor = 2 => ["Erdgeschosswohnung"],
        RaisedGroundFloor = 3 => ["Hochparterre"],
        Floor = 4 => ["Etagenwohnung"],
        Loft = 5 => ["Loft"],
        Maisonette = 6 => ["Maisonette"],
        Terrace = 7 => ["Terrassenwohnung"],
        Penthouse = 8 => ["Penthouse"],
        Attic = 9 => ["Dachgeschoss"],
        Other = 10 => ["Sonstige"],
    }
}

vocabulary! {
    PetPolicy, "pet policy" {
        ByArrangement = 1 => ["Nach Vereinbarung"],
        Allowed = 2 => ["Ja"],
        NotAllowed = 3 => ["Nein"],
    }
}

vocabulary! {
    EnergyCertificate, "energy certificate" {
        Available = 1 => ["liegt vor"],
        AtViewing = 2 => ["liegt zur Besichtigung vor"],
        NotRequired = 3 => ["laut Gesetz nicht erforderlich"],
    }
}

vocabulary! {
    CertificateType, "energy certificate type" {
        Demand = 1 => ["Bedarfsausweis"],
        Consumption = 2 => ["Verbrauchsausweis"],
    }
}

vocabulary! {
    GarageType, "garage type" {
        Outdoor = 1 => ["Außenstellplatz", "Außenstellplätze"],
        Carport = 2 => ["Carport"],
        Duplex = 3 => ["Duplex-Stellplatz"],
        Garage = 4 => ["Garage", "Garagen"],
        ParkingGarage = 5 => ["Parkhaus-Stellplatz"],
        Underground = 6 => ["Tiefgaragen-Stellplatz", "Tiefgaragen-Stellplätze"],
        Space = 7 => ["Stellplatz", "Stellplätze"],
    }
}

vocabulary! {
    /// Building condition ("Objektzustand")
    Condition, "building condition" {
        NotSpecified = 1 => ["Keine Angabe"],
        FirstOccupancy = 2 => ["Erstbezug"],
        FirstOccupancyAfterRefurbishment = 3 => ["Erstbezug nach Sanierung"],
        AsNew = 4 => ["Neuwertig"],
        Refurbished = 5 => ["Saniert"],
        Modernised = 6 => ["Modernisiert"],
        FullyRenovated = 7 => ["Vollständig renoviert"],
        WellKept = 8 => ["Gepflegt"],
        NeedsRenovation = 9 => ["Renovierungsbedürftig"],
        ByArrangement = 10 => ["Nach Vereinbarung"],
        Dilapidated = 11 => ["Abbruchreif"],
    }
}

vocabulary! {
    EquipmentQuality, "equipment quality" {
        NotSpecified = 1 => ["Keine Angabe"],
        Luxury = 2 => ["Luxus"],
        Upscale = 3 => ["Gehobene Qualität"],
        Normal = 4 => ["Normale Qualität"],
        Basic = 5 => ["Einfache Qualität"],
    }
}

vocabulary! {
    HeatingType, "heating type" {
        NotSpecified = 1 => ["Keine Angabe"],
        CombinedHeatAndPower = 2 => ["Blockheizkraftwerke"],
        Electric = 3 => ["Elektro-Heizung"],
        PerFloor = 4 => ["Etagenheizung"],
        District = 5 => ["Fernwärme"],
        Underfloor = 6 => ["Fußbodenheizung"],
        Gas = 7 => ["Gas-Heizung"],
        WoodPellet = 8 => ["Holz-Pelletheizung"],
        NightStorage = 9 => ["Nachtspeicheröfen"],
        Stove = 10 => ["Ofenheizung"],
        Oil = 11 => ["Öl-Heizung"],
        Solar = 12 => ["Solar-Heizung"],
        HeatPump = 13 => ["Wärmepumpe"],
        Central = 14 => ["Zentralheizung"],
    }
}

vocabulary! {
    /// Primary energy source; only the first one listed counts
    EnergySource, "energy source" {
        NotSpecified = 1 => ["Keine Angabe"],
        Geothermal = 2 => ["Erdwärme"],
        Solar = 3 => ["Solar"],
        WoodPellets = 4 => ["Holzpellets"],
        Gas = 5 => ["Gas"],
        Oil = 6 => ["Öl"],
        DistrictHeating = 7 => ["Fernwärme"],
        Electricity = 8 => ["Strom"],
        Coal = 9 => ["Kohle"],
        NaturalGasLight = 10 => ["Erdgas leicht"],
        NaturalGasHeavy = 11 => ["Erdgas schwer"],
        LiquidGas = 12 => ["Flüssiggas"],
        DistrictSteam = 13 => ["Fernwärme-Dampf"],
        Wood = 14 => ["Holz"],
        WoodChips = 15 => ["Holz-Hackschnitzel"],
        Coke = 16 => ["Kohle-Koks"],
        LocalHeating = 17 => ["Nahwärme"],
        HeatSupply = 18 => ["Wärmelieferung"],
        Bioenergy = 19 => ["Bioenergie"],
        Wind = 20 => ["Windenergie"],
        Hydro = 21 => ["Wasserenergie"],
        Ambient = 22 => ["Umweltwärme"],
        ChpFossil = 23 => ["KWK fossil"],
        ChpRenewable = 24 => ["KWK erneuerbar"],
        ChpRegenerative = 25 => ["KWK regenerativ"],
        ChpBio = 26 => ["KWK bio"],
    }
}

/// wg-gesucht "Angaben zum Objekt" icon names and the key stored for each
const ANGABEN_KEYS: &[(&str, &str)] = &[
    ("mixed-buildings", "haustyp"),
    ("building", "etage"),
    ("bed", "einrichtung"),
    ("bath-bathtub", "sanitär"),
    ("wifi-alt", "internet"),
    ("fabric", "bodenbelag"),
    ("car", "parksituation"),
    ("bus", "entfernung_öpnv"),
    ("folder-closed", "sonstiges"),
    ("display", "tv"),
    ("leaf", "ökostrom"),
    ("fire", "heizung"),
    ("group", "wg_geeignet"),
    ("person-wheelchair", "barrierefrei"),
];

pub fn angaben_key(icon: &str) -> Result<&'static str> {
    ANGABEN_KEYS
        .iter()
        .find(|(name, _)| *name == icon)
        .map(|(_, key)| *key)
        .ok_or_else(|| ScrapeError::UnknownVocabulary {
            kind: "attribute icon",
            value: icon.to_string(),
        })
}
