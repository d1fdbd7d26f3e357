use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Serialize;

use crate::normalize::vocabulary::{
    Condition, EnergySource, EquipmentQuality, HeatingType,
};

/// "Kosten" group of an expose
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImmoscoutCosts {
    pub cold_rent: BigDecimal,
    pub utilities: Option<BigDecimal>,
    pub heating: Option<BigDecimal>,
    pub deposit: Option<BigDecimal>,
    pub parking: Option<BigDecimal>,
    pub total: Option<BigDecimal>,
}

/// Equipment checklist; `None` means not listed rather than absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Amenities {
    pub online_viewing: Option<bool>,
    pub fitted_kitchen: Option<bool>,
    pub balcony_or_terrace: Option<bool>,
    pub cellar: Option<bool>,
    pub lift: Option<bool>,
    pub guest_toilet: Option<bool>,
    pub garden: Option<bool>,
    pub flat_share_suitable: Option<bool>,
    pub step_free_access: Option<bool>,
    pub housing_entitlement_certificate: Option<bool>,
}

/// "Bausubstanz & Energieausweis" group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildingInfo {
    pub construction_year: Option<i32>,
    pub modernisation_year: Option<i32>,
    pub condition: i16,
    pub equipment_quality: i16,
    pub heating_type: i16,
    pub energy_source: i16,
    pub energy_certificate: Option<i16>,
    pub certificate_type: Option<i16>,
    pub efficiency_class: Option<String>,
}

impl Default for BuildingInfo {
    fn default() -> Self {
        Self {
            construction_year: None,
            modernisation_year: None,
            condition: Condition::NotSpecified.code(),
            equipment_quality: EquipmentQuality::NotSpecified.code(),
            heating_type: HeatingType::NotSpecified.code(),
            energy_source: EnergySource::NotSpecified.code(),
            energy_certificate: None,
            certificate_type: None,
            efficiency_class: None,
        }
    }
}

/// immobilienscout24.de expose, one row of `immoscout.inserate`
#[derive(Debug, Clone, Serialize)]
pub struct ImmoscoutListing {
    pub external_id: String,
    /// City the search ran for
    pub search_term: String,
    pub title: String,
    pub postcode: Option<String>,
    pub address: String,
    pub realtor: Option<String>,
    pub costs: ImmoscoutCosts,
    pub apartment_type: Option<i16>,
    pub floor: Option<i16>,
    pub floor_count: Option<i16>,
    pub living_area: BigDecimal,
    pub usable_area: Option<BigDecimal>,
    pub free_from: Option<NaiveDate>,
    pub bedrooms: Option<i16>,
    pub bathrooms: Option<i16>,
    pub rooms: BigDecimal,
    pub pets: i16,
    pub garage_type: i16,
    pub garage_count: Option<i16>,
    pub credit_check_required: bool,
    pub amenities: Amenities,
    pub building: BuildingInfo,
}
