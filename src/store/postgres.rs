use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use super::{ListingStore, UnresolvedListing};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{
    ImmoscoutListing, Listing, ListingImage, ListingType, ResolvedAddress, Site, SparkasseListing,
    WgListing,
};

const WG_INSERT: &str = r#"
    INSERT INTO wg_gesucht.inserate (inserat_id, viertel, titel,
    miete_gesamt, miete_kalt, miete_sonstige, nebenkosten,
    kaution, abstandszahlung, verfuegbar, city, frei_ab,
    frei_bis, groesse, mitbewohner, wohnungs_type, angaben,
    details, online_seit, realtor, adress_str, strasse, hausnummer,
    plz, neighbourhood, lon, lat, osm_id)
    VALUES (CAST($1 AS BIGINT), $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28)
"#;

const IMMOSCOUT_INSERT: &str = r#"
    INSERT INTO immoscout.inserate (
    inserat_id, titel, miete_gesamt, miete_kalt, miete_heizkosten,
    nebenkosten, kaution, verfuegbar, frei_ab, wohnungs_type, realtor,
    kosten_stellplatz, plz, haustiere, einbaukueche, aufzug,
    balkon_terrasse, gaeste_wc, garten, keller, barrierefrei, wg_geeignet, wbs,
    ausstattung_qualitaet, etage, etage_all, badezimmer, zustand,
    modernisierung_jahr, garage_stellplatz, garage_stellplatz_cnt,
    energietraeger, heizungsart, energieausweis, energieausweis_art,
    energieeffizienzklasse, baujahr_gebaeude, zimmer_anzahl,
    schlafzimmer, wohnflaeche, nutzflaeche, schufa_auskunft,
    online_besichtigung, such_str, adress_str)
    VALUES (CAST($1 AS BIGINT), $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
    $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30,
    $31, $32, $33, $34, $35, $36, $37, $38, $39, $40, $41, $42, $43, $44, $45)
"#;

const SPK_INSERT: &str = r#"
    INSERT INTO spk.inserate (such_str, fio_id, objektkategorie, geo, preise,
    flaechen, ausstattung, zustand_angaben, freitexte, verwaltung_objekt,
    verwaltung_techn, anbieter, sip, wohnungs_type)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
"#;

const UPDATE_ADDRESS: &str = r#"
    UPDATE wg_gesucht.inserate
    SET city = COALESCE($1, city),
    viertel = $2,
    strasse = $3,
    hausnummer = $4,
    plz = $5,
    neighbourhood = $6,
    lon = $7,
    lat = $8,
    osm_id = $9
    WHERE inserat_id = CAST($10 AS BIGINT)
"#;

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        info!("Connected to PostgreSQL (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    async fn insert_wg(&self, l: &WgListing) -> Result<()> {
        let location = l.location.clone().unwrap_or_default();
        sqlx::query(WG_INSERT)
            .bind(&l.external_id)
            .bind(&l.district)
            .bind(&l.title)
            .bind(&l.costs.total)
            .bind(&l.costs.rent)
            .bind(&l.costs.other)
            .bind(&l.costs.utilities)
            .bind(&l.costs.deposit)
            .bind(&l.costs.transfer_fee)
            .bind(l.available)
            .bind(&l.city)
            .bind(l.free_from)
            .bind(l.free_until)
            .bind(Json(&l.sizes))
            .bind(l.roommates.to_bytes().to_vec())
            .bind(&l.listing_type)
            .bind(l.amenities.as_ref().map(Json))
            .bind(Json(&l.details))
            .bind(l.online_since)
            .bind(&l.realtor)
            .bind(&l.address)
            .bind(&location.street)
            .bind(&location.house_number)
            .bind(&location.postcode)
            .bind(&location.neighbourhood)
            .bind(location.longitude)
            .bind(location.latitude)
            .bind(location.osm_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_immoscout(&self, l: &ImmoscoutListing) -> Result<()> {
        let a = &l.amenities;
        let b = &l.building;
        sqlx::query(IMMOSCOUT_INSERT)
            .bind(&l.external_id)
            .bind(&l.title)
            .bind(&l.costs.total)
            .bind(&l.costs.cold_rent)
            .bind(&l.costs.heating)
            .bind(&l.costs.utilities)
            .bind(&l.costs.deposit)
            .bind(true)
            .bind(l.free_from)
            .bind(l.apartment_type)
            .bind(&l.realtor)
            .bind(&l.costs.parking)
            .bind(&l.postcode)
            .bind(l.pets)
            .bind(a.fitted_kitchen)
            .bind(a.lift)
            .bind(a.balcony_or_terrace)
            .bind(a.guest_toilet)
            .bind(a.garden)
            .bind(a.cellar)
            .bind(a.step_free_access)
            .bind(a.flat_share_suitable)
            .bind(a.housing_entitlement_certificate)
            .bind(b.equipment_quality)
            .bind(l.floor)
            .bind(l.floor_count)
            .bind(l.bathrooms)
            .bind(b.condition)
            .bind(b.modernisation_year)
            .bind(l.garage_type)
            .bind(l.garage_count)
            .bind(b.energy_source)
            .bind(b.heating_type)
            .bind(b.energy_certificate)
            .bind(b.certificate_type)
            .bind(&b.efficiency_class)
            .bind(b.construction_year)
            .bind(&l.rooms)
            .bind(l.bedrooms)
            .bind(&l.living_area)
            .bind(&l.usable_area)
            .bind(l.credit_check_required)
            .bind(a.online_viewing)
            .bind(&l.search_term)
            .bind(&l.address)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_sparkasse(&self, l: &SparkasseListing) -> Result<()> {
        let s = &l.sections;
        sqlx::query(SPK_INSERT)
            .bind(&l.search_term)
            .bind(&l.external_id)
            .bind(Json(&s.objektkategorie))
            .bind(Json(&s.geo))
            .bind(Json(&s.preise))
            .bind(Json(&s.flaechen))
            .bind(Json(&s.ausstattung))
            .bind(Json(&s.zustand_angaben))
            .bind(Json(&s.freitexte))
            .bind(Json(&s.verwaltung_objekt))
            .bind(Json(&s.verwaltung_techn))
            .bind(Json(&s.anbieter))
            .bind(Json(&s.sip))
            .bind(&l.listing_type)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ListingStore for PgStore {
    async fn seen_ids(&self, site: Site, listing_type: &ListingType) -> Result<HashSet<String>> {
        let rows = match site {
            Site::WgGesucht => {
                sqlx::query(
                    "SELECT inserat_id::text AS id FROM wg_gesucht.inserate WHERE wohnungs_type::text = $1",
                )
                .bind(&listing_type.code)
                .fetch_all(&self.pool)
                .await?
            }
            Site::Immoscout => {
                sqlx::query("SELECT inserat_id::text AS id FROM immoscout.inserate")
                    .fetch_all(&self.pool)
                    .await?
            }
            Site::Sparkasse => {
                sqlx::query("SELECT fio_id::text AS id FROM spk.inserate")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let ids = rows
            .iter()
            .map(|row| row.try_get::<String, _>("id"))
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        info!("{} listings stored so far for {} type {}", ids.len(), site.slug(), listing_type.code);
        Ok(ids)
    }

    async fn insert_listing(&self, listing: &Listing) -> Result<()> {
        debug!("Inserting {} listing {}", listing.site().slug(), listing.external_id());
        match listing {
            Listing::WgGesucht(l) => self.insert_wg(l).await,
            Listing::Immoscout(l) => self.insert_immoscout(l).await,
            Listing::Sparkasse(l) => self.insert_sparkasse(l).await,
        }
    }

    async fn insert_image(&self, image: &ListingImage) -> Result<()> {
        let query = match image.site {
            Site::WgGesucht => sqlx::query(
                "INSERT INTO wg_gesucht.images_inserate (id, image) VALUES (CAST($1 AS BIGINT), $2)",
            )
            .bind(&image.listing_id)
            .bind(&image.data),
            Site::Immoscout => {
                sqlx::query("INSERT INTO immoscout.images_inserate (id, image) VALUES (CAST($1 AS BIGINT), $2)")
                    .bind(&image.listing_id)
                    .bind(&image.data)
            }
            Site::Sparkasse => {
                sqlx::query("INSERT INTO spk.images_inserate (id, image, tag) VALUES ($1, $2, $3)")
                    .bind(&image.listing_id)
                    .bind(&image.data)
                    .bind(&image.tag)
            }
        };
        query.execute(&self.pool).await?;
        Ok(())
    }

    async fn geocode_exists(&self, osm_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM gis.osm WHERE osm_id = $1)")
            .bind(osm_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert_geocode(&self, osm_id: i64, feature_collection: &Value, city: Option<&str>) -> Result<()> {
        sqlx::query("INSERT INTO gis.osm (osm_id, fc, city) VALUES ($1, $2, $3)")
            .bind(osm_id)
            .bind(Json(feature_collection))
            .bind(city)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unresolved_listings(&self) -> Result<Vec<UnresolvedListing>> {
        let rows = sqlx::query(
            "SELECT inserat_id::text AS id, viertel, city, adress_str FROM wg_gesucht.inserate WHERE osm_id IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<UnresolvedListing> {
                Ok(UnresolvedListing {
                    listing_id: row.try_get("id")?,
                    district: row.try_get("viertel")?,
                    city: row.try_get::<Option<String>, _>("city")?.unwrap_or_default(),
                    address: row.try_get::<Option<String>, _>("adress_str")?.unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn apply_resolved_address(&self, listing_id: &str, address: &ResolvedAddress) -> Result<()> {
        sqlx::query(UPDATE_ADDRESS)
            .bind(&address.city)
            .bind(&address.district)
            .bind(&address.street)
            .bind(&address.house_number)
            .bind(&address.postcode)
            .bind(&address.neighbourhood)
            .bind(address.longitude)
            .bind(address.latitude)
            .bind(address.osm_id)
            .bind(listing_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
