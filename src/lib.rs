//! Scrapers for German rental and property listing portals (wg-gesucht,
//! ImmoScout24, the Sparkasse property portal) that normalize listings,
//! resolve addresses through Nominatim and store everything in PostgreSQL.

pub mod config;
pub mod cursor;
pub mod error;
pub mod geocode;
pub mod http;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod scrapers;
pub mod store;

pub use error::{Result, ScrapeError};
