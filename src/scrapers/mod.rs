pub mod browser;
pub mod html;
pub mod immoscout;
pub mod sparkasse;
pub mod traits;
pub mod types;
pub mod wg_gesucht;

pub use immoscout::ImmoscoutScraper;
pub use sparkasse::SparkasseScraper;
pub use traits::SiteAdapter;
pub use types::{ListingRef, RawWgCard, SearchParams, WgCard};
pub use wg_gesucht::WgGesuchtScraper;
