//! Shared normalization of scraped free text: German numbers and dates,
//! fixed vocabularies, district names and declared label schemas.

pub mod date;
pub mod district;
pub mod number;
pub mod schema;
pub mod vocabulary;

pub use date::{parse_date, parse_move_in, parse_online_since};
pub use district::{canonicalize, parse_card_address, CardAddress};
pub use number::parse_german_decimal;
