use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sections of the estate document that are stored as JSON columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparkasseSections {
    pub objektkategorie: Value,
    pub geo: Value,
    pub preise: Value,
    pub flaechen: Value,
    pub ausstattung: Value,
    pub zustand_angaben: Value,
    pub freitexte: Value,
    pub verwaltung_objekt: Value,
    pub verwaltung_techn: Value,
    pub anbieter: Value,
    pub sip: Value,
}

/// immobilien.sparkasse.de estate, one row of `spk.inserate`
#[derive(Debug, Clone, Serialize)]
pub struct SparkasseListing {
    /// FIO id, e.g. `FIO-10915855820`
    pub external_id: String,
    pub search_term: String,
    pub listing_type: String,
    pub sections: SparkasseSections,
}
