//! Declared label schemas for `<dt>`/`<dd>` attribute groups.
//!
//! A detail group is a list of `(label, value)` pairs. Each declared field
//! claims the first pair whose label matches; required fields that claim
//! nothing are an error, pairs that no field claims are reported back.

use std::collections::HashMap;

use crate::error::{Result, ScrapeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMatch {
    Exact(&'static str),
    Prefix(&'static str),
    Contains(&'static str),
}

impl LabelMatch {
    fn matches(self, label: &str) -> bool {
        match self {
            LabelMatch::Exact(l) => label == l,
            LabelMatch::Prefix(l) => label.starts_with(l),
            LabelMatch::Contains(l) => label.contains(l),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    /// Known label whose value is not stored
    Ignored,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: LabelMatch,
    pub presence: Presence,
}

impl FieldSpec {
    pub const fn required(key: &'static str, label: LabelMatch) -> Self {
        Self {
            key,
            label,
            presence: Presence::Required,
        }
    }

    pub const fn optional(key: &'static str, label: LabelMatch) -> Self {
        Self {
            key,
            label,
            presence: Presence::Optional,
        }
    }

    pub const fn ignored(key: &'static str, label: LabelMatch) -> Self {
        Self {
            key,
            label,
            presence: Presence::Ignored,
        }
    }
}

/// Values claimed by declared fields, by key
#[derive(Debug, Default)]
pub struct Extracted {
    values: HashMap<&'static str, String>,
    pub unmatched: Vec<String>,
}

impl Extracted {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Value of a field declared as required
    pub fn required(&self, key: &'static str) -> Result<&str> {
        self.get(key).ok_or_else(|| ScrapeError::missing(key))
    }
}

/// Normalize a `<dt>` label: collapse whitespace and drop a trailing colon.
pub fn clean_label(raw: &str) -> String {
    let label = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    label.trim_end_matches(':').trim_end().to_string()
}

pub fn evaluate(group: &str, schema: &[FieldSpec], entries: &[(String, String)]) -> Result<Extracted> {
    let mut extracted = Extracted::default();
    let mut claimed = vec![false; schema.len()];

    for (label, value) in entries {
        let label = clean_label(label);
        let spec = schema
            .iter()
            .enumerate()
            .find(|(i, spec)| !claimed[*i] && spec.label.matches(&label));

        match spec {
            Some((i, spec)) => {
                claimed[i] = true;
                if spec.presence != Presence::Ignored {
                    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
                    extracted.values.insert(spec.key, value);
                }
            }
            None => extracted.unmatched.push(label),
        }
    }

    if let Some(spec) = schema
        .iter()
        .zip(&claimed)
        .find(|(spec, claimed)| spec.presence == Presence::Required && !**claimed)
        .map(|(spec, _)| spec)
    {
        return Err(ScrapeError::missing(format!("{} in {}", spec.key, group)));
    }

    for label in &extracted.unmatched {
        tracing::warn!(group, label = %label, "undeclared attribute label");
    }

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOMS: &[FieldSpec] = &[
        FieldSpec::optional("bedrooms", LabelMatch::Exact("Schlafzimmer")),
        FieldSpec::required("rooms", LabelMatch::Exact("Zimmer")),
        FieldSpec::optional("living_area", LabelMatch::Prefix("Wohnfläche")),
        FieldSpec::ignored("internet", LabelMatch::Contains("Internet")),
    ];

    fn entries(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(l, v)| (l.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fields_claim_their_labels() {
        let e = evaluate(
            "details",
            ROOMS,
            &entries(&[
                (" Zimmer: ", " 3 "),
                ("Schlafzimmer:", "2"),
                ("Wohnfläche ca.:", "72,5  m²"),
                ("Internet", "Verfügbarkeit prüfen"),
            ]),
        )
        .unwrap();
        assert_eq!(e.get("rooms"), Some("3"));
        assert_eq!(e.get("bedrooms"), Some("2"));
        assert_eq!(e.get("living_area"), Some("72,5 m²"));
        assert!(!e.contains("internet"));
        assert!(e.unmatched.is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        let err = evaluate("details", ROOMS, &entries(&[("Schlafzimmer", "2")])).unwrap_err();
        assert!(matches!(err, ScrapeError::MissingElement { what } if what == "rooms in details"));
    }

    #[test]
    fn test_undeclared_labels_are_reported() {
        let e = evaluate(
            "details",
            ROOMS,
            &entries(&[("Zimmer", "1"), ("Balkonfläche", "4 m²")]),
        )
        .unwrap();
        assert_eq!(e.unmatched, vec!["Balkonfläche".to_string()]);
        assert_eq!(e.get("bedrooms"), None);
    }
}
