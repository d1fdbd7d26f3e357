use bigdecimal::BigDecimal;
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d*\.?\d+").expect("valid number regex"));
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid integer regex"));

/// Rewrite German number formatting to the dotted form: `1.382,75` -> `1382.75`.
pub fn delocalize(text: &str) -> String {
    text.replace('.', "").replace(',', ".")
}

/// First decimal number in a German-formatted text, e.g. `"1.234,56 €"` -> `1234.56`.
///
/// Placeholders like `n.a.` contain no digits and yield `None`.
pub fn parse_german_decimal(text: &str) -> Option<BigDecimal> {
    let plain = delocalize(text);
    NUMBER
        .find(&plain)
        .and_then(|m| BigDecimal::from_str(m.as_str()).ok())
}

/// First run of digits in the text.
pub fn first_integer(text: &str) -> Option<u32> {
    INTEGER.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Every run of digits in the text, in order.
pub fn all_integers(text: &str) -> Vec<u32> {
    INTEGER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}
