//! Small selector helpers over `scraper`

use scraper::{ElementRef, Selector};

use crate::error::{Result, ScrapeError};

pub fn selector(css: &'static str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| ScrapeError::Selector(css))
}

/// Element text with whitespace collapsed
pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn first<'a>(scope: ElementRef<'a>, css: &'static str) -> Result<Option<ElementRef<'a>>> {
    let sel = selector(css)?;
    let found = scope.select(&sel).next();
    Ok(found)
}

pub fn all<'a>(scope: ElementRef<'a>, css: &'static str) -> Result<Vec<ElementRef<'a>>> {
    let sel = selector(css)?;
    let found = scope.select(&sel).collect();
    Ok(found)
}

/// First match or `MissingElement`
pub fn require<'a>(scope: ElementRef<'a>, css: &'static str) -> Result<ElementRef<'a>> {
    first(scope, css)?.ok_or_else(|| ScrapeError::missing(css))
}

pub fn parent(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

pub fn next_sibling_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

/// `(dt, dd)` text pairs of every `<dl>` below `scope`
pub fn dl_pairs(scope: ElementRef<'_>) -> Result<Vec<(String, String)>> {
    let dt = selector("dt")?;
    let dd = selector("dd")?;
    let pairs = all(scope, "dl")?
        .into_iter()
        .map(|dl| {
            let label = dl.select(&dt).next().map(text_of).unwrap_or_default();
            let value = dl.select(&dd).next().map(text_of).unwrap_or_default();
            (label, value)
        })
        .collect();
    Ok(pairs)
}

/// Heading of the given tag whose text equals `title`
pub fn heading<'a>(scope: ElementRef<'a>, css: &'static str, title: &str) -> Result<Option<ElementRef<'a>>> {
    Ok(all(scope, css)?.into_iter().find(|h| text_of(*h) == title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_dl_pairs_and_headings() {
        let doc = Html::parse_document(
            r#"<div><h4> Kosten </h4><div class="group">
                 <dl><dt>Kaltmiete:</dt><dd> 650 € </dd></dl>
                 <dl><dt>Nebenkosten:</dt><dd>+120
                   €</dd></dl>
               </div></div>"#,
        );
        let root = doc.root_element();
        let h = heading(root, "h4", "Kosten").unwrap().unwrap();
        let group = next_sibling_element(h).unwrap();
        assert_eq!(
            dl_pairs(group).unwrap(),
            vec![
                ("Kaltmiete:".to_string(), "650 €".to_string()),
                ("Nebenkosten:".to_string(), "+120 €".to_string()),
            ]
        );
        assert!(matches!(require(root, "h1"), Err(ScrapeError::MissingElement { .. })));
    }
}
