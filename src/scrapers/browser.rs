use std::collections::HashSet;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, ScrapeError};

const PORTAL_URL: &str = "https://immobilien.sparkasse.de";
const SEARCH_INPUT: &str = "//div/input[@placeholder='PLZ / Ort / SIP-ID*']";
const MORE_RESULTS: &str = "//div[@class='sip-estate-list']//span/button/div/span";

/// Upper bound on "more results" clicks
const MAX_EXPANSIONS: usize = 200;

static FIO_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(FIO-\d+)").expect("valid FIO regex"));

fn browser_err(e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Browser(e.to_string())
}

/// Portal search driven through headless Chrome. The result list is filled
/// in by script, so plain HTTP never sees it.
pub struct SparkasseBrowser {
    browser: Browser,
}

impl SparkasseBrowser {
    pub fn launch() -> Result<Self> {
        info!("Launching headless Chrome...");
        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .map_err(browser_err)?;
        let browser = Browser::new(options).map_err(browser_err)?;
        Ok(Self { browser })
    }

    /// Search for `city` and expand the result list completely. Returns the
    /// final page source.
    pub fn search(&self, city: &str) -> Result<String> {
        let tab = self.browser.new_tab().map_err(browser_err)?;
        tab.navigate_to(PORTAL_URL).map_err(browser_err)?;
        tab.wait_until_navigated().map_err(browser_err)?;

        tab.wait_for_xpath(SEARCH_INPUT)
            .map_err(browser_err)?
            .type_into(city)
            .map_err(browser_err)?;
        tab.wait_for_element(".btn-label")
            .map_err(browser_err)?
            .click()
            .map_err(browser_err)?;
        info!("Searching the portal for {}", city);

        let mut expansions = 0;
        while expansions < MAX_EXPANSIONS {
            match tab.wait_for_xpath_with_custom_timeout(MORE_RESULTS, Duration::from_secs(10)) {
                Ok(button) => {
                    button.click().map_err(browser_err)?;
                    expansions += 1;
                }
                Err(_) => break,
            }
        }
        debug!("Expanded the result list {} times", expansions);

        tab.get_content().map_err(browser_err)
    }
}

/// Run a full search on a blocking thread.
pub async fn search_city(city: &str) -> Result<String> {
    let city = city.to_lowercase();
    tokio::task::spawn_blocking(move || SparkasseBrowser::launch()?.search(&city))
        .await
        .map_err(browser_err)?
}

/// FIO ids linked from the result page, in page order, without duplicates
pub fn extract_fio_ids(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    FIO_LINK
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_fio_ids() {
        let html = r#"
            <div class="sip-estate-list">
              <a href="/FIO-10915855820">3-Zimmer-Wohnung</a>
              <a href="/FIO-10915855820#?detailPage=1">Details</a>
              <a href="/FIO-2201">Haus</a>
              <a href="/impressum">Impressum</a>
            </div>"#;
        assert_eq!(extract_fio_ids(html), vec!["FIO-10915855820", "FIO-2201"]);
        assert!(extract_fio_ids("<html></html>").is_empty());
    }
}
