//! Configuration loading and management

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub wg_gesucht: WgGesuchtConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Directory holding one cursor file per site and listing type
    pub cursor_dir: PathBuf,
    pub delay_seconds: u64,
    pub jitter_seconds: u64,
    /// Resolve addresses while crawling instead of leaving them to `backfill`
    pub geocode: bool,
    /// Unknown districts abort the run instead of being stored as null
    pub strict_districts: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub limit: Option<u32>,
    pub delay_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WgGesuchtConfig {
    pub email: Option<String>,
    pub password: Option<String>,
}

fn default_max_connections() -> u32 {
    2
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            cursor_dir: PathBuf::from("state"),
            delay_seconds: 5,
            jitter_seconds: 3,
            geocode: false,
            strict_districts: true,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org/search".to_string(),
            limit: None,
            delay_seconds: 2,
        }
    }
}

impl CrawlConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_seconds)
    }
}

impl WgGesuchtConfig {
    /// Both halves of the login, or nothing.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) if !email.is_empty() => Some((email, password)),
            _ => None,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// `DATABASE_URL` in the environment wins over the file so credentials
    /// can stay out of it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml(&content)?;
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [database]
            url = "postgres://sepp@localhost/wohnungsmarkt_db"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.crawl.cursor_dir, PathBuf::from("state"));
        assert!(config.crawl.strict_districts);
        assert!(!config.crawl.geocode);
        assert_eq!(config.geocoder.limit, None);
        assert!(config.wg_gesucht.credentials().is_none());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [database]
            url = "postgres://localhost/db"
            max_connections = 1

            [crawl]
            cursor_dir = "/var/lib/wohnungsmarkt"
            delay_seconds = 10
            jitter_seconds = 0
            geocode = true
            strict_districts = false

            [geocoder]
            limit = 1

            [wg_gesucht]
            email = "someone@example.org"
            password = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.crawl.delay(), Duration::from_secs(10));
        assert_eq!(config.crawl.jitter(), Duration::ZERO);
        assert!(config.crawl.geocode);
        assert_eq!(config.geocoder.limit, Some(1));
        assert_eq!(config.geocoder.delay_seconds, 2);
        assert_eq!(
            config.wg_gesucht.credentials(),
            Some(("someone@example.org", "secret"))
        );
    }

    #[test]
    fn test_missing_database_section_is_an_error() {
        assert!(Config::from_toml("[crawl]\ndelay_seconds = 1\n").is_err());
    }
}
