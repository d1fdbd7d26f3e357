use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("expected text/html from {url}, got '{content_type}'")]
    ContentType { url: String, content_type: String },

    #[error("anti-bot interstitial while fetching {url}")]
    Captcha { url: String },

    #[error("missing {what}")]
    MissingElement { what: String },

    #[error("unrecognized {kind} '{value}'")]
    UnknownVocabulary { kind: &'static str, value: String },

    #[error("unrecognized district '{0}'")]
    UnknownDistrict(String),

    #[error("unknown listing type code '{code}' for {site}")]
    UnknownListingType { site: &'static str, code: String },

    #[error("no city code known for '{0}'")]
    UnknownCity(String),

    #[error("could not parse {field} from '{value}'")]
    Parse { field: &'static str, value: String },

    #[error("invalid selector '{0}'")]
    Selector(&'static str),

    #[error("geocoder response invalid: {0}")]
    Geocode(String),

    #[error("login rejected for '{0}'")]
    Login(String),

    #[error("browser automation failed: {0}")]
    Browser(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScrapeError {
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingElement { what: what.into() }
    }

    pub fn parse(field: &'static str, value: impl Into<String>) -> Self {
        Self::Parse {
            field,
            value: value.into(),
        }
    }

    /// True for the anti-bot interstitial, which must end the process.
    pub fn is_captcha(&self) -> bool {
        matches!(self, Self::Captcha { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
