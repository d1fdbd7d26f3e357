//! Shared HTTP fetcher

use anyhow::Context;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::HttpConfig;
use crate::error::{Result, ScrapeError};

/// Redirect target of wg-gesucht's anti-bot check
pub const CAPTCHA_URL: &str = "https://www.wg-gesucht.de/cuba.html";

pub const WG_GESUCHT_URL: &str = "https://www.wg-gesucht.de/";

/// One client for the whole run; cookies from a login carry over to every
/// later request.
pub struct Fetcher {
    client: Client,
    interstitial: String,
}

impl Fetcher {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            interstitial: CAPTCHA_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn with_interstitial(mut self, url: impl Into<String>) -> Self {
        self.interstitial = url.into();
        self
    }

    /// GET `url`, following redirects. Fails on the anti-bot interstitial
    /// and on any status other than 200.
    pub async fn get(&self, url: &str) -> Result<Response> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(|source| {
            warn!("{} probably offline", url);
            ScrapeError::Request {
                url: url.to_string(),
                source,
            }
        })?;
        self.check_response(url, response)
    }

    /// GET an HTML page and return its body
    pub async fn get_html(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("text/html") {
            return Err(ScrapeError::ContentType {
                url: url.to_string(),
                content_type,
            });
        }
        response.text().await.map_err(|source| ScrapeError::Request {
            url: url.to_string(),
            source,
        })
    }

    /// GET raw bytes, e.g. an image
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await.map_err(|source| ScrapeError::Request {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    /// GET with query parameters and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        debug!("GET {} {:?}", url, query);
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| ScrapeError::Request {
                url: url.to_string(),
                source,
            })?;
        let response = self.check_response(url, response)?;
        response.json().await.map_err(|source| ScrapeError::Request {
            url: url.to_string(),
            source,
        })
    }

    /// Log in to wg-gesucht; the session cookie stays in the client.
    pub async fn login_wg_gesucht(&self, email: &str, password: &str) -> Result<()> {
        let url = format!("{}ajax/api/Smp/api.php?action=login", WG_GESUCHT_URL);
        let payload = json!({
            "login_email_username": email,
            "login_password": password,
            "login_form_auto_login": "1",
            "display_language": "de",
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ScrapeError::Request {
                url: url.clone(),
                source,
            })?;
        let reply: Value = response.json().await.unwrap_or(Value::Null);

        if !is_truthy(&reply) {
            return Err(ScrapeError::Login(email.to_string()));
        }
        info!("Logged in to wg-gesucht as {}", email);
        Ok(())
    }

    fn check_response(&self, url: &str, response: Response) -> Result<Response> {
        if is_interstitial(response.url().as_str(), &self.interstitial) {
            return Err(ScrapeError::Captcha {
                url: url.to_string(),
            });
        }
        if response.status() != StatusCode::OK {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        Ok(response)
    }
}

fn is_interstitial(final_url: &str, interstitial: &str) -> bool {
    final_url.contains(interstitial)
}

/// JSON truthiness of the login reply
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn route(path: &str) -> (&'static str, &'static str, &'static str) {
        match path {
            "/page.html" => (
                "200 OK",
                "Content-Type: text/html; charset=utf-8\r\n",
                "<html><body><h1>Zimmer frei</h1></body></html>",
            ),
            "/data.json" => ("200 OK", "Content-Type: application/json\r\n", r#"{"ok":true}"#),
            "/protected.html" => ("302 Found", "Location: /cuba.html\r\n", ""),
            "/cuba.html" => ("200 OK", "Content-Type: text/html\r\n", "<html><body>Captcha</body></html>"),
            _ => ("404 Not Found", "Content-Type: text/html\r\n", "<html><body>Nicht gefunden</body></html>"),
        }
    }

    /// Local HTTP/1.1 server answering from [`route`]; returns its base URL.
    async fn serve() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&request);
                    let path = request.split_whitespace().nth(1).unwrap_or("/");
                    let (status, headers, body) = route(path);
                    let response = format!(
                        "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        headers,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    fn fetcher(base: &str) -> Fetcher {
        Fetcher::new(&HttpConfig::default())
            .unwrap()
            .with_interstitial(format!("{}/cuba.html", base))
    }

    #[tokio::test]
    async fn test_get_html() {
        let base = serve().await;
        let body = fetcher(&base).get_html(&format!("{}/page.html", base)).await.unwrap();
        assert!(body.contains("Zimmer frei"));
    }

    #[tokio::test]
    async fn test_json_is_not_html() {
        let base = serve().await;
        let fetcher = fetcher(&base);
        let url = format!("{}/data.json", base);

        match fetcher.get_html(&url).await {
            Err(ScrapeError::ContentType { content_type, .. }) => assert_eq!(content_type, "application/json"),
            other => panic!("expected a content type error, got {:?}", other),
        }
        let value: Value = fetcher.get_json(&url, &[]).await.unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_missing_page_is_a_status_error() {
        let base = serve().await;
        let fetcher = fetcher(&base);

        match fetcher.get_html(&format!("{}/gone.html", base)).await {
            Err(ScrapeError::Status { status, .. }) => assert_eq!(status, StatusCode::NOT_FOUND),
            other => panic!("expected a status error, got {:?}", other),
        }
        assert!(matches!(
            fetcher.get_bytes(&format!("{}/gone.jpg", base)).await,
            Err(ScrapeError::Status { .. })
        ));
    }

    #[tokio::test]
    async fn test_redirect_to_interstitial_is_a_captcha() {
        let base = serve().await;
        let url = format!("{}/protected.html", base);

        let err = fetcher(&base).get_html(&url).await.unwrap_err();
        assert!(err.is_captcha());
        assert!(matches!(err, ScrapeError::Captcha { url: ref u } if *u == url));
    }

    #[test]
    fn test_interstitial_detection() {
        assert!(is_interstitial("https://www.wg-gesucht.de/cuba.html", CAPTCHA_URL));
        assert!(is_interstitial("https://www.wg-gesucht.de/cuba.html?ref=wg-zimmer", CAPTCHA_URL));
        assert!(!is_interstitial(
            "https://www.wg-gesucht.de/wg-zimmer-in-Augsburg.2.0.1.0.html",
            CAPTCHA_URL
        ));
    }

    #[test]
    fn test_login_reply_truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!({})));
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!({"user_id": 42})));
    }

    #[test]
    fn test_client_builds_from_defaults() {
        assert!(Fetcher::new(&HttpConfig::default()).is_ok());
    }
}
