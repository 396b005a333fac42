use crate::query::Service;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_NOTE_BASE_URL: &str = "https://note.com";
pub const DEFAULT_GOOGLE_BASE_URL: &str = "https://www.google.com";
pub const DEFAULT_NOTE_SEARCH_URL: &str = "https://note.com/search?q={query}&context=note";
pub const DEFAULT_GOOGLE_SEARCH_URL: &str = "https://www.google.com/search?q={query}&num={size}";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

pub const USER_AGENT: &str = concat!("keyword-suggest/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name} {value:?}: {reason}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("{name} must contain a {{query}} placeholder")]
    MissingPlaceholder { name: &'static str },
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

/// Deployment configuration shared by every fetcher and the web layer.
/// Built once at startup; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct SuggestConfig {
    note_base_url: String,
    google_base_url: String,
    note_search_url: String,
    google_search_url: String,
    request_timeout: Duration,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            note_base_url: DEFAULT_NOTE_BASE_URL.to_string(),
            google_base_url: DEFAULT_GOOGLE_BASE_URL.to_string(),
            note_search_url: DEFAULT_NOTE_SEARCH_URL.to_string(),
            google_search_url: DEFAULT_GOOGLE_SEARCH_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl SuggestConfig {
    pub fn builder() -> SuggestConfigBuilder {
        SuggestConfigBuilder::default()
    }

    pub fn note_base_url(&self) -> &str {
        &self.note_base_url
    }

    pub fn google_base_url(&self) -> &str {
        &self.google_base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Public search page for a pivot into a full search.
    pub fn search_page_url(&self, service: Service, query: &str, size: u32) -> String {
        let template = match service {
            Service::Note => &self.note_search_url,
            Service::Google => &self.google_search_url,
        };
        template
            .replace("{query}", &crate::query::encode_component(query))
            .replace("{size}", &size.to_string())
    }

    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.request_timeout)
            .build()
    }
}

#[derive(Debug, Default)]
pub struct SuggestConfigBuilder {
    note_base_url: Option<String>,
    google_base_url: Option<String>,
    note_search_url: Option<String>,
    google_search_url: Option<String>,
    timeout_ms: Option<u64>,
}

impl SuggestConfigBuilder {
    pub fn note_base_url(mut self, value: impl Into<String>) -> Self {
        self.note_base_url = Some(value.into());
        self
    }

    pub fn google_base_url(mut self, value: impl Into<String>) -> Self {
        self.google_base_url = Some(value.into());
        self
    }

    pub fn note_search_url(mut self, value: impl Into<String>) -> Self {
        self.note_search_url = Some(value.into());
        self
    }

    pub fn google_search_url(mut self, value: impl Into<String>) -> Self {
        self.google_search_url = Some(value.into());
        self
    }

    pub fn timeout_ms(mut self, value: u64) -> Self {
        self.timeout_ms = Some(value);
        self
    }

    pub fn build(self) -> Result<SuggestConfig, ConfigError> {
        let defaults = SuggestConfig::default();
        let timeout_ms = self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(SuggestConfig {
            note_base_url: base_url(
                "note base URL",
                self.note_base_url.unwrap_or(defaults.note_base_url),
            )?,
            google_base_url: base_url(
                "google base URL",
                self.google_base_url.unwrap_or(defaults.google_base_url),
            )?,
            note_search_url: search_template(
                "note search URL",
                self.note_search_url.unwrap_or(defaults.note_search_url),
            )?,
            google_search_url: search_template(
                "google search URL",
                self.google_search_url.unwrap_or(defaults.google_search_url),
            )?,
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn base_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    check_http_url(name, trimmed)?;
    Ok(trimmed.to_string())
}

fn search_template(name: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if !trimmed.contains("{query}") {
        return Err(ConfigError::MissingPlaceholder { name });
    }
    // Placeholders are not valid URL syntax everywhere; validate a filled-in copy.
    let sample = trimmed.replace("{query}", "q").replace("{size}", "1");
    check_http_url(name, &sample)?;
    Ok(trimmed.to_string())
}

fn check_http_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}
