// Sessiongate: Configuration
//
// Resolved from CLI flags with environment fallbacks. The site URL fixes the
// cookie scope; the data directory holds the encrypted record.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::Serialize;
use url::Url;

use crate::error::{Result, SessionGateError};

/// Name of the encrypted record file inside the data directory.
const DB_FILE: &str = "secure_prefs.db";

/// When the live session's cookies are captured into the record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapturePolicy {
    /// Only when the host reports a completed login.
    #[default]
    LoginSignal,
    /// On every completed page load of the protected site.
    AnyPageLoad,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub site_url: Option<Url>,
    pub token_endpoint: Option<Url>,
    pub data_dir: PathBuf,
    pub capture_policy: CapturePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_url: None,
            token_endpoint: None,
            data_dir: default_data_dir(),
            capture_policy: CapturePolicy::default(),
        }
    }
}

/// `<platform data dir>/sessiongate`, or `./sessiongate` where the platform
/// has none.
pub fn default_data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sessiongate")
}

/// Parse a site or endpoint URL. Only http(s) URLs with a host are accepted.
pub fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| SessionGateError::Config(format!("invalid URL '{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(SessionGateError::Config(format!(
            "'{}' is not an http(s) URL with a host",
            raw
        )));
    }
    Ok(url)
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    fn site(&self) -> Result<&Url> {
        self.site_url.as_ref().ok_or_else(|| {
            SessionGateError::Config(
                "no site URL configured (use --site-url or SESSIONGATE_SITE_URL)".to_string(),
            )
        })
    }

    /// Host the captured cookies are scoped to.
    pub fn cookie_domain(&self) -> Result<String> {
        let site = self.site()?;
        site.host_str()
            .map(|h| h.to_ascii_lowercase())
            .ok_or_else(|| SessionGateError::Config(format!("site URL '{}' has no host", site)))
    }

    /// `scheme://host[:port]/`, the page the protected view opens on.
    pub fn base_url(&self) -> Result<Url> {
        let mut base = self.site()?.clone();
        base.set_path("/");
        base.set_query(None);
        base.set_fragment(None);
        Ok(base)
    }

    pub fn token_endpoint(&self) -> Result<&Url> {
        self.token_endpoint.as_ref().ok_or_else(|| {
            SessionGateError::Config(
                "no token endpoint configured (use --endpoint or SESSIONGATE_TOKEN_ENDPOINT)"
                    .to_string(),
            )
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
