//! Server configuration.
//!
//! Loaded from YAML with environment overrides for deployment secrets.
//! The quiet-hours window and its timezone are configuration, not
//! constants - deployments in other regions just change the zone.
//!
//! # Example (YAML)
//!
//! ```yaml
//! listen_addr: "0.0.0.0:8000"
//! public_base_url: "https://frame.example.com"
//! timezone: "America/Chicago"
//! quiet_hours:
//!   start: "00:00"
//!   end: "08:00"
//! fallback_image_url: "https://example.com/fallback.bmp"
//! font_path: "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
//! ```

use std::path::Path;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default fallback image shown when nothing else can be resolved.
pub const DEFAULT_FALLBACK_IMAGE_URL: &str =
    "https://s3.us-west-1.amazonaws.com/bjork.love/21977917882_ffae88748b_o.bmp";

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Externally reachable base URL, used to build conversion URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Postgres connection URL; falls back to an in-memory store when unset
    #[serde(default)]
    pub database_url: Option<String>,

    /// IANA timezone driving quiet hours and RTC time sync
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Window during which devices are told not to refresh
    #[serde(default)]
    pub quiet_hours: QuietHoursConfig,

    /// Image substituted when a fetch or decode fails
    #[serde(default = "default_fallback_image_url")]
    pub fallback_image_url: String,

    /// TTF used for the daily channel's date overlay
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Snapshot URL for the now-playing channel (screenshot-service render
    /// of the widget); the channel falls back to the constant image when
    /// unset or unreachable
    #[serde(default)]
    pub now_playing_snapshot_url: Option<String>,

    /// Timeout for ordinary image fetches, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Timeout for the now-playing snapshot fetch, in seconds
    #[serde(default = "default_scrape_timeout_secs")]
    pub scrape_timeout_secs: u64,
}

/// Quiet-hours window, end-exclusive.
#[derive(Debug, Clone, Deserialize)]
pub struct QuietHoursConfig {
    /// Start time, "HH:MM"
    pub start: String,
    /// End time, "HH:MM"
    pub end: String,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            start: "00:00".to_string(),
            end: "08:00".to_string(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timezone() -> String {
    "America/Chicago".to_string()
}

fn default_fallback_image_url() -> String {
    DEFAULT_FALLBACK_IMAGE_URL.to_string()
}

fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_scrape_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("empty config must deserialize")
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("invalid config YAML: {e}")))
    }

    /// Apply environment overrides (`DATABASE_URL`, `LISTEN_ADDR`,
    /// `PUBLIC_BASE_URL`).
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Ok(base) = std::env::var("PUBLIC_BASE_URL") {
            self.public_base_url = base;
        }
        self
    }

    /// Parsed timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| Error::Config(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Parsed quiet-hours window.
    pub fn quiet_window(&self) -> Result<QuietWindow> {
        Ok(QuietWindow {
            start: parse_time(&self.quiet_hours.start)
                .ok_or_else(|| Error::Config(format!("bad time '{}'", self.quiet_hours.start)))?,
            end: parse_time(&self.quiet_hours.end)
                .ok_or_else(|| Error::Config(format!("bad time '{}'", self.quiet_hours.end)))?,
        })
    }
}

/// Parsed quiet-hours window, end-exclusive. May cross midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietWindow {
    /// Inclusive start
    pub start: NaiveTime,
    /// Exclusive end
    pub end: NaiveTime,
}

/// Parse a time string (HH:MM) into NaiveTime.
fn parse_time(s: &str) -> Option<NaiveTime> {
    let (hour, minute) = s.split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}
