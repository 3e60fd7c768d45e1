//! Domain and wire types shared by the server and the device agent.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A display device, created on first contact and keyed by an opaque UUID
/// string (the agent derives it from the hardware MAC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Numeric row id
    pub id: i32,
    /// Opaque unique identifier
    pub device_uuid: String,
    /// Assigned channel, if any
    pub channel_id: Option<i32>,
    /// Wake interval handed to the device, in seconds
    pub next_wake_secs: i64,
    /// Panel width in pixels
    pub display_width: u32,
    /// Panel height in pixels
    pub display_height: u32,
    /// Last image URL assigned to this device, if any
    pub image_url: Option<String>,
}

/// A candidate image. Immutable once ingested; ingestion is out of scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Stable identifier
    pub uuid: String,
    /// Original source URL
    pub image_url: Option<String>,
    /// Proxy-resized URL, preferred for serving
    pub proxy_url: Option<String>,
    /// Calendar creation date, used for "on this day" matching
    pub creation_date: NaiveDate,
}

impl Asset {
    /// URL to serve for this asset: the proxy-resized variant when
    /// available, otherwise the original.
    pub fn serve_url(&self) -> Option<&str> {
        self.proxy_url.as_deref().or(self.image_url.as_deref())
    }
}

/// Body of `POST /api/devices/{device_uuid}/display`.
///
/// Best-effort telemetry from a constrained embedded client; every field
/// is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayRequest {
    /// Firmware version currently running on the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_fw_ver: Option<String>,

    /// Battery voltage in volts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f32>,

    /// WiFi signal strength in dBm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_signal: Option<i32>,

    /// Whether the device wants wall-clock time for its RTC
    #[serde(default)]
    pub request_time_sync: bool,
}

/// Response of the display endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayResponse {
    /// Either the literal sentinel [`crate::NO_REFRESH`] or a fully
    /// qualified conversion-endpoint URL
    pub image_url: String,

    /// Seconds until the device should wake again
    pub next_wake_secs: i64,

    /// Wall-clock time for RTC synchronization, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeInfo>,
}

impl DisplayResponse {
    /// Whether this response tells the device to skip the refresh.
    pub fn is_no_refresh(&self) -> bool {
        self.image_url == crate::NO_REFRESH
    }
}

/// Wall-clock time decomposed for a device RTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInfo {
    /// Two-digit year
    pub year: u32,
    /// Month 1-12
    pub month: u32,
    /// Day of month 1-31
    pub day: u32,
    /// ISO weekday, Monday=1 .. Sunday=7
    pub weekday: u32,
    /// Hour 0-23
    pub hour: u32,
    /// Minute 0-59
    pub minute: u32,
    /// Second 0-59
    pub second: u32,
}
