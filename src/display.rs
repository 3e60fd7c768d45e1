//! Display-request orchestration.
//!
//! The per-request entry point behind `POST /api/devices/{uuid}/display`:
//! resolves device identity, applies quiet-hours suppression, dispatches
//! to the assigned channel's conversion endpoint, and optionally attaches
//! wall-clock time for the device RTC. HTTP framing lives in
//! [`crate::server`]; everything here is testable against a fixed clock.

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::channels::ChannelKind;
use crate::config::{Config, QuietWindow};
use crate::error::Result;
use crate::model::{DisplayRequest, DisplayResponse, TimeInfo};
use crate::store::Store;
use crate::NO_REFRESH;

/// Seconds remaining until the quiet window ends, or `None` when the
/// given local time is outside the window. The window is end-exclusive
/// and may cross midnight; a remaining time of zero or less rolls to the
/// next day (only reachable under clock drift).
pub fn quiet_remaining(now: NaiveTime, window: &QuietWindow) -> Option<i64> {
    let within = if window.start <= window.end {
        now >= window.start && now < window.end
    } else {
        now >= window.start || now < window.end
    };
    if !within {
        return None;
    }

    let mut secs = (window.end - now).num_seconds();
    if secs <= 0 {
        secs += 24 * 3600;
    }
    Some(secs)
}

/// Wall-clock time decomposed for the device RTC.
pub fn time_info<T: TimeZone>(now: DateTime<T>) -> TimeInfo {
    TimeInfo {
        year: (now.year() % 100) as u32,
        month: now.month(),
        day: now.day(),
        weekday: now.weekday().number_from_monday(),
        hour: now.hour(),
        minute: now.minute(),
        second: now.second(),
    }
}

/// Build the absolute conversion URL a device should fetch next.
///
/// Channel endpoints receive the device identity and resolution; the
/// generic endpoint receives the fallback image URL instead.
pub fn conversion_url(
    public_base_url: &str,
    kind: Option<ChannelKind>,
    fallback_url: &str,
    device_uuid: &str,
    width: u32,
    height: u32,
) -> String {
    let base = public_base_url.trim_end_matches('/');
    let mut query = form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("width", &width.to_string())
        .append_pair("height", &height.to_string());

    match kind {
        Some(kind) => {
            query.append_pair("device_uuid", device_uuid);
            format!("{base}{}?{}", kind.convert_path(), query.finish())
        }
        None => {
            query.append_pair("url", fallback_url);
            format!("{base}/api/convert?{}", query.finish())
        }
    }
}

/// Handle a display request at a fixed instant. [`handle_display_request`]
/// is the wall-clock wrapper.
pub async fn handle_display_request_at(
    store: &dyn Store,
    config: &Config,
    device_uuid: &str,
    request: &DisplayRequest,
    now_utc: DateTime<Utc>,
) -> Result<DisplayResponse> {
    let tz: Tz = config.tz()?;
    let window = config.quiet_window()?;
    let now = now_utc.with_timezone(&tz);

    // Device identity is required for everything downstream; persistence
    // failures propagate.
    let device = store.get_or_create_device(device_uuid).await?;

    // Audit trail: one wake event per contact.
    store
        .log_device_event(
            device.id,
            "wake",
            &format!("current_fw_ver={:?}", request.current_fw_ver),
        )
        .await?;

    let time = request.request_time_sync.then(|| time_info(now));

    if let Some(secs) = quiet_remaining(now.time(), &window) {
        debug!("device {device_uuid}: quiet hours, {secs}s until window end");
        return Ok(DisplayResponse {
            image_url: NO_REFRESH.to_string(),
            next_wake_secs: secs,
            time,
        });
    }

    let kind = match device.channel_id {
        Some(id) => store
            .channel_key(id)
            .await?
            .as_deref()
            .and_then(ChannelKind::from_key),
        None => None,
    };

    let image_url = conversion_url(
        &config.public_base_url,
        kind,
        &config.fallback_image_url,
        device_uuid,
        device.display_width,
        device.display_height,
    );
    debug!("device {device_uuid}: directing to {image_url}");
    store.update_device_image(device.id, &image_url).await?;

    Ok(DisplayResponse {
        image_url,
        next_wake_secs: device.next_wake_secs,
        time,
    })
}

/// Handle a display request against the current wall clock.
pub async fn handle_display_request(
    store: &dyn Store,
    config: &Config,
    device_uuid: &str,
    request: &DisplayRequest,
) -> Result<DisplayResponse> {
    handle_display_request_at(store, config, device_uuid, request, Utc::now()).await
}

/// Today's calendar date in the configured timezone.
pub fn local_today(config: &Config) -> Result<chrono::NaiveDate> {
    let tz: Tz = config.tz()?;
    Ok(Utc::now().with_timezone(&tz).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn utc_config() -> Config {
        Config::from_yaml("timezone: \"UTC\"").unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_quiet_remaining_exact_seconds() {
        let window = utc_config().quiet_window().unwrap();
        // 03:00 -> five hours until 08:00.
        assert_eq!(
            quiet_remaining(NaiveTime::from_hms_opt(3, 0, 0).unwrap(), &window),
            Some(5 * 3600)
        );
        assert_eq!(
            quiet_remaining(NaiveTime::from_hms_opt(7, 59, 59).unwrap(), &window),
            Some(1)
        );
    }

    #[test]
    fn test_quiet_window_end_is_exclusive() {
        let window = utc_config().quiet_window().unwrap();
        assert_eq!(
            quiet_remaining(NaiveTime::from_hms_opt(8, 0, 0).unwrap(), &window),
            None
        );
        assert_eq!(
            quiet_remaining(NaiveTime::from_hms_opt(12, 0, 0).unwrap(), &window),
            None
        );
        // Start is inclusive.
        assert!(
            quiet_remaining(NaiveTime::from_hms_opt(0, 0, 0).unwrap(), &window).is_some()
        );
    }

    #[test]
    fn test_quiet_window_crossing_midnight() {
        let cfg = Config::from_yaml(
            "timezone: \"UTC\"\nquiet_hours:\n  start: \"22:00\"\n  end: \"06:00\"\n",
        )
        .unwrap();
        let window = cfg.quiet_window().unwrap();
        assert_eq!(
            quiet_remaining(NaiveTime::from_hms_opt(23, 0, 0).unwrap(), &window),
            Some(7 * 3600)
        );
        assert_eq!(
            quiet_remaining(NaiveTime::from_hms_opt(2, 0, 0).unwrap(), &window),
            Some(4 * 3600)
        );
        assert_eq!(
            quiet_remaining(NaiveTime::from_hms_opt(12, 0, 0).unwrap(), &window),
            None
        );
    }

    #[test]
    fn test_time_info_fields() {
        // Sunday 2025-06-15 14:30:45 UTC.
        let info = time_info(at(14, 30, 45));
        assert_eq!(info.year, 25);
        assert_eq!(info.month, 6);
        assert_eq!(info.day, 15);
        assert_eq!(info.weekday, 7); // ISO: Sunday = 7
        assert_eq!(info.hour, 14);
        assert_eq!(info.minute, 30);
        assert_eq!(info.second, 45);
    }

    #[test]
    fn test_conversion_url_shapes() {
        let url = conversion_url(
            "http://srv/",
            Some(ChannelKind::Daily),
            "http://fb.bmp",
            "ABC123",
            600,
            448,
        );
        assert_eq!(
            url,
            "http://srv/api/daily_convert?width=600&height=448&device_uuid=ABC123"
        );

        let url = conversion_url("http://srv", None, "http://fb.bmp", "ABC123", 800, 480);
        assert!(url.starts_with("http://srv/api/convert?width=800&height=480&url="));
        assert!(url.contains("http%3A%2F%2Ffb.bmp"));
    }

    #[tokio::test]
    async fn test_first_contact_creates_device_with_defaults() {
        let store = MemoryStore::new();
        let cfg = utc_config();

        let resp = handle_display_request_at(
            &store,
            &cfg,
            "NEW-DEVICE",
            &DisplayRequest::default(),
            at(12, 0, 0),
        )
        .await
        .unwrap();

        assert_eq!(resp.next_wake_secs, 3600);
        assert!(resp.image_url.contains("/api/convert?"));
        assert!(resp.image_url.contains("width=600"));
        assert!(resp.image_url.contains("height=448"));
        assert!(resp.time.is_none());

        // Device row exists now, and the wake was logged.
        let device = store.get_or_create_device("NEW-DEVICE").await.unwrap();
        assert_eq!(store.events_for(device.id), vec!["wake".to_string()]);
    }

    #[tokio::test]
    async fn test_quiet_hours_response() {
        let store = MemoryStore::new();
        let cfg = utc_config();

        let resp = handle_display_request_at(
            &store,
            &cfg,
            "DEV",
            &DisplayRequest::default(),
            at(3, 0, 0),
        )
        .await
        .unwrap();

        assert!(resp.is_no_refresh());
        assert_eq!(resp.next_wake_secs, 5 * 3600);
    }

    #[tokio::test]
    async fn test_channel_dispatch_uses_assigned_channel() {
        let store = MemoryStore::new();
        let channel = store.add_channel("daily");
        store.add_device("DAILY-DEV", Some(channel));
        let cfg = utc_config();

        let resp = handle_display_request_at(
            &store,
            &cfg,
            "DAILY-DEV",
            &DisplayRequest::default(),
            at(12, 0, 0),
        )
        .await
        .unwrap();

        assert!(resp.image_url.contains("/api/daily_convert?"));
        assert!(resp.image_url.contains("device_uuid=DAILY-DEV"));
    }

    #[tokio::test]
    async fn test_unknown_channel_falls_back_to_generic() {
        let store = MemoryStore::new();
        let channel = store.add_channel("weather");
        store.add_device("ODD-DEV", Some(channel));
        let cfg = utc_config();

        let resp = handle_display_request_at(
            &store,
            &cfg,
            "ODD-DEV",
            &DisplayRequest::default(),
            at(12, 0, 0),
        )
        .await
        .unwrap();

        assert!(resp.image_url.contains("/api/convert?"));
        assert!(resp.image_url.contains("url="));
    }

    #[tokio::test]
    async fn test_time_sync_attached_when_requested() {
        let store = MemoryStore::new();
        let cfg = utc_config();
        let req = DisplayRequest {
            request_time_sync: true,
            ..Default::default()
        };

        let resp = handle_display_request_at(&store, &cfg, "DEV", &req, at(9, 10, 11))
            .await
            .unwrap();
        let time = resp.time.unwrap();
        assert_eq!((time.hour, time.minute, time.second), (9, 10, 11));

        // Also attached on quiet-hours responses.
        let resp = handle_display_request_at(&store, &cfg, "DEV", &req, at(3, 0, 0))
            .await
            .unwrap();
        assert!(resp.is_no_refresh());
        assert!(resp.time.is_some());
    }
}
