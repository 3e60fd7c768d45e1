//! Daily channel: "on this day" selection with history-aware fallback.
//!
//! Selection prefers assets whose creation month-day matches today. When
//! today has none, the resolver walks backward one day at a time (up to
//! [`FALLBACK_SEARCH_DAYS`]) and takes the first day with at least one
//! asset this device has not seen within [`REPEAT_WINDOW_DAYS`]. If the
//! whole walk comes up empty the constant fallback image is served and
//! nothing is logged.

use ab_glyph::FontVec;
use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::Asset;
use crate::normalize;
use crate::overlay;
use crate::store::Store;

/// Days an asset stays ineligible for a device after being shown to it.
pub const REPEAT_WINDOW_DAYS: i64 = 10;

/// How many days back the fallback walk looks.
pub const FALLBACK_SEARCH_DAYS: i64 = 30;

/// Eligible candidates collected per fallback day before short-circuiting.
pub const FALLBACK_CANDIDATE_LIMIT: usize = 5;

/// Outcome of the selection step.
#[derive(Debug, Clone)]
pub struct DailySelection {
    /// Candidate assets; the render step picks one uniformly at random.
    pub assets: Vec<Asset>,
    /// Whether the fallback walk (rather than today's date) produced them.
    pub fallback_used: bool,
}

/// Select the candidate set for `today`.
///
/// Never errors on an empty asset table: an empty candidate set with
/// `fallback_used == false` means "serve the constant fallback".
pub async fn select_for_date(
    store: &dyn Store,
    device_uuid: &str,
    today: NaiveDate,
) -> Result<DailySelection> {
    let today_md = today.format("%m-%d").to_string();
    let todays = store.assets_by_month_day(&today_md).await?;
    debug!("daily: {} assets for {today_md}", todays.len());

    if !todays.is_empty() {
        return Ok(DailySelection {
            assets: todays,
            fallback_used: false,
        });
    }

    let threshold = today - Duration::days(REPEAT_WINDOW_DAYS);
    for days_back in 1..=FALLBACK_SEARCH_DAYS {
        let date = today - Duration::days(days_back);
        let md = date.format("%m-%d").to_string();

        let mut eligible = Vec::new();
        for asset in store.assets_by_month_day(&md).await? {
            if !store
                .displayed_since(&asset.uuid, device_uuid, threshold)
                .await?
            {
                eligible.push(asset);
            }
            if eligible.len() >= FALLBACK_CANDIDATE_LIMIT {
                break;
            }
        }

        if !eligible.is_empty() {
            debug!("daily: fallback to {md} with {} candidates", eligible.len());
            eligible.shuffle(&mut rand::thread_rng());
            return Ok(DailySelection {
                assets: eligible,
                fallback_used: true,
            });
        }
    }

    Ok(DailySelection {
        assets: Vec::new(),
        fallback_used: false,
    })
}

/// Render the daily image for a device: pick, fetch, adapt, overlay the
/// date, log the display, and encode as BMP.
#[allow(clippy::too_many_arguments)]
pub async fn render(
    store: &dyn Store,
    http: &reqwest::Client,
    fallback_url: &str,
    font: Option<&FontVec>,
    device_uuid: &str,
    width: u32,
    height: u32,
    today: NaiveDate,
) -> Result<Vec<u8>> {
    let selection = select_for_date(store, device_uuid, today).await?;

    let chosen = selection.assets.choose(&mut rand::thread_rng());
    let (url, shown_date, asset_uuid) = match chosen {
        Some(asset) => (
            asset
                .serve_url()
                .unwrap_or(fallback_url)
                .to_string(),
            asset.creation_date,
            Some(asset.uuid.clone()),
        ),
        None => (fallback_url.to_string(), today, None),
    };

    let adapted = normalize::fetch_and_adapt(http, &url, fallback_url, width, height).await?;
    let mut img = adapted.image;

    match font {
        Some(font) => overlay::draw_date_overlay(
            &mut img,
            font,
            shown_date,
            today,
            selection.fallback_used,
        ),
        None => warn!("daily: no font loaded, skipping date overlay"),
    }

    // Only a frame the device actually saw enters the repeat-avoidance
    // history: neither the constant fallback nor an asset whose fetch
    // failed and was substituted burns eligibility.
    if let Some(uuid) = asset_uuid {
        if adapted.fallback_substituted {
            warn!("daily: asset {uuid} could not be fetched, not logging display");
        } else {
            store.log_display(&uuid, device_uuid, today).await?;
        }
    }

    normalize::encode_bmp(&img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn asset(uuid: &str, date: NaiveDate) -> Asset {
        Asset {
            uuid: uuid.to_string(),
            image_url: None,
            proxy_url: Some(format!("http://img/{uuid}.bmp")),
            creation_date: date,
        }
    }

    #[tokio::test]
    async fn test_todays_assets_win_without_fallback_flag() {
        let store = MemoryStore::new();
        store.add_asset(asset("a", d(2019, 3, 10)));
        store.add_asset(asset("b", d(2021, 3, 10)));
        store.add_asset(asset("other-day", d(2021, 3, 9)));

        let sel = select_for_date(&store, "dev", d(2025, 3, 10)).await.unwrap();
        assert!(!sel.fallback_used);
        assert_eq!(sel.assets.len(), 2);
        assert!(sel.assets.iter().all(|a| a.uuid != "other-day"));
    }

    #[tokio::test]
    async fn test_fallback_walk_finds_nearest_earlier_day() {
        let store = MemoryStore::new();
        store.add_asset(asset("near", d(2020, 3, 8)));
        store.add_asset(asset("far", d(2020, 2, 20)));

        let sel = select_for_date(&store, "dev", d(2025, 3, 10)).await.unwrap();
        assert!(sel.fallback_used);
        assert_eq!(sel.assets.len(), 1);
        assert_eq!(sel.assets[0].uuid, "near");
    }

    #[tokio::test]
    async fn test_recently_shown_assets_are_excluded_per_device() {
        let store = MemoryStore::new();
        let today = d(2025, 3, 10);
        store.add_asset(asset("seen", d(2020, 3, 8)));
        store.add_asset(asset("fresh", d(2020, 3, 8)));
        // Shown to this device 3 days ago: inside the 10-day window.
        store
            .log_display("seen", "dev", today - Duration::days(3))
            .await
            .unwrap();

        let sel = select_for_date(&store, "dev", today).await.unwrap();
        assert!(sel.fallback_used);
        assert_eq!(sel.assets.len(), 1);
        assert_eq!(sel.assets[0].uuid, "fresh");

        // A different device still sees both.
        let sel = select_for_date(&store, "other", today).await.unwrap();
        assert_eq!(sel.assets.len(), 2);
    }

    #[tokio::test]
    async fn test_window_expiry_restores_eligibility() {
        let store = MemoryStore::new();
        let today = d(2025, 3, 10);
        store.add_asset(asset("old-view", d(2020, 3, 8)));
        // Shown 11 days ago: outside the 10-day window.
        store
            .log_display("old-view", "dev", today - Duration::days(11))
            .await
            .unwrap();

        let sel = select_for_date(&store, "dev", today).await.unwrap();
        assert_eq!(sel.assets.len(), 1);
    }

    #[tokio::test]
    async fn test_per_day_candidate_short_circuit() {
        let store = MemoryStore::new();
        let day = d(2020, 3, 9);
        for i in 0..8 {
            store.add_asset(asset(&format!("a{i}"), day));
        }

        let sel = select_for_date(&store, "dev", d(2025, 3, 10)).await.unwrap();
        assert!(sel.fallback_used);
        assert_eq!(sel.assets.len(), FALLBACK_CANDIDATE_LIMIT);
    }

    #[tokio::test]
    async fn test_empty_table_yields_empty_selection_not_error() {
        let store = MemoryStore::new();
        let sel = select_for_date(&store, "dev", d(2025, 3, 10)).await.unwrap();
        assert!(sel.assets.is_empty());
        assert!(!sel.fallback_used);
    }

    #[tokio::test]
    async fn test_walk_stops_at_horizon() {
        let store = MemoryStore::new();
        // 31 days back: just outside the 30-day horizon.
        store.add_asset(asset("too-far", d(2020, 2, 7)));
        let sel = select_for_date(&store, "dev", d(2025, 3, 10)).await.unwrap();
        assert!(sel.assets.is_empty());
    }

    /// Loopback server with one valid BMP at `/img.bmp` and `/fallback.bmp`;
    /// anything else 404s.
    async fn serve_bmp() -> String {
        use axum::http::header;
        use axum::routing::get;
        use axum::Router;

        let bmp = normalize::encode_bmp(&image::RgbImage::from_pixel(
            8,
            6,
            image::Rgb([80, 80, 80]),
        ))
        .unwrap();
        let handler = move || {
            let bmp = bmp.clone();
            async move { ([(header::CONTENT_TYPE, "image/bmp")], bmp) }
        };
        let app = Router::new()
            .route("/img.bmp", get(handler.clone()))
            .route("/fallback.bmp", get(handler));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_render_logs_display_for_real_asset() {
        let base = serve_bmp().await;
        let store = MemoryStore::new();
        store.add_asset(Asset {
            uuid: "real".to_string(),
            image_url: None,
            proxy_url: Some(format!("{base}/img.bmp")),
            creation_date: d(2020, 3, 10),
        });

        let http = reqwest::Client::new();
        let bmp = render(
            &store,
            &http,
            &format!("{base}/fallback.bmp"),
            None,
            "dev",
            600,
            448,
            d(2025, 3, 10),
        )
        .await
        .unwrap();

        assert_eq!(normalize::decode_rgb(&bmp).unwrap().dimensions(), (600, 448));
        assert_eq!(store.display_log_len(), 1);
    }

    #[tokio::test]
    async fn test_render_constant_fallback_is_not_logged() {
        let base = serve_bmp().await;
        let store = MemoryStore::new();

        let http = reqwest::Client::new();
        let bmp = render(
            &store,
            &http,
            &format!("{base}/fallback.bmp"),
            None,
            "dev",
            600,
            448,
            d(2025, 3, 10),
        )
        .await
        .unwrap();

        assert_eq!(normalize::decode_rgb(&bmp).unwrap().dimensions(), (600, 448));
        assert_eq!(store.display_log_len(), 0);
    }

    #[tokio::test]
    async fn test_render_substituted_fallback_keeps_asset_eligible() {
        let base = serve_bmp().await;
        let store = MemoryStore::new();
        // The asset's URL 404s; the pipeline substitutes the fallback.
        store.add_asset(Asset {
            uuid: "gone".to_string(),
            image_url: None,
            proxy_url: Some(format!("{base}/missing.bmp")),
            creation_date: d(2020, 3, 10),
        });

        let http = reqwest::Client::new();
        let bmp = render(
            &store,
            &http,
            &format!("{base}/fallback.bmp"),
            None,
            "dev",
            600,
            448,
            d(2025, 3, 10),
        )
        .await
        .unwrap();

        assert_eq!(normalize::decode_rgb(&bmp).unwrap().dimensions(), (600, 448));
        // The device never saw the asset, so it stays eligible.
        assert_eq!(store.display_log_len(), 0);
    }
}
