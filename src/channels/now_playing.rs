//! Now-playing channel: snapshot of a third-party "now playing" widget.
//!
//! The upstream rendering strategy is volatile and deliberately outside
//! the stable contract; this module fetches whatever snapshot URL is
//! configured (typically a screenshot-service render of the widget) and
//! composes it onto the panel. Any failure at any stage falls back to the
//! constant image through the shared pipeline.

use std::time::Duration;

use image::{Rgb, RgbImage};
use tracing::warn;

use crate::error::Result;
use crate::normalize;

/// Pixels trimmed off the snapshot's bottom edge (widget chrome).
const BOTTOM_TRIM: u32 = 5;

/// Center the snapshot on a black canvas of the target size, cropping
/// whatever overflows. Unlike photo channels this one letterboxes on
/// black: the widget is dark-themed and edge-mean fill would smear it.
pub fn compose_snapshot(img: &RgbImage, target_w: u32, target_h: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let h = if h > BOTTOM_TRIM { h - BOTTOM_TRIM } else { h };

    let copy_w = w.min(target_w);
    let copy_h = h.min(target_h);
    // Source offset when cropping, destination offset when padding.
    let src_x = (w - copy_w) / 2;
    let src_y = (h - copy_h) / 2;
    let dst_x = (target_w - copy_w) / 2;
    let dst_y = (target_h - copy_h) / 2;

    let mut out = RgbImage::from_pixel(target_w, target_h, Rgb([0, 0, 0]));
    for y in 0..copy_h {
        for x in 0..copy_w {
            out.put_pixel(dst_x + x, dst_y + y, *img.get_pixel(src_x + x, src_y + y));
        }
    }
    out
}

/// Fetch the configured snapshot and compose it; fall back to the constant
/// image on any failure (unset URL, fetch error, decode error).
pub async fn render(
    http: &reqwest::Client,
    snapshot_url: Option<&str>,
    fallback_url: &str,
    width: u32,
    height: u32,
    scrape_timeout: Duration,
) -> Result<Vec<u8>> {
    if let Some(url) = snapshot_url {
        let snapshot = async {
            let bytes =
                normalize::fetch_bytes_with_timeout(http, url, Some(scrape_timeout)).await?;
            normalize::decode_rgb(&bytes)
        }
        .await;

        match snapshot {
            Ok(img) => return normalize::encode_bmp(&compose_snapshot(&img, width, height)),
            Err(e) => warn!("now-playing snapshot failed, using fallback: {e}"),
        }
    } else {
        warn!("now-playing snapshot URL not configured, using fallback");
    }

    let adapted =
        normalize::fetch_and_adapt(http, fallback_url, fallback_url, width, height).await?;
    normalize::encode_bmp(&adapted.image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_pads_short_snapshot_vertically() {
        let img = RgbImage::from_pixel(600, 205, Rgb([90, 90, 90]));
        let out = compose_snapshot(&img, 600, 448);
        assert_eq!(out.dimensions(), (600, 448));
        // After the 5px trim the content is 200 tall, centered at y=124.
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(300, 224), Rgb([90, 90, 90]));
        assert_eq!(*out.get_pixel(300, 447), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_compose_crops_tall_snapshot() {
        let img = RgbImage::from_pixel(600, 905, Rgb([90, 90, 90]));
        let out = compose_snapshot(&img, 600, 448);
        assert_eq!(out.dimensions(), (600, 448));
        assert_eq!(*out.get_pixel(0, 0), Rgb([90, 90, 90]));
    }

    #[test]
    fn test_compose_handles_tiny_snapshot() {
        let img = RgbImage::from_pixel(3, 3, Rgb([90, 90, 90]));
        let out = compose_snapshot(&img, 600, 448);
        assert_eq!(out.dimensions(), (600, 448));
    }
}
