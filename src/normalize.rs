//! Orientation/fit normalization and the shared conversion pipeline.
//!
//! Every channel endpoint funnels its bytes through the same steps:
//! decode, rotate portrait sources to landscape, contain-resize (never
//! upscale), letterbox to the exact target, re-encode as BMP. Fetch and
//! decode failures are recovered once by substituting the configured
//! fallback image; a failure of the fallback itself is fatal for the
//! request.

use std::io::Cursor;
use std::time::Duration;

use image::imageops::FilterType;
use image::{ImageFormat, RgbImage};
use tracing::warn;

use crate::error::{Error, Result};
use crate::letterbox::letterbox;

/// Decode raw bytes into an RGB raster.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes).map_err(|e| Error::Decode(e.to_string()))?;
    Ok(img.to_rgb8())
}

/// Largest size with both dimensions <= the target and the aspect ratio
/// preserved. Sources already inside the bounds are left alone - this
/// pipeline never upscales.
pub fn contain_dimensions(w: u32, h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    if w <= target_w && h <= target_h {
        return (w, h);
    }
    // Integer math: floor keeps the result inside the bounds.
    if (w as u64) * (target_h as u64) >= (h as u64) * (target_w as u64) {
        let nh = ((h as u64) * (target_w as u64) / (w as u64)) as u32;
        (target_w, nh.max(1))
    } else {
        let nw = ((w as u64) * (target_h as u64) / (h as u64)) as u32;
        (nw.max(1), target_h)
    }
}

/// Rotate-if-portrait, contain-resize, letterbox-if-needed.
pub fn normalize(img: RgbImage, target_w: u32, target_h: u32) -> RgbImage {
    // Portrait sources are rotated clockwise to landscape first.
    let img = if img.height() > img.width() {
        image::imageops::rotate90(&img)
    } else {
        img
    };

    let (w, h) = img.dimensions();
    let (nw, nh) = contain_dimensions(w, h, target_w, target_h);
    let img = if (nw, nh) != (w, h) {
        image::imageops::resize(&img, nw, nh, FilterType::Lanczos3)
    } else {
        img
    };

    if img.dimensions() != (target_w, target_h) {
        letterbox(&img, target_w, target_h)
    } else {
        img
    }
}

/// Encode an RGB raster as BMP bytes for the device.
pub fn encode_bmp(img: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Bmp)
        .map_err(|e| Error::Decode(e.to_string()))?;
    Ok(buf)
}

/// Fetch raw bytes, treating non-success statuses as fetch errors.
pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    fetch_bytes_with_timeout(client, url, None).await
}

/// Like [`fetch_bytes`] but with a per-request timeout override.
pub async fn fetch_bytes_with_timeout(
    client: &reqwest::Client,
    url: &str,
    timeout: Option<Duration>,
) -> Result<Vec<u8>> {
    let mut req = client.get(url);
    if let Some(t) = timeout {
        req = req.timeout(t);
    }
    let resp = req.send().await?;
    if !resp.status().is_success() {
        return Err(Error::Fetch {
            url: url.to_string(),
            reason: format!("status {}", resp.status()),
        });
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Result of [`fetch_and_adapt`].
#[derive(Debug)]
pub struct Adapted {
    /// Normalized raster at exactly the target resolution.
    pub image: RgbImage,
    /// Whether the constant fallback was substituted for a failed primary.
    /// Callers that track what a device actually saw need this.
    pub fallback_substituted: bool,
}

/// Fetch `url`, decode it, and normalize it to the target resolution,
/// substituting the fallback image at most once on a fetch or decode
/// failure. Errors on the fallback path propagate.
pub async fn fetch_and_adapt(
    client: &reqwest::Client,
    url: &str,
    fallback_url: &str,
    target_w: u32,
    target_h: u32,
) -> Result<Adapted> {
    let decoded = match fetch_bytes(client, url).await {
        Ok(bytes) => decode_rgb(&bytes),
        Err(e) => Err(e),
    };

    let (img, fallback_substituted) = match decoded {
        Ok(img) => (img, false),
        Err(e @ (Error::Fetch { .. } | Error::Decode(_))) if url != fallback_url => {
            warn!("falling back to {fallback_url}: {e}");
            let bytes = fetch_bytes(client, fallback_url).await?;
            (decode_rgb(&bytes)?, true)
        }
        Err(e) => return Err(e),
    };

    Ok(Adapted {
        image: normalize(img, target_w, target_h),
        fallback_substituted,
    })
}
