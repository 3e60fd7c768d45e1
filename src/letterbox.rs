//! Letterbox compositor.
//!
//! Pads an already-fitted image out to an exact target rectangle. Each
//! margin is filled with the arithmetic mean color of the pixels along the
//! corresponding edge of the *source* image, not the mean of the whole
//! frame; on an e-paper panel this makes the padding read as a
//! continuation of the picture instead of a gray border.

use image::{Rgb, RgbImage};

/// Which edge of the image to average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

/// Mean color of one edge, per channel, truncated toward zero.
fn edge_mean(img: &RgbImage, edge: Edge) -> Rgb<u8> {
    let (w, h) = img.dimensions();
    let mut sums = [0u64; 3];
    let mut count = 0u64;

    let mut add = |px: &Rgb<u8>| {
        sums[0] += px.0[0] as u64;
        sums[1] += px.0[1] as u64;
        sums[2] += px.0[2] as u64;
        count += 1;
    };

    match edge {
        Edge::Left => (0..h).for_each(|y| add(img.get_pixel(0, y))),
        Edge::Right => (0..h).for_each(|y| add(img.get_pixel(w - 1, y))),
        Edge::Top => (0..w).for_each(|x| add(img.get_pixel(x, 0))),
        Edge::Bottom => (0..w).for_each(|x| add(img.get_pixel(x, h - 1))),
    }

    Rgb([
        (sums[0] / count) as u8,
        (sums[1] / count) as u8,
        (sums[2] / count) as u8,
    ])
}

/// Pad `img` out to exactly `target_w x target_h`.
///
/// The caller must have already contain-resized the image, so
/// `img.width() <= target_w` and `img.height() <= target_h`. Horizontal
/// margins take the left/right edge colors at the image's height; the top
/// and bottom strips span the full target width, so the corners belong to
/// the top/bottom colors. A zero-width margin contributes nothing.
pub fn letterbox(img: &RgbImage, target_w: u32, target_h: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    debug_assert!(w <= target_w && h <= target_h);

    if (w, h) == (target_w, target_h) {
        return img.clone();
    }

    let left = (target_w - w) / 2;
    let top = (target_h - h) / 2;

    let left_color = edge_mean(img, Edge::Left);
    let right_color = edge_mean(img, Edge::Right);
    let top_color = edge_mean(img, Edge::Top);
    let bottom_color = edge_mean(img, Edge::Bottom);

    RgbImage::from_fn(target_w, target_h, |x, y| {
        if y < top {
            top_color
        } else if y >= top + h {
            bottom_color
        } else if x < left {
            left_color
        } else if x >= left + w {
            right_color
        } else {
            *img.get_pixel(x - left, y - top)
        }
    })
}
