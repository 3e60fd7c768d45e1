//! Date-text overlay for the daily channel.
//!
//! Renders "on this day" context onto the adapted image: the shown date
//! bottom-right in a large face (prefixed with `*` when the selection fell
//! back to an earlier day), and a "N years ago..." line top-left in a
//! smaller face. Ink flips to white on dark images.

use ab_glyph::{FontVec, PxScale};
use chrono::{Datelike, NaiveDate};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

const MARGIN: i32 = 10;
const DATE_PX: f32 = 36.0;
const YEARS_AGO_PX: f32 = 22.0;

/// Day-of-month with its English ordinal suffix: 1 -> "1st", 12 -> "12th",
/// 101 -> "101st".
pub fn ordinal_day(day: u32) -> String {
    let suffix = match day % 100 {
        11 | 12 | 13 => "th",
        _ => match day % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    };
    format!("{day}{suffix}")
}

/// "February 12th"
pub fn month_day_line(date: NaiveDate) -> String {
    format!("{} {}", date.format("%B"), ordinal_day(date.day()))
}

/// Top-left caption, computed against *today's* year. `None` when the
/// shown date is from the current year.
pub fn years_ago_line(shown: NaiveDate, today: NaiveDate) -> Option<String> {
    match today.year() - shown.year() {
        n if n <= 0 => None,
        1 => Some("Last year...".to_string()),
        n => Some(format!("{n} years ago...")),
    }
}

/// Mean grayscale brightness using the usual luma weights.
pub fn mean_brightness(img: &RgbImage) -> u8 {
    let mut sum = 0u64;
    for px in img.pixels() {
        let luma =
            0.299 * px.0[0] as f32 + 0.587 * px.0[1] as f32 + 0.114 * px.0[2] as f32;
        sum += luma as u64;
    }
    let count = (img.width() as u64 * img.height() as u64).max(1);
    (sum / count) as u8
}

/// White ink on dark images, black ink otherwise.
pub fn ink_for(img: &RgbImage) -> Rgb<u8> {
    if mean_brightness(img) < 128 {
        Rgb([255, 255, 255])
    } else {
        Rgb([0, 0, 0])
    }
}

/// Draw the date overlay in place.
///
/// `shown` is the creation date of the asset actually rendered (or today
/// when the constant fallback image is shown); `fallback_used` marks a
/// selection that walked back to an earlier day.
pub fn draw_date_overlay(
    img: &mut RgbImage,
    font: &FontVec,
    shown: NaiveDate,
    today: NaiveDate,
    fallback_used: bool,
) {
    let ink = ink_for(img);

    let mut date_text = month_day_line(shown);
    if fallback_used {
        date_text.insert(0, '*');
    }

    let date_scale = PxScale::from(DATE_PX);
    let (tw, th) = text_size(date_scale, font, &date_text);
    let x = (img.width() as i32 - tw as i32 - MARGIN).max(0);
    let y = (img.height() as i32 - th as i32 - MARGIN).max(0);
    draw_text_mut(img, ink, x, y, date_scale, font, &date_text);

    if let Some(caption) = years_ago_line(shown, today) {
        let caption_scale = PxScale::from(YEARS_AGO_PX);
        draw_text_mut(img, ink, MARGIN, MARGIN, caption_scale, font, &caption);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_ordinal_suffixes() {
        assert_eq!(ordinal_day(1), "1st");
        assert_eq!(ordinal_day(2), "2nd");
        assert_eq!(ordinal_day(3), "3rd");
        assert_eq!(ordinal_day(4), "4th");
        assert_eq!(ordinal_day(11), "11th");
        assert_eq!(ordinal_day(12), "12th");
        assert_eq!(ordinal_day(13), "13th");
        assert_eq!(ordinal_day(21), "21st");
        assert_eq!(ordinal_day(22), "22nd");
        assert_eq!(ordinal_day(23), "23rd");
        assert_eq!(ordinal_day(101), "101st");
        assert_eq!(ordinal_day(111), "111th");
    }

    #[test]
    fn test_date_lines() {
        assert_eq!(month_day_line(d(2019, 2, 12)), "February 12th");
        assert_eq!(month_day_line(d(2021, 7, 1)), "July 1st");
    }

    #[test]
    fn test_years_ago_uses_todays_year() {
        let today = d(2025, 3, 10);
        assert_eq!(years_ago_line(d(2025, 3, 8), today), None);
        assert_eq!(
            years_ago_line(d(2024, 12, 31), today),
            Some("Last year...".to_string())
        );
        assert_eq!(
            years_ago_line(d(2019, 3, 10), today),
            Some("6 years ago...".to_string())
        );
    }

    #[test]
    fn test_ink_flips_on_dark_images() {
        let dark = RgbImage::from_pixel(10, 10, Rgb([20, 20, 20]));
        let bright = RgbImage::from_pixel(10, 10, Rgb([240, 240, 240]));
        assert_eq!(ink_for(&dark), Rgb([255, 255, 255]));
        assert_eq!(ink_for(&bright), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_mean_brightness_midpoint() {
        let mid = RgbImage::from_pixel(4, 4, Rgb([128, 128, 128]));
        // 128 is not "below the midpoint": black ink.
        assert!(mean_brightness(&mid) >= 128);
        assert_eq!(ink_for(&mid), Rgb([0, 0, 0]));
    }
}
