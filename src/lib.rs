//! # fridge-thing
//!
//! Backend and device agent for a low-power e-paper picture frame that
//! lives on a fridge.
//!
//! The server decides which image a device should show next and at what
//! resolution; the agent polls it, downloads the resolved image, renders
//! it, and sleeps until the next scheduled wake. The interesting parts are
//! the image-selection and adaptive-rendering pipeline and the agent's
//! retry/power state machine; everything else is wiring.
//!
//! ## Server endpoints
//!
//! | Endpoint | Method | Purpose |
//! |----------|--------|---------|
//! | `/api/devices/{device_uuid}/display` | POST | Next image URL + wake interval (+ optional RTC time) |
//! | `/api/convert` | GET | Fetch-and-adapt an arbitrary image URL to a resolution |
//! | `/api/daily_convert` | GET | "On this day" channel render |
//! | `/api/random_convert` | GET | Random-asset channel render |
//! | `/api/nts_now_playing` | GET | Now-playing snapshot render |
//! | `/api/devices/{device_uuid}/refresh` | POST | Assign a fresh random asset to a device |
//!
//! Conversion endpoints return `image/bmp` bodies sized exactly to the
//! requested resolution: sources are rotated to landscape, contain-resized
//! (never upscaled), and letterboxed with per-edge mean colors.
//!
//! ## Device agent
//!
//! A strictly sequential state machine: connect, poll, download, render,
//! sleep. Failures back off exponentially per failure class and only error
//! states repaint the panel with status text, to conserve the e-paper's
//! limited refresh cycles.

pub mod agent;
pub mod channels;
pub mod config;
pub mod display;
mod error;
pub mod letterbox;
pub mod model;
pub mod normalize;
pub mod overlay;
pub mod server;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use model::{Asset, Device, DisplayRequest, DisplayResponse, TimeInfo};
pub use store::{MemoryStore, PgStore, Store};

/// Default display width in pixels for newly created devices
pub const DEFAULT_DISPLAY_WIDTH: u32 = 600;

/// Default display height in pixels for newly created devices
pub const DEFAULT_DISPLAY_HEIGHT: u32 = 448;

/// Default wake interval in seconds for newly created devices
pub const DEFAULT_NEXT_WAKE_SECS: i64 = 3600;

/// Sentinel `image_url` telling the device to skip this refresh entirely
pub const NO_REFRESH: &str = "NO_REFRESH";
