//! Persistence seam.
//!
//! The rest of the system consumes storage through a small set of queries
//! on the [`Store`] trait. Two implementations ship here: a Postgres store
//! for deployment and an in-memory store for tests and demos.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{Asset, Device};

/// The queries this subsystem needs from the persistence layer.
///
/// Callers that require device identity do not swallow persistence
/// failures; everything else is best-effort at the call site.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch a device by UUID, creating it with defaults on first contact.
    async fn get_or_create_device(&self, device_uuid: &str) -> Result<Device>;

    /// Resolve a channel id to its key ("random", "daily", ...).
    async fn channel_key(&self, channel_id: i32) -> Result<Option<String>>;

    /// Append to the device audit trail ("wake", errors, ...).
    async fn log_device_event(&self, device_id: i32, event_type: &str, message: &str)
        -> Result<()>;

    /// Record the image URL last assigned to a device.
    async fn update_device_image(&self, device_id: i32, image_url: &str) -> Result<()>;

    /// One asset chosen uniformly at random among those with a proxy URL.
    async fn random_proxy_asset(&self) -> Result<Option<Asset>>;

    /// All proxy-bearing assets whose creation date matches `month_day`
    /// ("MM-DD"), newest first.
    async fn assets_by_month_day(&self, month_day: &str) -> Result<Vec<Asset>>;

    /// Whether `asset_uuid` was shown to `device_uuid` on or after `since`.
    /// Scoped per device: the same asset stays eligible for other devices.
    async fn displayed_since(
        &self,
        asset_uuid: &str,
        device_uuid: &str,
        since: NaiveDate,
    ) -> Result<bool>;

    /// Append-only record that an asset was shown to a device on a date.
    async fn log_display(&self, asset_uuid: &str, device_uuid: &str, date: NaiveDate)
        -> Result<()>;
}
