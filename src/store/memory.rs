//! In-memory store for tests and single-process demos.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::seq::SliceRandom;

use crate::error::Result;
use crate::model::{Asset, Device};
use crate::{DEFAULT_DISPLAY_HEIGHT, DEFAULT_DISPLAY_WIDTH, DEFAULT_NEXT_WAKE_SECS};

use super::Store;

#[derive(Debug, Default)]
struct Inner {
    devices: Vec<Device>,
    channels: HashMap<i32, String>,
    assets: Vec<Asset>,
    display_log: Vec<DisplayLogEntry>,
    device_events: Vec<(i32, String, String)>,
    next_device_id: i32,
    next_channel_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DisplayLogEntry {
    asset_uuid: String,
    device_uuid: String,
    display_date: NaiveDate,
}

/// Mutex-guarded store backed by plain vectors. Not intended for
/// production use beyond demos.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel, returning its id.
    pub fn add_channel(&self, key: &str) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        inner.next_channel_id += 1;
        let id = inner.next_channel_id;
        inner.channels.insert(id, key.to_string());
        id
    }

    /// Pre-create a device with an optional channel assignment.
    pub fn add_device(&self, device_uuid: &str, channel_id: Option<i32>) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        inner.next_device_id += 1;
        let id = inner.next_device_id;
        inner.devices.push(Device {
            id,
            device_uuid: device_uuid.to_string(),
            channel_id,
            next_wake_secs: DEFAULT_NEXT_WAKE_SECS,
            display_width: DEFAULT_DISPLAY_WIDTH,
            display_height: DEFAULT_DISPLAY_HEIGHT,
            image_url: None,
        });
        id
    }

    pub fn add_asset(&self, asset: Asset) {
        self.inner.lock().unwrap().assets.push(asset);
    }

    /// Number of display-log rows, for test assertions.
    pub fn display_log_len(&self) -> usize {
        self.inner.lock().unwrap().display_log.len()
    }

    /// Event types logged for a device, for test assertions.
    pub fn events_for(&self, device_id: i32) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .device_events
            .iter()
            .filter(|(id, _, _)| *id == device_id)
            .map(|(_, ty, _)| ty.clone())
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_or_create_device(&self, device_uuid: &str) -> Result<Device> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(device) = inner.devices.iter().find(|d| d.device_uuid == device_uuid) {
            return Ok(device.clone());
        }
        inner.next_device_id += 1;
        let device = Device {
            id: inner.next_device_id,
            device_uuid: device_uuid.to_string(),
            channel_id: None,
            next_wake_secs: DEFAULT_NEXT_WAKE_SECS,
            display_width: DEFAULT_DISPLAY_WIDTH,
            display_height: DEFAULT_DISPLAY_HEIGHT,
            image_url: None,
        };
        inner.devices.push(device.clone());
        Ok(device)
    }

    async fn channel_key(&self, channel_id: i32) -> Result<Option<String>> {
        Ok(self.inner.lock().unwrap().channels.get(&channel_id).cloned())
    }

    async fn log_device_event(
        &self,
        device_id: i32,
        event_type: &str,
        message: &str,
    ) -> Result<()> {
        self.inner.lock().unwrap().device_events.push((
            device_id,
            event_type.to_string(),
            message.to_string(),
        ));
        Ok(())
    }

    async fn update_device_image(&self, device_id: i32, image_url: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(device) = inner.devices.iter_mut().find(|d| d.id == device_id) {
            device.image_url = Some(image_url.to_string());
        }
        Ok(())
    }

    async fn random_proxy_asset(&self) -> Result<Option<Asset>> {
        let inner = self.inner.lock().unwrap();
        let candidates: Vec<&Asset> = inner
            .assets
            .iter()
            .filter(|a| a.proxy_url.is_some())
            .collect();
        Ok(candidates.choose(&mut rand::thread_rng()).map(|a| (*a).clone()))
    }

    async fn assets_by_month_day(&self, month_day: &str) -> Result<Vec<Asset>> {
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<Asset> = inner
            .assets
            .iter()
            .filter(|a| a.proxy_url.is_some())
            .filter(|a| a.creation_date.format("%m-%d").to_string() == month_day)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
        Ok(matches)
    }

    async fn displayed_since(
        &self,
        asset_uuid: &str,
        device_uuid: &str,
        since: NaiveDate,
    ) -> Result<bool> {
        Ok(self.inner.lock().unwrap().display_log.iter().any(|e| {
            e.asset_uuid == asset_uuid
                && e.device_uuid == device_uuid
                && e.display_date >= since
        }))
    }

    async fn log_display(
        &self,
        asset_uuid: &str,
        device_uuid: &str,
        date: NaiveDate,
    ) -> Result<()> {
        self.inner.lock().unwrap().display_log.push(DisplayLogEntry {
            asset_uuid: asset_uuid.to_string(),
            device_uuid: device_uuid.to_string(),
            display_date: date,
        });
        Ok(())
    }
}
