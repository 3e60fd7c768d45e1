//! PostgreSQL store.
//!
//! Connections are checked out of a deadpool per call and returned
//! promptly; one connection per in-flight request. The table layout lives
//! in `migrations/schema.sql`.

use async_trait::async_trait;
use chrono::NaiveDate;
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Asset, Device};
use crate::{DEFAULT_DISPLAY_HEIGHT, DEFAULT_DISPLAY_WIDTH, DEFAULT_NEXT_WAKE_SECS};

use super::Store;

/// Postgres-backed [`Store`] implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Build a pooled store from a connection URL.
    pub fn connect(database_url: &str) -> Result<Self> {
        let mut cfg = PoolConfig::new();
        cfg.url = Some(database_url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Verify connectivity with a trivial query.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute("SELECT 1", &[])
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        debug!("postgres connection successful");
        Ok(())
    }

    async fn conn(&self) -> Result<deadpool_postgres::Client> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))
    }
}

fn pg_err(e: tokio_postgres::Error) -> Error {
    Error::Persistence(e.to_string())
}

fn asset_from_row(row: &tokio_postgres::Row) -> Asset {
    Asset {
        uuid: row.get(0),
        image_url: row.get(1),
        proxy_url: row.get(2),
        creation_date: row.get(3),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_or_create_device(&self, device_uuid: &str) -> Result<Device> {
        let conn = self.conn().await?;

        let row = conn
            .query_opt(
                "SELECT id, device_uuid, channel_id, next_wake_secs,
                        display_width, display_height, image_url
                 FROM devices
                 WHERE device_uuid = $1",
                &[&device_uuid],
            )
            .await
            .map_err(pg_err)?;

        if let Some(row) = row {
            return Ok(Device {
                id: row.get(0),
                device_uuid: row.get(1),
                channel_id: row.get(2),
                next_wake_secs: row.get(3),
                display_width: row.get::<_, i32>(4) as u32,
                display_height: row.get::<_, i32>(5) as u32,
                image_url: row.get(6),
            });
        }

        let id: i32 = conn
            .query_one(
                "INSERT INTO devices (device_uuid, next_wake_secs, display_width, display_height)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id",
                &[
                    &device_uuid,
                    &DEFAULT_NEXT_WAKE_SECS,
                    &(DEFAULT_DISPLAY_WIDTH as i32),
                    &(DEFAULT_DISPLAY_HEIGHT as i32),
                ],
            )
            .await
            .map_err(pg_err)?
            .get(0);
        debug!("created device {device_uuid} with id {id}");

        Ok(Device {
            id,
            device_uuid: device_uuid.to_string(),
            channel_id: None,
            next_wake_secs: DEFAULT_NEXT_WAKE_SECS,
            display_width: DEFAULT_DISPLAY_WIDTH,
            display_height: DEFAULT_DISPLAY_HEIGHT,
            image_url: None,
        })
    }

    async fn channel_key(&self, channel_id: i32) -> Result<Option<String>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "SELECT channel_key FROM channels WHERE id = $1",
                &[&channel_id],
            )
            .await
            .map_err(pg_err)?;
        Ok(row.map(|r| r.get(0)))
    }

    async fn log_device_event(
        &self,
        device_id: i32,
        event_type: &str,
        message: &str,
    ) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO device_logs (device_id, event_type, message)
             VALUES ($1, $2, $3)",
            &[&device_id, &event_type, &message],
        )
        .await
        .map_err(pg_err)?;
        Ok(())
    }

    async fn update_device_image(&self, device_id: i32, image_url: &str) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            "UPDATE devices SET image_url = $1, updated_at = now() WHERE id = $2",
            &[&image_url, &device_id],
        )
        .await
        .map_err(pg_err)?;
        Ok(())
    }

    async fn random_proxy_asset(&self) -> Result<Option<Asset>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "SELECT uuid, image_url, image_proxy_url, image_creation_date
                 FROM assets
                 WHERE image_proxy_url IS NOT NULL
                 ORDER BY random()
                 LIMIT 1",
                &[],
            )
            .await
            .map_err(pg_err)?;
        Ok(row.as_ref().map(asset_from_row))
    }

    async fn assets_by_month_day(&self, month_day: &str) -> Result<Vec<Asset>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT uuid, image_url, image_proxy_url, image_creation_date
                 FROM assets
                 WHERE to_char(image_creation_date, 'MM-DD') = $1
                   AND image_proxy_url IS NOT NULL
                 ORDER BY image_creation_date DESC",
                &[&month_day],
            )
            .await
            .map_err(pg_err)?;
        Ok(rows.iter().map(asset_from_row).collect())
    }

    async fn displayed_since(
        &self,
        asset_uuid: &str,
        device_uuid: &str,
        since: NaiveDate,
    ) -> Result<bool> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                "SELECT COUNT(*) FROM display_logs
                 WHERE uuid = $1 AND device_uuid = $2 AND display_date >= $3",
                &[&asset_uuid, &device_uuid, &since],
            )
            .await
            .map_err(pg_err)?;
        Ok(row.get::<_, i64>(0) > 0)
    }

    async fn log_display(
        &self,
        asset_uuid: &str,
        device_uuid: &str,
        date: NaiveDate,
    ) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO display_logs (uuid, device_uuid, display_date)
             VALUES ($1, $2, $3)",
            &[&asset_uuid, &device_uuid, &date],
        )
        .await
        .map_err(pg_err)?;
        Ok(())
    }
}
