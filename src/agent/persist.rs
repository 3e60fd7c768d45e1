//! On-disk agent state: survives deep sleep and process restarts.
//!
//! A single small JSON file holds the last shown frame's hash, the
//! scheduled wake timestamp, and the device UUID. Corruption is treated
//! as "no prior state" rather than an error; the worst case is one
//! redundant repaint.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::Result;

/// UUID used when no network interface MAC can be read.
pub const FALLBACK_UUID: &str = "DEFAULT-UUID";

/// Persisted agent state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedState {
    /// SHA-256 hex of the last frame pushed to the panel
    #[serde(default)]
    pub last_image_sha256: Option<String>,

    /// Unix timestamp the agent intends to wake at
    #[serde(default)]
    pub wake_at_unix: Option<i64>,

    /// Device identity reported to the server
    #[serde(default)]
    pub device_uuid: Option<String>,
}

/// Loads and saves [`PersistedState`] at a fixed path.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load persisted state; missing or corrupt files yield defaults.
    pub fn load(&self) -> PersistedState {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(state) => state,
                Err(e) => {
                    warn!("state file {:?} corrupt, starting fresh: {e}", self.path);
                    PersistedState::default()
                }
            },
            Err(_) => PersistedState::default(),
        }
    }

    pub fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| crate::Error::Persistence(format!("state serialization: {e}")))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Derive a stable device UUID from a network interface's MAC address,
/// uppercased with the colons stripped. Falls back to [`FALLBACK_UUID`]
/// when the interface is absent (containers, dev machines).
pub fn device_uuid_from_mac(iface: &str) -> String {
    let path = format!("/sys/class/net/{iface}/address");
    match std::fs::read_to_string(&path) {
        Ok(mac) => {
            let uuid: String = mac
                .trim()
                .chars()
                .filter(|c| *c != ':')
                .map(|c| c.to_ascii_uppercase())
                .collect();
            if uuid.is_empty() {
                warn!("{path} was empty, using fallback UUID");
                FALLBACK_UUID.to_string()
            } else {
                uuid
            }
        }
        Err(e) => {
            warn!("cannot read {path} ({e}), using fallback UUID");
            FALLBACK_UUID.to_string()
        }
    }
}

/// SHA-256 of a byte slice as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Default state file location under a data directory.
pub fn state_path(data_dir: &Path) -> PathBuf {
    data_dir.join("agent_state.json")
}
