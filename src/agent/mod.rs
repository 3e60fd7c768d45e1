//! Device agent: the strictly sequential poll-download-render-sleep cycle.
//!
//! One cycle per wake. Failures are charged to per-class retry counters
//! and back off exponentially; a success in a class clears only that
//! class. The panel is repainted only on boot and on error states, since
//! e-paper refresh cycles are a consumable.

pub mod client;
pub mod hardware;
pub mod persist;
pub mod state;

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::DisplayRequest;

use client::DisplayApi;
use hardware::{Network, Panel};
use persist::{PersistedState, StateStore};
use state::{AgentState, Backoff, FailureClass, RetryCounters};

/// How the agent waits out the wake interval.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SleepMode {
    /// Stay resident and block
    #[default]
    Blocking,
    /// Hand off to a system suspend command
    Suspend,
}

/// Agent configuration, loaded from YAML like the server's.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Server base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Directory for persisted state and file-panel output
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Interface whose MAC becomes the device UUID
    #[serde(default = "default_iface")]
    pub iface: String,

    /// HTTP timeout, seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// First-retry backoff, seconds
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Backoff cap, seconds
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// Skip the panel refresh when the downloaded frame hashes the same
    /// as the one already shown
    #[serde(default = "default_true")]
    pub compare_hash: bool,

    /// Ask the server for wall-clock time each poll
    #[serde(default)]
    pub request_time_sync: bool,

    #[serde(default)]
    pub sleep_mode: SleepMode,

    /// Suspend command template; `{secs}` is replaced with the interval
    #[serde(default = "default_suspend_command")]
    pub suspend_command: String,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/fridge-agent")
}

fn default_iface() -> String {
    "wlan0".to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_backoff_base_secs() -> u64 {
    30
}

fn default_backoff_max_secs() -> u64 {
    1800
}

fn default_true() -> bool {
    true
}

fn default_suspend_command() -> String {
    "rtcwake -m mem -s {secs}".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("empty config must deserialize")
    }
}

impl AgentConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::Error::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        serde_yaml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("invalid agent config YAML: {e}")))
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            base_secs: self.backoff_base_secs,
            max_secs: self.backoff_max_secs,
        }
    }
}

/// What a finished cycle tells the outer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub state: AgentState,
    /// How long to wait before the next cycle.
    pub sleep: Duration,
}

/// The agent proper, generic over its three seams.
pub struct Agent<A, N, P> {
    api: A,
    network: N,
    panel: P,
    config: AgentConfig,
    state_store: StateStore,
    persisted: PersistedState,
    counters: RetryCounters,
    backoff: Backoff,
    device_uuid: String,
    state: AgentState,
    booted: bool,
}

impl<A: DisplayApi, N: Network, P: Panel> Agent<A, N, P> {
    pub fn new(api: A, network: N, panel: P, config: AgentConfig) -> Self {
        let state_store = StateStore::new(persist::state_path(&config.data_dir));
        let persisted = state_store.load();
        let device_uuid = persisted
            .device_uuid
            .clone()
            .unwrap_or_else(|| persist::device_uuid_from_mac(&config.iface));
        let backoff = config.backoff();
        Self {
            api,
            network,
            panel,
            config,
            state_store,
            persisted,
            counters: RetryCounters::default(),
            backoff,
            device_uuid,
            state: AgentState::Initializing,
            booted: false,
        }
    }

    pub fn device_uuid(&self) -> &str {
        &self.device_uuid
    }

    /// Current state, for logs and external status surfaces.
    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// Seconds left of a previously scheduled sleep, if the process was
    /// restarted mid-interval. Honoring it avoids hammering the server on
    /// crash loops.
    pub fn remaining_scheduled_sleep(&self) -> Option<Duration> {
        let wake_at = self.persisted.wake_at_unix?;
        let remaining = wake_at - Utc::now().timestamp();
        (remaining > 0).then(|| Duration::from_secs(remaining as u64))
    }

    fn fail(&mut self, class: FailureClass, state: AgentState, detail: &str) -> CycleOutcome {
        let attempt = self.counters.record(class);
        let sleep = self.backoff.delay(attempt);
        warn!(
            "{} (attempt {attempt}), retrying in {}s: {detail}",
            state.label(),
            sleep.as_secs()
        );
        // Error repaint is best-effort; a dead panel shouldn't mask the
        // original failure.
        if let Err(e) = self.panel.show_message(state.label()) {
            warn!("status repaint failed: {e}");
        }
        CycleOutcome { state, sleep }
    }

    fn wake_interval(next_wake_secs: i64) -> Duration {
        Duration::from_secs(next_wake_secs.max(1) as u64)
    }

    /// Run one full cycle. Never returns an error: every failure maps to
    /// an error state with a backoff delay.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self.cycle_inner();
        self.state = outcome.state.clone();
        outcome
    }

    fn cycle_inner(&mut self) -> CycleOutcome {
        if !self.booted {
            self.booted = true;
            info!("agent starting, device_uuid={}", self.device_uuid);
            if let Err(e) = self.panel.show_message(AgentState::Initializing.label()) {
                warn!("boot repaint failed: {e}");
            }
        }

        self.state = AgentState::ConnectingWifi;
        if let Err(e) = self.network.connect() {
            return self.fail(FailureClass::Wifi, AgentState::WifiError, &e.to_string());
        }
        self.counters.clear(FailureClass::Wifi);

        let request = DisplayRequest {
            current_fw_ver: Some(env!("CARGO_PKG_VERSION").to_string()),
            battery_voltage: None,
            wifi_signal: None,
            request_time_sync: self.config.request_time_sync,
        };

        let response = match self.api.poll_display(&self.device_uuid, &request) {
            Ok(resp) => resp,
            Err(e) => return self.fail(FailureClass::Api, AgentState::ApiError, &e.to_string()),
        };
        self.counters.clear(FailureClass::Api);

        let sleep = Self::wake_interval(response.next_wake_secs);

        if response.is_no_refresh() {
            info!("server says no refresh, sleeping {}s", sleep.as_secs());
            return CycleOutcome {
                state: AgentState::NoRefresh,
                sleep,
            };
        }

        let frame = match self.api.download(&response.image_url) {
            Ok(bytes) => bytes,
            Err(e) => {
                return self.fail(
                    FailureClass::Download,
                    AgentState::DownloadError,
                    &e.to_string(),
                )
            }
        };
        self.counters.clear(FailureClass::Download);

        let hash = persist::sha256_hex(&frame);
        if self.config.compare_hash && self.persisted.last_image_sha256.as_deref() == Some(&hash) {
            info!("frame unchanged, skipping panel refresh");
            return CycleOutcome {
                state: AgentState::NoChange,
                sleep,
            };
        }

        if let Err(e) = self.panel.render(&frame) {
            return self.fail(FailureClass::Render, AgentState::RenderError, &e.to_string());
        }
        self.counters.clear_all();

        self.persisted.last_image_sha256 = Some(hash);
        self.persisted.device_uuid = Some(self.device_uuid.clone());
        if let Err(e) = self.state_store.save(&self.persisted) {
            warn!("state save failed: {e}");
        }

        info!("new frame displayed, sleeping {}s", sleep.as_secs());
        CycleOutcome {
            state: AgentState::DisplayingImage,
            sleep,
        }
    }

    /// Persist the intended wake time so a restart mid-sleep resumes the
    /// schedule instead of polling immediately.
    pub fn record_wake_at(&mut self, sleep: Duration) {
        self.persisted.wake_at_unix = Some(Utc::now().timestamp() + sleep.as_secs() as i64);
        if let Err(e) = self.state_store.save(&self.persisted) {
            warn!("state save failed: {e}");
        }
    }

    /// Run cycles forever, sleeping between them via `sleeper`.
    pub fn run_forever<S: Sleeper>(&mut self, sleeper: &mut S) -> Result<()> {
        if let Some(remaining) = self.remaining_scheduled_sleep() {
            info!(
                "resuming scheduled sleep, {}s remaining",
                remaining.as_secs()
            );
            sleeper.sleep(remaining)?;
        }
        loop {
            let outcome = self.run_cycle();
            self.record_wake_at(outcome.sleep);
            self.state = AgentState::Sleeping;
            sleeper.sleep(outcome.sleep)?;
        }
    }
}

/// How to wait between cycles.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration) -> Result<()>;
}

/// Stay resident and block the thread.
pub struct BlockingSleeper;

impl Sleeper for BlockingSleeper {
    fn sleep(&mut self, duration: Duration) -> Result<()> {
        std::thread::sleep(duration);
        Ok(())
    }
}

/// Hand off to a system suspend command (`rtcwake` or similar). The
/// command blocks until the machine resumes.
pub struct SuspendSleeper {
    command_template: String,
}

impl SuspendSleeper {
    pub fn new(command_template: impl Into<String>) -> Self {
        Self {
            command_template: command_template.into(),
        }
    }
}

impl Sleeper for SuspendSleeper {
    fn sleep(&mut self, duration: Duration) -> Result<()> {
        let command = self
            .command_template
            .replace("{secs}", &duration.as_secs().to_string());
        info!("suspending: {command}");
        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .status()?;
        if !status.success() {
            warn!("suspend command exited with {status}, falling back to blocking sleep");
            std::thread::sleep(duration);
        }
        Ok(())
    }
}
