//! Agent state machine vocabulary: states, failure classes, backoff.

use std::time::Duration;

/// The states a device cycle moves through. One cycle runs strictly
/// sequentially; every terminal state leads to [`AgentState::Sleeping`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    /// Process start, persisted state loaded
    Initializing,
    /// Waiting for network connectivity
    ConnectingWifi,
    /// Network probe failed
    WifiError,
    /// Display poll failed
    ApiError,
    /// Image download failed
    DownloadError,
    /// Panel render failed
    RenderError,
    /// Server said not to refresh this cycle
    NoRefresh,
    /// Downloaded frame matched the last one shown
    NoChange,
    /// New frame pushed to the panel
    DisplayingImage,
    /// Cycle finished, waiting out the wake interval
    Sleeping,
}

impl AgentState {
    /// Error states repaint the panel with status text; everything else
    /// leaves the current image alone to conserve refresh cycles.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::WifiError | Self::ApiError | Self::DownloadError | Self::RenderError
        )
    }

    /// Short label for panel status text and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::ConnectingWifi => "connecting wifi",
            Self::WifiError => "wifi error",
            Self::ApiError => "api error",
            Self::DownloadError => "download error",
            Self::RenderError => "render error",
            Self::NoRefresh => "no refresh",
            Self::NoChange => "no change",
            Self::DisplayingImage => "displaying image",
            Self::Sleeping => "sleeping",
        }
    }
}

/// Which retry counter a failure charges against. Counters are
/// independent: a wifi flake does not inflate the API backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Wifi,
    Api,
    Download,
    Render,
}

/// Exponential backoff: `base * 2^(n-1)` seconds for the n-th consecutive
/// failure, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base_secs: u64,
    pub max_secs: u64,
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63);
        let secs = self
            .base_secs
            .saturating_mul(1u64.checked_shl(exp).unwrap_or(u64::MAX))
            .min(self.max_secs);
        Duration::from_secs(secs)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_secs: 30,
            max_secs: 1800,
        }
    }
}

/// Consecutive-failure counters, one per class.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryCounters {
    wifi: u32,
    api: u32,
    download: u32,
    render: u32,
}

impl RetryCounters {
    fn slot(&mut self, class: FailureClass) -> &mut u32 {
        match class {
            FailureClass::Wifi => &mut self.wifi,
            FailureClass::Api => &mut self.api,
            FailureClass::Download => &mut self.download,
            FailureClass::Render => &mut self.render,
        }
    }

    /// Record a failure; returns the new consecutive count for the class.
    pub fn record(&mut self, class: FailureClass) -> u32 {
        let slot = self.slot(class);
        *slot = slot.saturating_add(1);
        *slot
    }

    /// A success in a class clears only that class's counter.
    pub fn clear(&mut self, class: FailureClass) {
        *self.slot(class) = 0;
    }

    /// A fully successful cycle clears everything.
    pub fn clear_all(&mut self) {
        *self = Self::default();
    }

    pub fn count(&self, class: FailureClass) -> u32 {
        match class {
            FailureClass::Wifi => self.wifi,
            FailureClass::Api => self.api,
            FailureClass::Download => self.download,
            FailureClass::Render => self.render,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let b = Backoff {
            base_secs: 30,
            max_secs: 1800,
        };
        assert_eq!(b.delay(1), Duration::from_secs(30));
        assert_eq!(b.delay(2), Duration::from_secs(60));
        assert_eq!(b.delay(3), Duration::from_secs(120));
        assert_eq!(b.delay(7), Duration::from_secs(1800)); // 30*64 > cap
        assert_eq!(b.delay(40), Duration::from_secs(1800));
    }

    #[test]
    fn test_backoff_huge_attempt_does_not_overflow() {
        let b = Backoff {
            base_secs: 30,
            max_secs: 1800,
        };
        assert_eq!(b.delay(u32::MAX), Duration::from_secs(1800));
    }

    #[test]
    fn test_counters_are_independent() {
        let mut c = RetryCounters::default();
        assert_eq!(c.record(FailureClass::Wifi), 1);
        assert_eq!(c.record(FailureClass::Wifi), 2);
        assert_eq!(c.record(FailureClass::Api), 1);
        c.clear(FailureClass::Wifi);
        assert_eq!(c.count(FailureClass::Wifi), 0);
        assert_eq!(c.count(FailureClass::Api), 1);
    }

    #[test]
    fn test_error_states() {
        assert!(AgentState::WifiError.is_error());
        assert!(AgentState::RenderError.is_error());
        assert!(!AgentState::NoRefresh.is_error());
        assert!(!AgentState::DisplayingImage.is_error());
        assert!(!AgentState::Sleeping.is_error());
    }
}
