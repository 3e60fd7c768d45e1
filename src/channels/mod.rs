//! Channel resolvers: named image-selection policies assigned to devices.
//!
//! The channel set is a closed enum so that dispatch is exhaustive at
//! compile time; unknown keys from the store fall through to the generic
//! fallback conversion path.

pub mod daily;
pub mod now_playing;
pub mod random;

/// The channels this system knows how to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Uniform random pick over proxy-bearing assets
    Random,
    /// "On this day" selection with history-aware fallback
    Daily,
    /// Snapshot of a third-party now-playing widget
    NtsNowPlaying,
}

impl ChannelKind {
    /// Parse a stored channel key.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "random" => Some(Self::Random),
            "daily" => Some(Self::Daily),
            "nts-now-playing" => Some(Self::NtsNowPlaying),
            _ => None,
        }
    }

    /// The stored key for this channel.
    pub fn as_key(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Daily => "daily",
            Self::NtsNowPlaying => "nts-now-playing",
        }
    }

    /// Path of the conversion endpoint serving this channel.
    pub fn convert_path(&self) -> &'static str {
        match self {
            Self::Random => "/api/random_convert",
            Self::Daily => "/api/daily_convert",
            Self::NtsNowPlaying => "/api/nts_now_playing",
        }
    }
}
