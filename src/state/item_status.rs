/// Item status definitions for tracking pipeline progress
///
/// Every queued item moves forward through the pipeline stages:
///
/// `New -> Fetching -> Fetched -> Parsed -> AssetsReady`
///
/// with `Failed` reachable from `Fetching`, `Fetched` and `Parsed`.
use std::fmt;

/// Represents the current pipeline stage of a queued item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemStatus {
    /// URL discovered, waiting for the raw page to be fetched
    New,

    /// Claimed by a fetch batch, request in flight
    Fetching,

    /// Raw page persisted, waiting for extraction
    Fetched,

    /// Record extracted and stored, waiting for assets
    Parsed,

    /// All assets downloaded (final success state)
    AssetsReady,

    /// Irrecoverable error at some stage; terminal until reset
    Failed,
}

impl ItemStatus {
    /// Returns true if no stage will pick this item up again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AssetsReady | Self::Failed)
    }

    /// Checks a forward transition against the state machine
    ///
    /// Reset is not a transition; it is handled by the store directly.
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Fetching)
                | (Self::Fetching, Self::Fetched)
                | (Self::Fetched, Self::Parsed)
                | (Self::Parsed, Self::AssetsReady)
                | (Self::Fetching, Self::Failed)
                | (Self::Fetched, Self::Failed)
                | (Self::Parsed, Self::Failed)
        )
    }

    /// Converts the status to its database representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Fetching => "FETCHING",
            Self::Fetched => "FETCHED",
            Self::Parsed => "PARSED",
            Self::AssetsReady => "ASSETS_READY",
            Self::Failed => "FAILED",
        }
    }

    /// Parses a status from its database representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(Self::New),
            "FETCHING" => Some(Self::Fetching),
            "FETCHED" => Some(Self::Fetched),
            "PARSED" => Some(Self::Parsed),
            "ASSETS_READY" => Some(Self::AssetsReady),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all statuses in pipeline order
    pub fn all_statuses() -> [Self; 6] {
        [
            Self::New,
            Self::Fetching,
            Self::Fetched,
            Self::Parsed,
            Self::AssetsReady,
            Self::Failed,
        ]
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
