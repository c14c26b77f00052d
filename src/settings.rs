use std::time::Duration;

use crate::consts;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Specifies how recursive folder listing treats failures below the starting folder.
pub enum ListingMode {
    #[default]
    /// Failing folders are logged and skipped, the rest of the tree is still listed.
    BestEffort,
    /// The first failing folder aborts the whole listing.
    Strict,
}

#[derive(Debug, Clone)]
/// Tunables of a camera session.
pub struct SessionSettings {
    /// Ceiling of a single read on file streams opened by the session.
    pub chunk_cap: usize,
    /// Failure handling of recursive folder listing.
    pub listing_mode: ListingMode,
    /// Native wait bound used by the `CamUtil` helpers.
    pub event_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            chunk_cap: consts::DEFAULT_CHUNK_CAP,
            listing_mode: ListingMode::default(),
            event_timeout: consts::DEFAULT_EVENT_TIMEOUT,
        }
    }
}

impl SessionSettings {
    pub fn with_chunk_cap(mut self, chunk_cap: usize) -> Self {
        // A zero ceiling would never make progress.
        self.chunk_cap = chunk_cap.max(1);
        self
    }

    pub fn with_listing_mode(mut self, listing_mode: ListingMode) -> Self {
        self.listing_mode = listing_mode;
        self
    }

    pub fn with_event_timeout(mut self, event_timeout: Duration) -> Self {
        self.event_timeout = event_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = SessionSettings::default();

        assert_eq!(settings.chunk_cap, 1024 * 1024);
        assert_eq!(settings.listing_mode, ListingMode::BestEffort);
        assert_eq!(settings.event_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn zero_chunk_cap_is_clamped() {
        assert_eq!(SessionSettings::default().with_chunk_cap(0).chunk_cap, 1);
    }
}
