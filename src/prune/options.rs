use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Knobs of the pruning driver. Dry run is on by default: nothing is written
/// to the store until it is explicitly turned off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOptions {
    /// Accounts idle for longer than this are candidates.
    pub inactive_threshold: Duration,
    pub batch_size: usize,
    pub dry_run: bool,
    /// Delay between two verifications, to stay under remote rate limits.
    pub pause_between_checks: Duration,
    pub pause_between_batches: Duration,
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self {
            inactive_threshold: DAY * 365,
            batch_size: 50,
            dry_run: true,
            pause_between_checks: Duration::from_millis(500),
            pause_between_batches: Duration::from_secs(2),
        }
    }
}

impl PruneOptions {
    pub fn with_inactive_days(mut self, days: u32) -> Self {
        self.inactive_threshold = DAY * days.max(1);
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Lets the driver mark accounts in the store.
    pub fn apply(mut self) -> Self {
        self.dry_run = false;
        self
    }

    pub fn with_pauses(mut self, between_checks: Duration, between_batches: Duration) -> Self {
        self.pause_between_checks = between_checks;
        self.pause_between_batches = between_batches;
        self
    }

    pub fn inactive_days(&self) -> u64 {
        self.inactive_threshold.as_secs() / DAY.as_secs()
    }

    /// Last-seen timestamps strictly below the returned value are inactive.
    pub fn cutoff(&self, now: i64) -> i64 {
        let threshold = i64::try_from(self.inactive_threshold.as_secs()).unwrap_or(i64::MAX);
        now.saturating_sub(threshold)
    }
}
