use crate::smtp_verify::VerificationVerdict;

/// A user record that may be checked: id, address and last activity
/// (unix seconds).
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: u64,
    pub email: String,
    pub last_seen: i64,
}

impl Account {
    pub fn new(user_id: u64, email: impl Into<String>, last_seen: i64) -> Self {
        Self {
            user_id,
            email: email.into(),
            last_seen,
        }
    }
}

/// What a driver should do with an account given its verdict.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Mailbox confirmed.
    Keep,
    /// Mailbox confirmed missing or address malformed.
    Deactivate,
    /// No answer either way; check again later.
    Recheck,
}

impl Disposition {
    pub fn of(verdict: &VerificationVerdict) -> Self {
        if verdict.is_valid() {
            Self::Keep
        } else if verdict.reason().warrants_deactivation() {
            Self::Deactivate
        } else {
            Self::Recheck
        }
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub valid: usize,
    pub invalid: usize,
    pub errors: usize,
}

impl BatchStats {
    pub fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Keep => self.valid += 1,
            Disposition::Deactivate => self.invalid += 1,
            Disposition::Recheck => self.errors += 1,
        }
    }

    pub fn checked(&self) -> usize {
        self.valid + self.invalid + self.errors
    }

    fn absorb(&mut self, other: &Self) {
        self.valid += other.valid;
        self.invalid += other.invalid;
        self.errors += other.errors;
    }
}

/// Summary of a [`Pruner::run`](crate::prune::Pruner::run).
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub candidates: u64,
    pub dry_run: bool,
    pub batches: Vec<BatchStats>,
    pub totals: BatchStats,
    /// Accounts deactivated, or that would have been in a dry run.
    pub flagged_user_ids: Vec<u64>,
}

impl PruneReport {
    pub(crate) fn new(candidates: u64, dry_run: bool) -> Self {
        Self {
            candidates,
            dry_run,
            ..Self::default()
        }
    }

    pub(crate) fn push_batch(&mut self, stats: BatchStats) {
        self.totals.absorb(&stats);
        self.batches.push(stats);
    }
}
