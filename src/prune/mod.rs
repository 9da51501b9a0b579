//! Pruning of stale accounts.
//!
//! [`Pruner`] selects accounts inactive beyond a threshold from an
//! [`AccountStore`], verifies their mailbox one by one with pacing and flags
//! those whose verdict is `user_unknown` or `invalid_format`. Every other
//! reason is counted as an error to re-check later, never as grounds for
//! deactivation.

mod driver;
mod error;
mod options;
mod store;
mod types;

#[cfg(feature = "with-csv")]
mod csv_store;

pub use driver::Pruner;
pub use error::PruneError;
pub use options::PruneOptions;
pub use store::{AccountStore, MemoryAccountStore};
pub use types::{Account, BatchStats, Disposition, PruneReport};

#[cfg(feature = "with-csv")]
pub use csv_store::{CsvAccountStore, CsvStoreError};
