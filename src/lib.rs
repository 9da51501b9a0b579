#![forbid(unsafe_code)]
//! mxverify_lib: SMTP mailbox existence probing and stale account pruning.

pub mod mx;
pub mod prune;
pub mod smtp_verify;
pub mod validator;

pub use mx::{Error as MxError, LookupMx, MxRecord, MxStatus, SystemResolver, check_mx};
pub use smtp_verify::{
    ConfigError, Connect, Connection, MailboxVerifier, ReasonCode, SMTP_PORT, TcpConnector,
    VerificationVerdict, Verifier, VerifierOptions, verify_mailbox,
};
pub use validator::{EmailAddress, EmailError, ValidationReport, parse_email, validate_email};

pub use prune::{
    Account, AccountStore, BatchStats, Disposition, MemoryAccountStore, PruneError, PruneOptions,
    PruneReport, Pruner,
};
#[cfg(feature = "with-csv")]
pub use prune::{CsvAccountStore, CsvStoreError};
