use thiserror::Error;

use crate::mx::Error as MxError;
use crate::validator::EmailError;

/// Misconfiguration detected while building a
/// [`Verifier`](crate::smtp_verify::Verifier). Network and protocol problems
/// never surface as errors; they end up as a reason on the verdict.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid sender address {address:?}: {source}")]
    InvalidFromAddress {
        address: String,
        #[source]
        source: EmailError,
    },
    #[error("invalid HELO name {0:?}")]
    InvalidHeloName(String),
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("port must be greater than zero")]
    ZeroPort,
    #[error(transparent)]
    Resolver(#[from] MxError),
}
