//! SMTP mailbox verification.
//!
//! [`Verifier::verify`] validates an address, resolves the MX hosts of its
//! domain and runs a minimal SMTP dialogue (`HELO`, `MAIL FROM`, `RCPT TO`,
//! `QUIT`) against them in preference order. The outcome is a
//! [`VerificationVerdict`] whose [`ReasonCode`] tells a confirmed answer
//! (`valid`, `user_unknown`) apart from "could not determine".

mod error;
mod options;
mod probe;
mod session;
mod types;

pub use error::ConfigError;
pub use options::{SMTP_PORT, VerifierOptions};
pub use probe::{MailboxVerifier, Verifier, verify_mailbox};
pub use session::{Connect, Connection, SmtpReply, TcpConnection, TcpConnector};
pub use types::{ReasonCode, UnknownReason, VerificationVerdict};

#[cfg(test)]
pub(crate) mod tests;
