use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::smtp_verify::error::ConfigError;
use crate::validator::parse_email;

/// SMTP port probed on every mail exchanger.
pub const SMTP_PORT: u16 = 25;

/// Configuration knobs for [`Verifier`](crate::smtp_verify::Verifier).
///
/// The value is copied into the verifier at construction, so changing an
/// options value afterwards has no effect on a verifier already built.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierOptions {
    /// Envelope sender used in `MAIL FROM`.
    pub from_address: String,
    /// Name announced in `HELO`.
    pub helo_name: String,
    /// Hosts contacted per verification. Values below 1 behave as 1.
    pub max_mx_attempts: usize,
    /// Bound applied to connect, each read and each write.
    pub timeout: Duration,
    pub port: u16,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            from_address: "noreply@example.com".to_string(),
            helo_name: "localhost".to_string(),
            max_mx_attempts: 3,
            timeout: Duration::from_secs(10),
            port: SMTP_PORT,
        }
    }
}

impl VerifierOptions {
    pub fn with_from_address(mut self, from: impl Into<String>) -> Self {
        self.from_address = from.into();
        self
    }

    pub fn with_helo_name(mut self, helo: impl Into<String>) -> Self {
        self.helo_name = helo.into();
        self
    }

    pub fn with_max_mx_attempts(mut self, attempts: usize) -> Self {
        self.max_mx_attempts = attempts.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Number of hosts a verification may contact.
    pub fn attempt_cap(&self) -> usize {
        self.max_mx_attempts.max(1)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        parse_email(&self.from_address).map_err(|source| ConfigError::InvalidFromAddress {
            address: self.from_address.clone(),
            source,
        })?;

        let helo = self.helo_name.as_str();
        if helo.is_empty() || helo.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ConfigError::InvalidHeloName(self.helo_name.clone()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        Ok(())
    }
}
