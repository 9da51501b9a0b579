use std::fmt;

use thiserror::Error;

/// Outcome of a syntax check: `ok` is true when `reasons` is empty.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub ok: bool,
    pub reasons: Vec<String>,
}

/// A trimmed, lowercased address that passed syntax validation.
///
/// Only [`parse_email`](crate::validator::parse_email) builds this type, so
/// holding one means the address is safe to use in an SMTP envelope.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    local: String,
    domain: String,
    ascii_domain: String,
}

impl EmailAddress {
    pub(crate) fn new(local: String, domain: String, ascii_domain: String) -> Self {
        Self {
            local,
            domain,
            ascii_domain,
        }
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    /// Domain as written by the user (lowercased, possibly Unicode).
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Domain after IDNA conversion; this is what DNS and SMTP see.
    pub fn ascii_domain(&self) -> &str {
        &self.ascii_domain
    }

    /// Address used in `RCPT TO`.
    pub fn envelope(&self) -> String {
        format!("{}@{}", self.local, self.ascii_domain)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("invalid email address: {}", reasons.join("; "))]
    InvalidFormat { reasons: Vec<String> },
}

impl EmailError {
    pub fn reasons(&self) -> &[String] {
        match self {
            Self::InvalidFormat { reasons } => reasons,
        }
    }
}
