use std::fmt;
use std::str::FromStr;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

const CONNECTION_FAILED: &str = "connection_failed";

/// Why a verification ended the way it did.
///
/// The textual forms (`user_unknown`, `connection_failed: <detail>`, ...) are
/// stable and meant to be stored or logged by callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    /// `RCPT TO` accepted with 250 or 251.
    Valid,
    InvalidFormat,
    NoMxRecord,
    /// The connection could not be opened; carries the transport error text.
    ConnectionFailed(String),
    ConnectionDropped,
    ConnectionDroppedHelo,
    ConnectionDroppedMailFrom,
    ConnectionDroppedRcpt,
    /// Greeting was not 220.
    SmtpError,
    HeloFailed,
    MailFromFailed,
    /// `RCPT TO` answered with a status that is neither acceptance nor a
    /// mailbox rejection.
    UnknownError,
    UserUnknown,
    NoConnectionAttempted,
}

impl ReasonCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Valid => "valid",
            Self::InvalidFormat => "invalid_format",
            Self::NoMxRecord => "no_mx_record",
            Self::ConnectionFailed(_) => CONNECTION_FAILED,
            Self::ConnectionDropped => "connection_dropped",
            Self::ConnectionDroppedHelo => "connection_dropped_helo",
            Self::ConnectionDroppedMailFrom => "connection_dropped_mailfrom",
            Self::ConnectionDroppedRcpt => "connection_dropped_rcpt",
            Self::SmtpError => "smtp_error",
            Self::HeloFailed => "helo_failed",
            Self::MailFromFailed => "mail_from_failed",
            Self::UnknownError => "unknown_error",
            Self::UserUnknown => "user_unknown",
            Self::NoConnectionAttempted => "no_connection_attempted",
        }
    }

    /// A conclusive reason settles the question of mailbox existence and stops
    /// host iteration.
    pub fn is_conclusive(&self) -> bool {
        matches!(self, Self::Valid | Self::UserUnknown)
    }

    pub fn is_connection_class(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::ConnectionDropped
                | Self::ConnectionDroppedHelo
                | Self::ConnectionDroppedMailFrom
                | Self::ConnectionDroppedRcpt
        )
    }

    pub fn is_protocol_class(&self) -> bool {
        matches!(
            self,
            Self::SmtpError | Self::HeloFailed | Self::MailFromFailed | Self::UnknownError
        )
    }

    /// Reasons that justify deactivating the account behind the address.
    /// Everything else means "could not determine" and must be re-checked
    /// later rather than acted upon.
    pub fn warrants_deactivation(&self) -> bool {
        matches!(self, Self::UserUnknown | Self::InvalidFormat)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed(detail) => write!(f, "{CONNECTION_FAILED}: {detail}"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown reason code {0:?}")]
pub struct UnknownReason(pub String);

impl FromStr for ReasonCode {
    type Err = UnknownReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(detail) = s
            .strip_prefix(CONNECTION_FAILED)
            .and_then(|rest| rest.strip_prefix(':'))
        {
            return Ok(Self::ConnectionFailed(detail.trim_start().to_string()));
        }
        let reason = match s {
            "valid" => Self::Valid,
            "invalid_format" => Self::InvalidFormat,
            "no_mx_record" => Self::NoMxRecord,
            "connection_dropped" => Self::ConnectionDropped,
            "connection_dropped_helo" => Self::ConnectionDroppedHelo,
            "connection_dropped_mailfrom" => Self::ConnectionDroppedMailFrom,
            "connection_dropped_rcpt" => Self::ConnectionDroppedRcpt,
            "smtp_error" => Self::SmtpError,
            "helo_failed" => Self::HeloFailed,
            "mail_from_failed" => Self::MailFromFailed,
            "unknown_error" => Self::UnknownError,
            "user_unknown" => Self::UserUnknown,
            "no_connection_attempted" => Self::NoConnectionAttempted,
            other => return Err(UnknownReason(other.to_string())),
        };
        Ok(reason)
    }
}

#[cfg(feature = "with-serde")]
impl Serialize for ReasonCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "with-serde")]
impl<'de> Deserialize<'de> for ReasonCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Final result of one verification. Built once per
/// [`Verifier::verify`](crate::smtp_verify::Verifier::verify) call and never
/// modified afterwards.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationVerdict {
    email: String,
    valid: bool,
    reason: ReasonCode,
    #[cfg_attr(
        feature = "with-serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    response: Option<String>,
    #[cfg_attr(feature = "with-serde", serde(default))]
    attempted_servers: Vec<String>,
    #[cfg_attr(
        feature = "with-serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    used_server: Option<String>,
}

impl VerificationVerdict {
    pub(crate) fn new(
        email: impl Into<String>,
        reason: ReasonCode,
        response: Option<String>,
        attempted_servers: Vec<String>,
        used_server: Option<String>,
    ) -> Self {
        Self {
            email: email.into(),
            valid: reason == ReasonCode::Valid,
            reason,
            response,
            attempted_servers,
            used_server,
        }
    }

    /// Verdict reached before any host was contacted.
    pub(crate) fn early(email: impl Into<String>, reason: ReasonCode) -> Self {
        Self::new(email, reason, None, Vec::new(), None)
    }

    /// Normalized address the verdict is about (the trimmed, lowercased input
    /// when it failed validation).
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn reason(&self) -> &ReasonCode {
        &self.reason
    }

    /// Last reply line behind the reason, when a server produced one.
    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    /// Hosts contacted, in order.
    pub fn attempted_servers(&self) -> &[String] {
        &self.attempted_servers
    }

    /// Host that gave the conclusive answer.
    pub fn used_server(&self) -> Option<&str> {
        self.used_server.as_deref()
    }

    pub fn is_conclusive(&self) -> bool {
        self.reason.is_conclusive()
    }
}

impl fmt::Display for VerificationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.valid { "VALID" } else { "INVALID" };
        write!(f, "{label} {} ({})", self.email, self.reason)?;
        if let Some(response) = &self.response {
            write!(f, " [{response}]")?;
        }
        Ok(())
    }
}
