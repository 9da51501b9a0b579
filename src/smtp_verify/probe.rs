use tracing::{debug, info, warn};

use crate::mx::{LookupMx, MxStatus, SystemResolver, resolve_with};
use crate::smtp_verify::error::ConfigError;
use crate::smtp_verify::options::VerifierOptions;
use crate::smtp_verify::session::{
    Connect, Connection, ReplyError, SmtpReply, SmtpSession, TcpConnector,
};
use crate::smtp_verify::types::{ReasonCode, VerificationVerdict};
use crate::validator::{EmailAddress, parse_email};

/// `RCPT TO` statuses meaning the mailbox exists.
const MAILBOX_ACCEPTED: [u16; 2] = [250, 251];
/// `RCPT TO` statuses meaning the mailbox does not exist.
const MAILBOX_UNKNOWN: [u16; 5] = [550, 551, 553, 554, 540];

/// Probes `email` with a one-off [`Verifier`] built from the system DNS
/// configuration. Only misconfiguration is reported as an error.
pub fn verify_mailbox(
    email: &str,
    options: &VerifierOptions,
) -> Result<VerificationVerdict, ConfigError> {
    let verifier = Verifier::from_system_conf(options.clone())?;
    Ok(verifier.verify(email))
}

/// Anything able to turn an address into a verdict. Implemented by
/// [`Verifier`]; drivers depend on this trait so they can run against stubs.
pub trait MailboxVerifier {
    fn verify(&self, email: &str) -> VerificationVerdict;
}

/// SMTP mailbox probe.
///
/// For each address the verifier resolves the MX hosts of the domain and walks
/// them in preference order, running `HELO` / `MAIL FROM` / `RCPT TO` until one
/// host answers conclusively or the attempt budget is spent. Hosts are always
/// contacted one after the other.
pub struct Verifier<R = SystemResolver, C = TcpConnector> {
    options: VerifierOptions,
    resolver: R,
    connector: C,
}

impl Verifier {
    /// Verifier using the system DNS configuration and plain TCP; DNS queries
    /// share the configured timeout.
    pub fn from_system_conf(options: VerifierOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let resolver = SystemResolver::with_timeout(options.timeout)?;
        Self::new(options, resolver, TcpConnector)
    }
}

impl<R: LookupMx, C: Connect> Verifier<R, C> {
    pub fn new(options: VerifierOptions, resolver: R, connector: C) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            options,
            resolver,
            connector,
        })
    }

    pub fn options(&self) -> &VerifierOptions {
        &self.options
    }

    /// Probes `email` and returns the verdict. Network and protocol failures are
    /// folded into the verdict's reason; this never fails.
    pub fn verify(&self, email: &str) -> VerificationVerdict {
        let verdict = self.run(email);
        info!(
            email = verdict.email(),
            valid = verdict.is_valid(),
            reason = %verdict.reason(),
            attempted = ?verdict.attempted_servers(),
            used_server = verdict.used_server(),
            "verification finished"
        );
        verdict
    }

    fn run(&self, email: &str) -> VerificationVerdict {
        let address = match parse_email(email) {
            Ok(address) => address,
            Err(err) => {
                debug!(error = %err, "address rejected before probing");
                let normalized = email.trim().to_lowercase();
                return VerificationVerdict::early(normalized, ReasonCode::InvalidFormat);
            }
        };

        let records = match resolve_with(&self.resolver, address.ascii_domain()) {
            Ok(MxStatus::Records(records)) => records,
            Ok(MxStatus::NoRecords) => {
                return VerificationVerdict::early(address.to_string(), ReasonCode::NoMxRecord);
            }
            Err(err) => {
                warn!(domain = address.ascii_domain(), error = %err, "MX lookup failed");
                return VerificationVerdict::early(address.to_string(), ReasonCode::NoMxRecord);
            }
        };

        let mut attempted = Vec::new();
        let mut last_failure = HostFailure::new(ReasonCode::NoConnectionAttempted);

        for record in records.iter().take(self.options.attempt_cap()) {
            let host = record.exchange.as_str();
            attempted.push(host.to_string());
            debug!(host, attempt = attempted.len(), "trying MX host");

            match self.probe_host(&address, host) {
                Ok(answer) => {
                    return VerificationVerdict::new(
                        address.to_string(),
                        answer.reason,
                        Some(answer.response),
                        attempted,
                        Some(host.to_string()),
                    );
                }
                Err(failure) => {
                    warn!(host, reason = %failure.reason, "no conclusive answer from host");
                    last_failure = failure;
                }
            }
        }

        VerificationVerdict::new(
            address.to_string(),
            last_failure.reason,
            last_failure.response,
            attempted,
            None,
        )
    }

    fn probe_host(&self, address: &EmailAddress, host: &str) -> Result<Answer, HostFailure> {
        let conn = self
            .connector
            .connect(host, self.options.port, self.options.timeout)
            .map_err(|err| HostFailure::new(ReasonCode::ConnectionFailed(err.to_string())))?;

        let mut session = SmtpSession::new(host, conn);
        let outcome = self.dialog(&mut session, address);

        let connection_alive = match &outcome {
            Ok(_) => true,
            Err(failure) => !failure.reason.is_connection_class(),
        };
        if connection_alive {
            session.quit();
        }
        outcome
    }

    fn dialog<T: Connection>(
        &self,
        session: &mut SmtpSession<T>,
        address: &EmailAddress,
    ) -> Result<Answer, HostFailure> {
        let stage = Stage::Greeting;
        let greeting = session.read_reply().map_err(|err| stage.failure(err))?;
        stage.require(&greeting, 220)?;

        let stage = Stage::Helo;
        let helo = session
            .command(&format!("HELO {}", self.options.helo_name))
            .map_err(|err| stage.failure(err))?;
        stage.require(&helo, 250)?;

        let stage = Stage::MailFrom;
        let mail = session
            .command(&format!("MAIL FROM:<{}>", self.options.from_address))
            .map_err(|err| stage.failure(err))?;
        stage.require(&mail, 250)?;

        let stage = Stage::RcptTo;
        let rcpt = session
            .command(&format!("RCPT TO:<{}>", address.envelope()))
            .map_err(|err| stage.failure(err))?;
        match classify_rcpt(&rcpt) {
            Some(reason) => Ok(Answer {
                reason,
                response: rcpt.raw().to_string(),
            }),
            None => Err(stage.rejected(&rcpt)),
        }
    }
}

impl<R: LookupMx, C: Connect> MailboxVerifier for Verifier<R, C> {
    fn verify(&self, email: &str) -> VerificationVerdict {
        Verifier::<R, C>::verify(self, email)
    }
}

/// Conclusive reply to `RCPT TO`, or `None` when the status says nothing
/// definite about the mailbox.
pub(crate) fn classify_rcpt(reply: &SmtpReply) -> Option<ReasonCode> {
    if MAILBOX_ACCEPTED.contains(&reply.code) {
        Some(ReasonCode::Valid)
    } else if MAILBOX_UNKNOWN.contains(&reply.code) {
        Some(ReasonCode::UserUnknown)
    } else {
        None
    }
}

struct Answer {
    reason: ReasonCode,
    response: String,
}

struct HostFailure {
    reason: ReasonCode,
    response: Option<String>,
}

impl HostFailure {
    fn new(reason: ReasonCode) -> Self {
        Self {
            reason,
            response: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Greeting,
    Helo,
    MailFrom,
    RcptTo,
}

impl Stage {
    fn dropped(self) -> ReasonCode {
        match self {
            Self::Greeting => ReasonCode::ConnectionDropped,
            Self::Helo => ReasonCode::ConnectionDroppedHelo,
            Self::MailFrom => ReasonCode::ConnectionDroppedMailFrom,
            Self::RcptTo => ReasonCode::ConnectionDroppedRcpt,
        }
    }

    fn refused(self) -> ReasonCode {
        match self {
            Self::Greeting => ReasonCode::SmtpError,
            Self::Helo => ReasonCode::HeloFailed,
            Self::MailFrom => ReasonCode::MailFromFailed,
            Self::RcptTo => ReasonCode::UnknownError,
        }
    }

    fn failure(self, err: ReplyError) -> HostFailure {
        debug!(stage = ?self, error = %err, "stage failed");
        match err {
            ReplyError::Malformed(line) => HostFailure {
                reason: self.refused(),
                response: Some(line.trim().to_string()),
            },
            ReplyError::Closed | ReplyError::Io(_) => HostFailure::new(self.dropped()),
        }
    }

    fn rejected(self, reply: &SmtpReply) -> HostFailure {
        HostFailure {
            reason: self.refused(),
            response: Some(reply.raw().to_string()),
        }
    }

    fn require(self, reply: &SmtpReply, code: u16) -> Result<(), HostFailure> {
        if reply.code == code {
            Ok(())
        } else {
            Err(self.rejected(reply))
        }
    }
}
