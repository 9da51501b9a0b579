use thiserror::Error;
use trust_dns_resolver::error::ResolveError;

/// Failure to obtain the mail exchangers of a domain. A domain that simply has
/// no MX record is not an error; it resolves to
/// [`MxStatus::NoRecords`](crate::mx::MxStatus::NoRecords).
#[derive(Debug, Error)]
pub enum MxError {
    #[error("no domain to look up MX records for")]
    EmptyDomain,
    #[error("domain {domain:?} has no valid ASCII (IDNA) form")]
    IdnaConversion {
        domain: String,
        #[source]
        source: idna::Errors,
    },
    #[error("cannot build a DNS resolver from the system configuration: {source}")]
    ResolverInit {
        #[source]
        source: std::io::Error,
    },
    #[error("MX query for {domain} failed, mail exchangers unknown: {source}")]
    Lookup {
        domain: String,
        #[source]
        source: ResolveError,
    },
}

impl MxError {
    pub(crate) fn idna(domain: &str, source: idna::Errors) -> Self {
        Self::IdnaConversion {
            domain: domain.to_string(),
            source,
        }
    }

    pub(crate) fn resolver_init(source: std::io::Error) -> Self {
        Self::ResolverInit { source }
    }

    pub(crate) fn lookup(domain: &str, source: ResolveError) -> Self {
        Self::Lookup {
            domain: domain.to_string(),
            source,
        }
    }

    /// Domain the failed operation was about, when there is one.
    pub fn domain(&self) -> Option<&str> {
        match self {
            Self::IdnaConversion { domain, .. } | Self::Lookup { domain, .. } => Some(domain),
            Self::EmptyDomain | Self::ResolverInit { .. } => None,
        }
    }
}
