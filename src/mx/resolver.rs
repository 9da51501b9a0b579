use std::time::Duration;

use trust_dns_resolver::{
    Resolver,
    error::{ResolveError, ResolveErrorKind},
    system_conf,
};

use super::{Error, MxRecord, MxStatus};

/// Source of MX records. An empty vector means the domain has none.
pub trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError>;
}

impl<T: LookupMx + ?Sized> LookupMx for &T {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        (**self).lookup_mx(domain)
    }
}

/// Blocking resolver built from the host's resolver configuration.
pub struct SystemResolver {
    inner: Resolver,
}

impl SystemResolver {
    pub fn from_system_conf() -> Result<Self, Error> {
        let inner = Resolver::from_system_conf().map_err(Error::resolver_init)?;
        Ok(Self { inner })
    }

    /// Same as [`from_system_conf`](Self::from_system_conf) with a per-query
    /// timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, Error> {
        let (config, mut opts) = system_conf::read_system_conf().map_err(Error::resolver_init)?;
        opts.timeout = timeout;
        let inner = Resolver::new(config, opts).map_err(Error::resolver_init)?;
        Ok(Self { inner })
    }
}

impl LookupMx for SystemResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        let lookup = match self.inner.mx_lookup(domain) {
            Ok(lookup) => lookup,
            Err(err) if matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };
        Ok(lookup
            .iter()
            .map(|mx| MxRecord::new(mx.preference(), normalize_exchange(&mx.exchange().to_utf8())))
            .collect())
    }
}

/// Lookup MX records for `domain` using the system resolver.
///
/// The domain is normalized via IDNA before querying DNS. The resulting
/// [`MxStatus`] lists the records in the order they should be tried.
pub fn check_mx(domain: &str) -> Result<MxStatus, Error> {
    let resolver = SystemResolver::from_system_conf()?;
    resolve_mail_exchangers(&resolver, domain)
}

/// Resolves the mail exchangers of `domain` through `resolver`. Each call is a
/// fresh lookup.
pub fn resolve_mail_exchangers<R>(resolver: &R, domain: &str) -> Result<MxStatus, Error>
where
    R: LookupMx + ?Sized,
{
    let ascii = normalize_domain(domain)?;
    resolve_with(resolver, &ascii)
}

pub(crate) fn resolve_with<R>(resolver: &R, ascii_domain: &str) -> Result<MxStatus, Error>
where
    R: LookupMx + ?Sized,
{
    let records = resolver
        .lookup_mx(ascii_domain)
        .map_err(|err| Error::lookup(ascii_domain, err))?;
    Ok(MxStatus::from_lookup(records))
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, Error> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyDomain);
    }
    idna::domain_to_ascii(trimmed).map_err(|err| Error::idna(trimmed, err))
}

pub(crate) fn normalize_exchange(exchange: &str) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}
