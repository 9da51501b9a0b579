mod domain;
mod local;
mod types;

pub use types::{EmailAddress, EmailError, ValidationReport};

use domain::check_domain;
use local::check_local;

/// Maximum length of a full address (RFC 5321 path limit minus the brackets).
const MAX_ADDRESS_LEN: usize = 254;

/// Runs the syntax checks on the normalized form of `email` and reports every
/// problem found.
pub fn validate_email(email: &str) -> ValidationReport {
    match analyze(&normalize(email)) {
        Ok(_) => ValidationReport {
            ok: true,
            reasons: Vec::new(),
        },
        Err(reasons) => ValidationReport { ok: false, reasons },
    }
}

/// Trims and lowercases `email`, validates it and splits it into its parts.
pub fn parse_email(email: &str) -> Result<EmailAddress, EmailError> {
    analyze(&normalize(email)).map_err(|reasons| EmailError::InvalidFormat { reasons })
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

fn analyze(input: &str) -> Result<EmailAddress, Vec<String>> {
    let mut reasons = Vec::new();

    if input.len() > MAX_ADDRESS_LEN {
        reasons.push(format!("total length {} > {MAX_ADDRESS_LEN}", input.len()));
    }

    let Some((local, domain)) = input.split_once('@') else {
        reasons.push("must contain exactly one '@'".to_string());
        return Err(reasons);
    };
    if domain.contains('@') {
        reasons.push("must contain exactly one '@'".to_string());
        return Err(reasons);
    }

    check_local(local, &mut reasons);
    let ascii_domain = check_domain(domain, &mut reasons);

    match ascii_domain {
        Some(ascii) if reasons.is_empty() => Ok(EmailAddress::new(
            local.to_string(),
            domain.to_string(),
            ascii,
        )),
        _ => Err(reasons),
    }
}
