/// Validates `domain` and returns its IDNA (ASCII) form when usable for an MX
/// lookup. Problems are pushed into `reasons`.
pub(crate) fn check_domain(domain: &str, reasons: &mut Vec<String>) -> Option<String> {
    if domain.starts_with('[') {
        reasons.push("address literals are not supported".to_string());
        return None;
    }

    let Ok(ascii) = idna::domain_to_ascii(domain) else {
        reasons.push("domain punycode conversion failed".to_string());
        return None;
    };

    if ascii.is_empty() {
        reasons.push("domain empty after IDNA conversion".to_string());
        return None;
    }
    if ascii.len() > 253 {
        reasons.push(format!("domain length {} > 253", ascii.len()));
    }

    let labels: Vec<&str> = ascii.split('.').collect();
    if labels.len() < 2 {
        reasons.push("domain must contain at least one dot".to_string());
    }

    let before = reasons.len();
    for label in &labels {
        if let Some(problem) = label_problem(label) {
            reasons.push(problem);
        }
    }

    if let Some(tld) = labels.last() {
        if !tld.is_empty() && tld.bytes().all(|b| b.is_ascii_digit()) {
            reasons.push(format!("top-level label '{tld}' is numeric"));
        }
    }

    (reasons.len() == before && labels.len() >= 2).then_some(ascii)
}

fn label_problem(label: &str) -> Option<String> {
    if label.is_empty() {
        return Some("empty domain label".to_string());
    }
    if label.len() > 63 {
        return Some(format!("domain label '{label}' length {} > 63", label.len()));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Some(format!("domain label '{label}' cannot start/end with '-'"));
    }
    if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Some(format!("domain label '{label}' has invalid chars"));
    }
    None
}
