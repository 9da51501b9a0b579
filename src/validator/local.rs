/// Characters allowed in a dot-atom local part besides ASCII alphanumerics.
const ATEXT_SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~";

/// Checks the local part as an unquoted dot-atom: every dot-separated atom is
/// non-empty and made of `atext` only. Quoted local parts are refused, they
/// never appear in the account datasets we prune.
pub(crate) fn check_local(local: &str, reasons: &mut Vec<String>) {
    if local.is_empty() || local.len() > 64 {
        reasons.push(format!(
            "local part length {} invalid (1..=64)",
            local.len()
        ));
        return;
    }

    if local.split('.').any(str::is_empty) {
        reasons.push("local part has a leading, trailing or doubled dot".to_string());
    }

    if let Some(bad) = local
        .chars()
        .find(|c| *c != '.' && !is_atext(*c))
    {
        reasons.push(format!("local part has invalid char {bad:?}"));
    }
}

fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric() || ATEXT_SPECIALS.contains(c)
}
