use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use mxverify_lib::VerificationVerdict;

pub fn write_verdicts(
    verdicts: &[VerificationVerdict],
    format: &str,
    out: Option<&str>,
) -> Result<()> {
    match format {
        "human" => emit(&render_human(verdicts), out),
        "json" => write_json(verdicts, out),
        "ndjson" => write_ndjson(verdicts, out),
        other => bail!("unknown --format '{other}', use: human|json|ndjson"),
    }
}

pub fn any_invalid(verdicts: &[VerificationVerdict]) -> bool {
    verdicts.iter().any(|verdict| !verdict.is_valid())
}

pub fn render_human(verdicts: &[VerificationVerdict]) -> String {
    let mut text = String::new();
    for verdict in verdicts {
        if verdict.is_valid() {
            let _ = writeln!(text, "[VALID]   {}", verdict.email());
        } else {
            let _ = writeln!(text, "[INVALID] {} :: {}", verdict.email(), verdict.reason());
        }
        if let Some(response) = verdict.response() {
            let _ = writeln!(text, "        smtp: {response}");
        }
        if !verdict.attempted_servers().is_empty() {
            let used = verdict.used_server().unwrap_or("-");
            let _ = writeln!(
                text,
                "        mx: {} (used: {used})",
                verdict.attempted_servers().join(", ")
            );
        }
    }
    text
}

/// Prints to stdout, or replaces `out` when given.
pub fn emit(text: &str, out: Option<&str>) -> Result<()> {
    match out {
        Some(path) => write_all_atomically(path, text.as_bytes()),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

#[cfg(feature = "with-serde")]
fn write_json(verdicts: &[VerificationVerdict], out: Option<&str>) -> Result<()> {
    let mut s = serde_json::to_string_pretty(verdicts).context("serialize verdicts")?;
    s.push('\n');
    emit(&s, out)
}

#[cfg(not(feature = "with-serde"))]
fn write_json(_: &[VerificationVerdict], _: Option<&str>) -> Result<()> {
    bail!("format=json nécessite la feature 'with-serde'")
}

#[cfg(feature = "with-serde")]
fn write_ndjson(verdicts: &[VerificationVerdict], out: Option<&str>) -> Result<()> {
    let mut s = String::new();
    for verdict in verdicts {
        s.push_str(&serde_json::to_string(verdict).context("serialize verdict")?);
        s.push('\n');
    }
    emit(&s, out)
}

#[cfg(not(feature = "with-serde"))]
fn write_ndjson(_: &[VerificationVerdict], _: Option<&str>) -> Result<()> {
    bail!("format=ndjson nécessite la feature 'with-serde'")
}

pub fn write_all_atomically(path: &str, bytes: &[u8]) -> Result<()> {
    use std::io::Write;

    let tmp = format!("{path}.tmp");
    {
        let mut f = std::fs::File::create(&tmp).with_context(|| format!("create {tmp}"))?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path).with_context(|| format!("rename {tmp} -> {path}"))?;
    Ok(())
}
