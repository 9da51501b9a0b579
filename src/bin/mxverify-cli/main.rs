mod args;
mod output;
#[cfg(feature = "with-csv")]
mod prune;

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use mxverify_lib::{VerificationVerdict, Verifier};
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Commands, VerifyArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // codes de sortie : 0 OK, 2 adresse(s) non valide(s), 1 fatal
    let all_valid = match &cli.cmd {
        Commands::Verify(args) => verify(&cli, args)?,
        #[cfg(feature = "with-csv")]
        Commands::Prune(args) => prune::run(&cli, args)?.totals.invalid == 0,
    };
    if !all_valid {
        std::process::exit(2);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn verify(cli: &Cli, args: &VerifyArgs) -> Result<bool> {
    let mut emails = args.emails.clone();
    if args.stdin {
        for line in io::stdin().lock().lines() {
            let line = line.context("read stdin")?;
            if !line.trim().is_empty() {
                emails.push(line);
            }
        }
    }
    if emails.is_empty() {
        Cli::clap_command().print_help()?;
        println!();
        return Ok(true);
    }

    let verifier =
        Verifier::from_system_conf(cli.verifier_options()).context("verifier configuration")?;
    let verdicts: Vec<VerificationVerdict> =
        emails.iter().map(|email| verifier.verify(email)).collect();

    output::write_verdicts(&verdicts, &args.format, cli.out.as_deref())?;
    Ok(!output::any_invalid(&verdicts))
}
