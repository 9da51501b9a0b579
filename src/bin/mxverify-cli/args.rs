use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use mxverify_lib::{SMTP_PORT, VerifierOptions};

#[derive(Parser)]
#[command(name = "mxverify-cli", version)]
#[command(about = "Vérifie l'existence de boîtes mail via MX + RCPT TO")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,

    /// enveloppe MAIL FROM utilisée pour les sondes
    #[arg(long, env = "MXVERIFY_FROM", global = true)]
    pub from: Option<String>,

    /// nom annoncé dans HELO (par défaut $HOSTNAME, sinon localhost)
    #[arg(long, env = "MXVERIFY_HELO", global = true)]
    pub helo: Option<String>,

    /// nombre maximum d'MX interrogés par adresse
    #[arg(long = "max-mx", default_value_t = 3, global = true)]
    pub max_mx: usize,

    /// timeout par connexion et par lecture (ms)
    #[arg(long = "timeout-ms", default_value_t = 10_000, global = true)]
    pub timeout_ms: u64,

    /// port SMTP des serveurs MX
    #[arg(long, default_value_t = SMTP_PORT, global = true)]
    pub port: u16,

    /// écrit le rapport dans un fichier (écriture atomique)
    #[arg(long, global = true)]
    pub out: Option<String>,

    /// logs détaillés (dialogue SMTP)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// vérifie une ou plusieurs adresses
    Verify(VerifyArgs),
    /// vérifie les comptes inactifs d'une table CSV et signale les adresses mortes
    #[cfg(feature = "with-csv")]
    Prune(PruneArgs),
}

#[derive(Args)]
pub struct VerifyArgs {
    /// adresses à tester
    pub emails: Vec<String>,

    /// lit des adresses depuis stdin (une par ligne)
    #[arg(long)]
    pub stdin: bool,

    /// format: human|json|ndjson
    #[arg(long, default_value = "human")]
    pub format: String,
}

#[cfg(feature = "with-csv")]
#[derive(Args)]
pub struct PruneArgs {
    /// table CSV: user_id,email,last_seen[,banned]
    #[arg(long)]
    pub accounts: String,

    /// marque réellement les comptes (sinon simulation)
    #[arg(long)]
    pub apply: bool,

    /// taille des lots
    #[arg(long = "batch-size", default_value_t = 50)]
    pub batch_size: usize,

    /// seuil d'inactivité en jours
    #[arg(long = "inactive-days", default_value_t = 365)]
    pub inactive_days: u32,

    /// pause entre deux vérifications (ms)
    #[arg(long = "pause-ms", default_value_t = 500)]
    pub pause_ms: u64,

    /// pause entre deux lots (ms)
    #[arg(long = "batch-pause-ms", default_value_t = 2_000)]
    pub batch_pause_ms: u64,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn clap_command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }

    pub fn verifier_options(&self) -> VerifierOptions {
        let mut options = VerifierOptions::default()
            .with_helo_name(helo_name(self.helo.as_deref()))
            .with_max_mx_attempts(self.max_mx)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_port(self.port);
        if let Some(from) = &self.from {
            options = options.with_from_address(from.as_str());
        }
        options
    }
}

#[cfg(feature = "with-csv")]
impl PruneArgs {
    pub fn prune_options(&self) -> mxverify_lib::PruneOptions {
        let options = mxverify_lib::PruneOptions::default()
            .with_batch_size(self.batch_size)
            .with_inactive_days(self.inactive_days)
            .with_pauses(
                Duration::from_millis(self.pause_ms),
                Duration::from_millis(self.batch_pause_ms),
            );
        if self.apply { options.apply() } else { options }
    }
}

fn helo_name(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var("HOSTNAME").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
