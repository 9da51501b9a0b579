use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use super::{
    Account, AccountStore, BatchStats, Disposition, PruneError, PruneOptions, PruneReport,
};
use crate::smtp_verify::{MailboxVerifier, VerificationVerdict};

/// Walks inactive accounts batch by batch, verifies each address and flags
/// the ones whose mailbox is confirmed missing.
#[derive(Debug, Clone, Default)]
pub struct Pruner {
    options: PruneOptions,
}

impl Pruner {
    pub fn new(options: PruneOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PruneOptions {
        &self.options
    }

    /// Verifies every account idle since before `now - inactive_threshold`
    /// (`now` in unix seconds). Only a store failure aborts the run.
    pub fn run<S, V>(
        &self,
        store: &mut S,
        verifier: &V,
        now: i64,
    ) -> Result<PruneReport, PruneError>
    where
        S: AccountStore,
        V: MailboxVerifier + ?Sized,
    {
        let cutoff = self.options.cutoff(now);
        let batch_size = self.options.batch_size.max(1);
        let candidates = store.count_inactive(cutoff).map_err(PruneError::store)?;
        info!(
            candidates,
            batch_size,
            inactive_days = self.options.inactive_days(),
            dry_run = self.options.dry_run,
            "starting mailbox verification"
        );

        let mut report = PruneReport::new(candidates, self.options.dry_run);
        let mut after = None;
        loop {
            let batch = store
                .inactive_accounts(cutoff, after, batch_size)
                .map_err(PruneError::store)?;
            let Some(last) = batch.last() else { break };
            if !report.batches.is_empty() {
                pause(self.options.pause_between_batches);
            }

            let number = report.batches.len() + 1;
            info!(
                batch = number,
                first = batch[0].user_id,
                last = last.user_id,
                "batch started"
            );
            let stats = self.run_batch(store, verifier, &batch, &mut report.flagged_user_ids)?;
            info!(
                batch = number,
                valid = stats.valid,
                invalid = stats.invalid,
                errors = stats.errors,
                "batch finished"
            );
            report.push_batch(stats);

            if batch.len() < batch_size || after.is_some_and(|prev| last.user_id <= prev) {
                break;
            }
            after = Some(last.user_id);
        }

        info!(
            candidates,
            valid = report.totals.valid,
            invalid = report.totals.invalid,
            errors = report.totals.errors,
            "verification finished"
        );
        if self.options.dry_run {
            info!("dry run: no account was modified");
        }
        Ok(report)
    }

    fn run_batch<S, V>(
        &self,
        store: &mut S,
        verifier: &V,
        batch: &[Account],
        flagged: &mut Vec<u64>,
    ) -> Result<BatchStats, PruneError>
    where
        S: AccountStore,
        V: MailboxVerifier + ?Sized,
    {
        let mut stats = BatchStats::default();
        for (index, account) in batch.iter().enumerate() {
            if index > 0 {
                pause(self.options.pause_between_checks);
            }
            info!(
                user_id = account.user_id,
                email = %account.email,
                last_seen = account.last_seen,
                "checking account"
            );
            let verdict = verifier.verify(&account.email);
            let disposition = Disposition::of(&verdict);
            log_verdict(&verdict);
            stats.record(disposition);

            if disposition == Disposition::Deactivate {
                flagged.push(account.user_id);
                if !self.options.dry_run {
                    self.deactivate(store, account.user_id)?;
                }
            }
        }

        if stats.invalid > 0 && !self.options.dry_run {
            store.commit().map_err(PruneError::store)?;
        }
        Ok(stats)
    }

    fn deactivate<S: AccountStore>(&self, store: &mut S, user_id: u64) -> Result<(), PruneError> {
        if store.mark_invalid(user_id).map_err(PruneError::store)? {
            info!(user_id, "account flagged");
        } else {
            warn!(user_id, "account not flagged: no row changed");
        }
        Ok(())
    }

    /// Verifies a single address and logs the outcome.
    pub fn check_single<V>(&self, verifier: &V, email: &str) -> VerificationVerdict
    where
        V: MailboxVerifier + ?Sized,
    {
        info!(email, "checking single address");
        let verdict = verifier.verify(email);
        log_verdict(&verdict);
        verdict
    }
}

fn log_verdict(verdict: &VerificationVerdict) {
    let servers = verdict.attempted_servers().join(", ");
    if verdict.is_valid() {
        info!(
            email = verdict.email(),
            servers = %servers,
            used_server = verdict.used_server(),
            "mailbox valid"
        );
    } else {
        info!(
            email = verdict.email(),
            reason = %verdict.reason(),
            servers = %servers,
            used_server = verdict.used_server(),
            "mailbox not valid"
        );
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
