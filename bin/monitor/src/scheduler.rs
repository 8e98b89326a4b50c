//! Per-withdrawal lifecycle scheduler.
//!
//! Every tick re-reads authoritative state from the portal and pushes each
//! tracked withdrawal one step further: prove once a proposed output
//! covers its block, finalize once the challenge period has elapsed.
//! Ticks never overlap; withdrawals within a tick are processed
//! sequentially with a fixed pause between them to spread RPC load.

use crate::{metrics::Metrics, notify::Notify};
use action::{
    finalize::{Finalize, FinalizeAction},
    prove::{Prove, ProveAction},
    Action,
};
use alloy_primitives::B256;
use alloy_provider::Provider;
use binding::mantle::IL2OutputOracle;
use ::config::ContractAddresses;
use client::Signer;
use eyre::{eyre, Result};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use withdrawal::{
    challenge,
    state::{verify_message, MessageStateProvider},
    types::{Message, MessageStatus},
};

/// Time between scheduler ticks.
const TICK_INTERVAL: Duration = Duration::from_secs(600);
/// Pause between withdrawals within one tick, to spread RPC load.
const INTER_WITHDRAWAL_DELAY: Duration = Duration::from_secs(30);
/// Window for the one-off reminder before finalize eligibility.
const FIVE_MINUTES_SECS: u64 = 300;
/// How far back to scan L1 for OutputProposed events (roughly 3-4 hours).
const PROPOSAL_LOOKBACK_BLOCKS: u64 = 1000;

/// Per-withdrawal notification and termination flags. Only the scheduler
/// task mutates these.
#[derive(Debug, Default, Clone)]
pub struct WithdrawalFlags {
    sent_waiting_message: bool,
    sent_five_minute_reminder: bool,
    finalized: bool,
}

/// Notices emitted while a withdrawal sits inside the challenge period.
#[derive(Debug, PartialEq, Eq)]
pub enum WaitingNotice {
    Waiting,
    FiveMinuteReminder,
}

impl WithdrawalFlags {
    /// At most one waiting notice, and at most one five-minute reminder,
    /// per successful prove.
    fn waiting_notice(&mut self, remaining_secs: u64) -> Option<WaitingNotice> {
        if !self.sent_waiting_message {
            self.sent_waiting_message = true;
            return Some(WaitingNotice::Waiting);
        }
        if remaining_secs <= FIVE_MINUTES_SECS && !self.sent_five_minute_reminder {
            self.sent_five_minute_reminder = true;
            return Some(WaitingNotice::FiveMinuteReminder);
        }
        None
    }

    /// A successful (re-)prove re-arms the waiting notices.
    fn reset_waiting(&mut self) {
        self.sent_waiting_message = false;
        self.sent_five_minute_reminder = false;
    }
}

/// Drives every tracked withdrawal through prove and finalize.
pub struct Scheduler<P1, P2, N> {
    l1_provider: P1,
    l2_provider: P2,
    signer: Signer,
    contracts: ContractAddresses,
    notifier: N,
    metrics: Metrics,
    /// Immutable for the lifetime of the process.
    tracked: Vec<B256>,
    flags: HashMap<B256, WithdrawalFlags>,
}

impl<P1, P2, N> Scheduler<P1, P2, N>
where
    P1: Provider + Clone,
    P2: Provider + Clone,
    N: Notify,
{
    pub fn new(
        l1_provider: P1,
        l2_provider: P2,
        signer: Signer,
        contracts: ContractAddresses,
        notifier: N,
        metrics: Metrics,
        tracked: Vec<B256>,
    ) -> Self {
        let flags = tracked
            .iter()
            .map(|hash| (*hash, WithdrawalFlags::default()))
            .collect();
        Self {
            l1_provider,
            l2_provider,
            signer,
            contracts,
            notifier,
            metrics,
            tracked,
            flags,
        }
    }

    /// Run the ticker until every withdrawal is finalized or `shutdown`
    /// fires. An immediate tick runs before the first scheduled one.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        // An overlong tick skips the next slot instead of queueing it.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = TICK_INTERVAL.as_secs(),
            withdrawals = self.tracked.len(),
            "Starting withdrawal scheduler"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let started = Instant::now();
                    let all_finalized = tokio::select! {
                        done = self.check_all() => done,
                        _ = shutdown.cancelled() => {
                            info!("Shutdown requested, aborting current tick");
                            return Ok(());
                        }
                    };
                    self.metrics.record_tick(started.elapsed());

                    if all_finalized {
                        info!("All withdrawals finalized, stopping scheduler");
                        self.notifier
                            .notify(
                                "🎉 *All Withdrawals Completed!*\n\n\
                                 All configured withdrawals have been successfully finalized.",
                            )
                            .await;
                        return Ok(());
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping scheduler");
                    return Ok(());
                }
            }
        }
    }

    /// Run one pass over every tracked withdrawal. Returns true when all
    /// of them have been finalized.
    pub async fn check_all(&mut self) -> bool {
        if self.tracked.is_empty() {
            info!("No withdrawal transactions to check (WITHDRAWAL_TX_HASH not set)");
            return false;
        }

        info!(count = self.tracked.len(), "Checking withdrawals");
        let mut status_counts = [0usize; 3];

        for (i, tx_hash) in self.tracked.clone().into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(INTER_WITHDRAWAL_DELAY).await;
            }
            match self.check_withdrawal(tx_hash).await {
                Ok(status) => {
                    self.metrics.record_check_success();
                    if let Some(slot) = status_counts.get_mut(status.code() as usize) {
                        *slot += 1;
                    }
                }
                Err(e) => {
                    self.metrics.record_check_failure();
                    warn!(tx_hash = %tx_hash, error = %e, "Withdrawal check failed");
                }
            }
        }

        self.metrics.set_withdrawals("ready_to_prove", status_counts[0]);
        self.metrics.set_withdrawals("proven", status_counts[1]);
        self.metrics.set_withdrawals("finalized", status_counts[2]);

        self.all_finalized()
    }

    /// True when every tracked withdrawal has been observed finalized.
    pub fn all_finalized(&self) -> bool {
        !self.tracked.is_empty()
            && self
                .tracked
                .iter()
                .all(|hash| self.flags.get(hash).is_some_and(|flags| flags.finalized))
    }

    fn state_provider(&self) -> MessageStateProvider<P1, P2> {
        MessageStateProvider::new(
            self.l1_provider.clone(),
            self.l2_provider.clone(),
            self.contracts.l1_portal,
            self.contracts.l2_cross_domain_messenger,
            self.contracts.l2_to_l1_message_passer,
        )
    }

    fn flags_mut(&mut self, tx_hash: B256) -> &mut WithdrawalFlags {
        self.flags.entry(tx_hash).or_default()
    }

    /// Latest L2 block number covered by an OutputProposed event in the
    /// recent L1 history.
    async fn latest_proposed_l2_block(&self) -> Result<u64> {
        let latest = self.l1_provider.get_block_number().await?;
        let from_block = latest.saturating_sub(PROPOSAL_LOOKBACK_BLOCKS);

        let oracle = IL2OutputOracle::new(self.contracts.l2_output_oracle, &self.l1_provider);
        let events = oracle
            .OutputProposed_filter()
            .from_block(from_block)
            .to_block(latest)
            .query()
            .await?;

        let (latest_event, _) = events.last().ok_or_else(|| {
            eyre!("no OutputProposed events in the last {PROPOSAL_LOOKBACK_BLOCKS} L1 blocks")
        })?;

        Ok(latest_event.l2BlockNumber.to::<u64>())
    }

    /// Evaluate one withdrawal and push it one step further if possible.
    async fn check_withdrawal(&mut self, tx_hash: B256) -> Result<MessageStatus> {
        info!(tx_hash = %tx_hash, "Checking withdrawal");

        let message = self.state_provider().get_message(tx_hash).await?;
        verify_message(&message)?;
        info!(
            l2_block = message.block_number,
            withdrawal_hash = %message.withdrawal_hash,
            status = message.status.describe(),
            "Materialized withdrawal message"
        );

        match message.status {
            MessageStatus::Finalized => {
                self.flags_mut(tx_hash).finalized = true;
                self.notifier
                    .notify(&format!(
                        "✅ *Already Finalized*\n\n\
                         Transaction: `{tx_hash}`\n\
                         Status: {}",
                        message.status.describe()
                    ))
                    .await;
                Ok(message.status)
            }
            MessageStatus::Proven { timestamp } => {
                self.advance_proven(tx_hash, &message, timestamp).await?;
                Ok(message.status)
            }
            MessageStatus::ReadyToProve => {
                let latest_proposed = self.latest_proposed_l2_block().await?;
                if latest_proposed < message.block_number {
                    let remaining = message.block_number - latest_proposed;
                    info!(
                        remaining_blocks = remaining,
                        latest_proposed, "Waiting for an output proposal covering the withdrawal"
                    );
                    self.notifier
                        .notify(&format!(
                            "⏳ *Prove Pending*\n\n\
                             Transaction: `{tx_hash}`\n\
                             Still waiting: need `{remaining}` more L2 blocks to be proposed\n\
                             Last proposed block: {latest_proposed}"
                        ))
                        .await;
                    return Ok(message.status);
                }
                self.advance_ready(tx_hash, &message).await?;
                Ok(message.status)
            }
            MessageStatus::Unknown => {
                warn!(tx_hash = %tx_hash, "Withdrawal status unknown, leaving for next tick");
                Ok(message.status)
            }
        }
    }

    /// Proven withdrawal: wait out the challenge period, then finalize.
    async fn advance_proven(
        &mut self,
        tx_hash: B256,
        message: &Message,
        proven_at: u64,
    ) -> Result<()> {
        let now = unix_now();
        let finalize_at = challenge::finalize_time(proven_at);

        if !challenge::can_finalize(now, proven_at) {
            let remaining = finalize_at.saturating_sub(now);
            let hours = remaining / 3600;
            let minutes = (remaining % 3600) / 60;
            info!(
                remaining_secs = remaining,
                finalize_at, "Challenge period still running"
            );

            match self.flags_mut(tx_hash).waiting_notice(remaining) {
                Some(WaitingNotice::Waiting) => {
                    self.notifier
                        .notify(&format!(
                            "⏳ *Waiting for Challenge Period*\n\n\
                             Transaction: `{tx_hash}`\n\
                             Status: PROVEN\n\
                             Can finalize at: {finalize_at} (unix)\n\
                             Time remaining: {hours}h {minutes}m"
                        ))
                        .await;
                }
                Some(WaitingNotice::FiveMinuteReminder) => {
                    self.notifier
                        .notify(&format!(
                            "⏰ *Finalize Coming Soon*\n\n\
                             Transaction: `{tx_hash}`\n\
                             Can finalize at: {finalize_at} (unix)\n\
                             Time remaining: {} minutes",
                            remaining / 60
                        ))
                        .await;
                }
                None => {}
            }
            return Ok(());
        }

        // The next successful prove (after a reorg) notifies again.
        self.flags_mut(tx_hash).reset_waiting();

        self.notifier
            .notify(&format!(
                "🎯 *Withdrawal Ready to Finalize*\n\n\
                 Transaction: `{tx_hash}`\n\
                 Proven at: {proven_at} (unix)\n\
                 Challenge period has passed!"
            ))
            .await;
        self.notifier
            .notify(&format!(
                "🚀 *Starting Finalize Operation*\n\n\
                 Transaction: `{tx_hash}`\n\
                 Submitting finalization to L1..."
            ))
            .await;

        let finalize = Finalize {
            portal_address: self.contracts.l1_portal,
            withdrawal: message.withdrawal_transaction(),
            withdrawal_hash: message.withdrawal_hash,
            from: self.signer.address,
        };
        let mut action = FinalizeAction::new(
            self.l1_provider.clone(),
            self.l2_provider.clone(),
            self.signer.sign.clone(),
            finalize,
        );

        match action.execute().await {
            Ok(result) => {
                info!(tx_hash = %result.tx_hash, "Finalize transaction mined");
                self.metrics.record_finalized();
                self.notifier
                    .notify(&format!(
                        "✅ *Finalize Successful!*\n\n\
                         Transaction: `{tx_hash}`\n\
                         The withdrawal has been finalized on L1.\n\
                         Funds are now available."
                    ))
                    .await;
                self.flags_mut(tx_hash).finalized = true;
                Ok(())
            }
            Err(e) => {
                self.notifier
                    .notify(&format!(
                        "❌ *Finalize Failed*\n\n\
                         Transaction: `{tx_hash}`\n\
                         Error: {e}"
                    ))
                    .await;
                Err(e)
            }
        }
    }

    /// Withdrawal covered by a proposed output: prove it.
    async fn advance_ready(&mut self, tx_hash: B256, message: &Message) -> Result<()> {
        self.notifier
            .notify(&format!(
                "🎯 *Withdrawal Ready to Prove*\n\n\
                 Transaction: `{tx_hash}`\n\
                 L2 Block: {}\n\n\
                 The withdrawal is now ready to be proven!",
                message.block_number
            ))
            .await;
        self.notifier
            .notify(&format!(
                "🚀 *Starting Prove Operation*\n\n\
                 Transaction: `{tx_hash}`\n\
                 Submitting proof to L1..."
            ))
            .await;

        let prove = Prove {
            portal_address: self.contracts.l1_portal,
            oracle_address: self.contracts.l2_output_oracle,
            message_passer_address: self.contracts.l2_to_l1_message_passer,
            withdrawal: message.withdrawal_transaction(),
            withdrawal_hash: message.withdrawal_hash,
            l2_block: message.block_number,
            from: self.signer.address,
        };
        let mut action = ProveAction::new(
            self.l1_provider.clone(),
            self.l2_provider.clone(),
            self.signer.sign.clone(),
            prove,
        );

        match action.execute().await {
            Ok(result) => {
                info!(tx_hash = %result.tx_hash, "Prove transaction mined");
                self.metrics.record_proven();
                // A fresh prove starts a fresh challenge period, so the
                // waiting notices fire again.
                self.flags_mut(tx_hash).reset_waiting();
                let finalize_at = challenge::finalize_time(unix_now());
                self.notifier
                    .notify(&format!(
                        "✅ *Prove Successful!*\n\n\
                         Transaction: `{tx_hash}`\n\
                         L2 Block: {}\n\n\
                         The withdrawal has been proven on L1.\n\
                         Can finalize at: {finalize_at} (unix, ~12 hours)",
                        message.block_number
                    ))
                    .await;
                Ok(())
            }
            Err(e) => {
                self.notifier
                    .notify(&format!(
                        "❌ *Prove Failed*\n\n\
                         Transaction: `{tx_hash}`\n\
                         Error: {e}"
                    ))
                    .await;
                Err(e)
            }
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use withdrawal::challenge::CHALLENGE_PERIOD_SECS;

    #[test]
    fn test_waiting_notice_fires_once() {
        let mut flags = WithdrawalFlags::default();

        assert_eq!(
            flags.waiting_notice(CHALLENGE_PERIOD_SECS - 600),
            Some(WaitingNotice::Waiting)
        );
        // Many subsequent ticks while still far from eligibility: silence.
        for remaining in [40_000u64, 30_000, 20_000, 10_000, 1_000] {
            assert_eq!(flags.waiting_notice(remaining), None);
        }
    }

    #[test]
    fn test_five_minute_reminder_fires_once() {
        let mut flags = WithdrawalFlags::default();
        assert_eq!(flags.waiting_notice(10_000), Some(WaitingNotice::Waiting));

        assert_eq!(
            flags.waiting_notice(FIVE_MINUTES_SECS),
            Some(WaitingNotice::FiveMinuteReminder)
        );
        assert_eq!(flags.waiting_notice(200), None);
        assert_eq!(flags.waiting_notice(10), None);
    }

    #[test]
    fn test_first_tick_inside_reminder_window_sends_waiting_first() {
        // The initial notice always goes out, even when the withdrawal is
        // observed for the first time just before eligibility.
        let mut flags = WithdrawalFlags::default();
        assert_eq!(flags.waiting_notice(120), Some(WaitingNotice::Waiting));
        assert_eq!(
            flags.waiting_notice(100),
            Some(WaitingNotice::FiveMinuteReminder)
        );
        assert_eq!(flags.waiting_notice(80), None);
    }

    #[test]
    fn test_reset_rearms_notices() {
        let mut flags = WithdrawalFlags::default();
        assert_eq!(flags.waiting_notice(10_000), Some(WaitingNotice::Waiting));
        assert_eq!(flags.waiting_notice(200), Some(WaitingNotice::FiveMinuteReminder));
        assert_eq!(flags.waiting_notice(100), None);

        // A re-prove after a reorg starts a fresh challenge period.
        flags.reset_waiting();
        assert_eq!(flags.waiting_notice(9_000), Some(WaitingNotice::Waiting));
        assert_eq!(flags.waiting_notice(250), Some(WaitingNotice::FiveMinuteReminder));
    }

    #[test]
    fn test_finalized_flag_survives_reset() {
        let mut flags = WithdrawalFlags {
            finalized: true,
            ..WithdrawalFlags::default()
        };
        flags.reset_waiting();
        assert!(flags.finalized);
    }
}
