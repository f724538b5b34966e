use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::app_error::AppResult;
use crate::application::use_cases::renewal::{RenewalOrchestrator, RenewalResult};
use crate::application::use_cases::subscription::{ClaimedSubscription, SubscriptionRepo};
use crate::domain::entities::renewal_window::RenewalWindow;

pub const DEFAULT_LOOK_AHEAD_DAYS: i64 = 4;
pub const DEFAULT_LEASE_SECS: i64 = 900;
pub const DEFAULT_BATCH_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    pub window: RenewalWindow,
    /// How long a claim stays exclusive before another tick may take it over
    pub lease: Duration,
    pub batch_size: i64,
    pub max_concurrency: usize,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            window: RenewalWindow::new(DEFAULT_LOOK_AHEAD_DAYS),
            lease: Duration::seconds(DEFAULT_LEASE_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub claimed: usize,
    pub renewed: usize,
    pub failed: usize,
    pub released: usize,
    /// Claims lost while waiting for a concurrency slot
    pub skipped: usize,
}

/// How a spawned renewal task ended
enum SagaRun {
    Finished(RenewalResult),
    ClaimLost,
}

/// One pass over the due subscriptions.
///
/// Claims are taken atomically, so ticks running in parallel (in this process
/// or another replica) never renew the same subscription twice. A claim is
/// extended when its saga actually starts and skipped if it was taken over.
#[derive(Clone)]
pub struct RenewalScheduler {
    repo: Arc<dyn SubscriptionRepo>,
    orchestrator: RenewalOrchestrator,
    options: ScheduleOptions,
    semaphore: Arc<Semaphore>,
}

impl RenewalScheduler {
    pub fn new(
        repo: Arc<dyn SubscriptionRepo>,
        orchestrator: RenewalOrchestrator,
        options: ScheduleOptions,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
        Self {
            repo,
            orchestrator,
            options,
            semaphore,
        }
    }

    pub fn options(&self) -> &ScheduleOptions {
        &self.options
    }

    #[instrument(skip(self))]
    pub async fn run_tick(&self, now: DateTime<Utc>) -> AppResult<TickSummary> {
        let claimed = self
            .repo
            .claim_due(
                now,
                self.options.window.look_ahead_days(),
                self.options.lease,
                self.options.batch_size,
            )
            .await?;

        let mut summary = TickSummary {
            claimed: claimed.len(),
            ..TickSummary::default()
        };
        if claimed.is_empty() {
            return Ok(summary);
        }

        info!(count = claimed.len(), "Processing due subscriptions");

        let started = Instant::now();
        let mut handles = Vec::with_capacity(claimed.len());
        for claim in claimed {
            let subscription = &claim.subscription;
            if !self
                .options
                .window
                .should_renew(now, subscription.next_shipment_date)
            {
                self.release(&claim).await;
                summary.released += 1;
                continue;
            }

            let orchestrator = self.orchestrator.clone();
            let repo = Arc::clone(&self.repo);
            let semaphore = Arc::clone(&self.semaphore);
            let lease = self.options.lease;
            let task_claim = claim.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                // The lease was taken at tick start; renew it before any side
                // effect so a queued saga never runs on an expired claim.
                let waited = Duration::from_std(started.elapsed())
                    .unwrap_or_else(|_| Duration::zero());
                let subscription_id = task_claim.subscription.id;
                match repo
                    .extend_claim(subscription_id, task_claim.claim_token, now + waited, lease)
                    .await
                {
                    Ok(true) => SagaRun::Finished(orchestrator.renew(&task_claim).await),
                    Ok(false) => {
                        warn!(%subscription_id, "Renewal claim lost before the saga started");
                        SagaRun::ClaimLost
                    }
                    Err(e) => {
                        warn!(%subscription_id, error = %e, "Failed to extend renewal claim");
                        SagaRun::ClaimLost
                    }
                }
            });
            handles.push((claim, handle));
        }

        for (claim, handle) in handles {
            let subscription_id = claim.subscription.id;
            match handle.await {
                Ok(SagaRun::ClaimLost) => summary.skipped += 1,
                Ok(SagaRun::Finished(result)) if result.success => {
                    info!(
                        %subscription_id,
                        order_id = ?result.order_id,
                        transaction_id = ?result.transaction_id,
                        "Subscription renewed"
                    );
                    summary.renewed += 1;
                }
                Ok(SagaRun::Finished(result)) => {
                    warn!(
                        %subscription_id,
                        order_id = ?result.order_id,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "Subscription renewal failed"
                    );
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(%subscription_id, error = %e, "Renewal task panicked");
                    self.orchestrator
                        .record_aborted(&claim, format!("Renewal task panicked: {e}"))
                        .await;
                    summary.failed += 1;
                }
            }
        }

        info!(
            claimed = summary.claimed,
            renewed = summary.renewed,
            failed = summary.failed,
            released = summary.released,
            skipped = summary.skipped,
            "Renewal tick finished"
        );
        Ok(summary)
    }

    async fn release(&self, claim: &ClaimedSubscription) {
        if let Err(e) = self
            .repo
            .release_claim(
                claim.subscription.id,
                claim.claim_token,
                claim.previous_payment_status,
            )
            .await
        {
            warn!(
                subscription_id = %claim.subscription.id,
                error = %e,
                "Failed to release renewal claim"
            );
        }
    }
}
