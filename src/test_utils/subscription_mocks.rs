//! In-memory subscription store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{
        ClaimedSubscription, NewSubscription, RenewalOutcome, SubscriptionProfile,
        SubscriptionRepo,
    },
    domain::entities::{
        payment_record::PaymentRecord, payment_status::PaymentStatus,
        renewal_window::RenewalWindow, subscription_status::SubscriptionStatus,
    },
};

/// Mirrors `next_shipment_date + make_interval(days => subscription_days)`
fn advance_shipment_date(current: DateTime<Utc>, subscription_days: i32) -> DateTime<Utc> {
    current + Duration::days(subscription_days as i64)
}

#[derive(Debug, Clone)]
struct StoredSubscription {
    profile: SubscriptionProfile,
    claim_token: Option<Uuid>,
    claimed_until: Option<DateTime<Utc>>,
}

impl StoredSubscription {
    fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.claimed_until.is_none_or(|until| until < now)
    }
}

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    subscriptions: Mutex<HashMap<Uuid, StoredSubscription>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: SubscriptionProfile) {
        self.subscriptions.lock().unwrap().insert(
            profile.id,
            StoredSubscription {
                profile,
                claim_token: None,
                claimed_until: None,
            },
        );
    }

    pub fn get(&self, id: Uuid) -> Option<SubscriptionProfile> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(&id)
            .map(|s| s.profile.clone())
    }

    pub fn all(&self) -> Vec<SubscriptionProfile> {
        self.subscriptions
            .lock()
            .unwrap()
            .values()
            .map(|s| s.profile.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    pub fn is_claimed(&self, id: Uuid) -> bool {
        self.subscriptions
            .lock()
            .unwrap()
            .get(&id)
            .is_some_and(|s| s.claim_token.is_some())
    }

    /// Hand the claim to another holder, as a takeover after lease expiry would
    pub fn steal_claim(&self, id: Uuid) -> Option<Uuid> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let stored = subscriptions.get_mut(&id)?;
        let token = Uuid::new_v4();
        stored.claim_token = Some(token);
        stored.claimed_until = Some(Utc::now() + Duration::minutes(15));
        Some(token)
    }

    pub fn claimed_until(&self, id: Uuid) -> Option<DateTime<Utc>> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(&id)
            .and_then(|s| s.claimed_until)
    }

    /// Clear the retry gate so the next tick may pick the subscription again
    pub fn open_retry_gate(&self, id: Uuid) {
        if let Some(stored) = self.subscriptions.lock().unwrap().get_mut(&id) {
            stored.profile.next_attempt_at = None;
        }
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn create(&self, subscription: &NewSubscription) -> AppResult<SubscriptionProfile> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let duplicate = subscriptions.values().any(|s| {
            s.profile.order_id == subscription.order_id && s.profile.sku == subscription.sku
        });
        if duplicate {
            return Err(AppError::Conflict("Subscription already exists".into()));
        }

        let now = Utc::now();
        let profile = SubscriptionProfile {
            id: Uuid::new_v4(),
            order_id: subscription.order_id,
            customer_id: subscription.customer_id,
            email: subscription.email.clone(),
            product_id: subscription.product_id,
            sku: subscription.sku.clone(),
            product_name: subscription.product_name.clone(),
            quantity: subscription.quantity,
            billing_address: subscription.billing_address.clone(),
            shipping_address: subscription.shipping_address.clone(),
            subscription_days: subscription.subscription_days,
            start_date: subscription.start_date,
            next_shipment_date: subscription.next_shipment_date,
            status: SubscriptionStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_history: Vec::new(),
            last_processed_at: None,
            last_error: None,
            last_error_date: None,
            retry_count: 0,
            next_attempt_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        subscriptions.insert(
            profile.id,
            StoredSubscription {
                profile: profile.clone(),
                claim_token: None,
                claimed_until: None,
            },
        );
        Ok(profile)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        Ok(self.get(id))
    }

    async fn set_status(
        &self,
        id: Uuid,
        expected: SubscriptionStatus,
        new_status: SubscriptionStatus,
    ) -> AppResult<Option<SubscriptionProfile>> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let Some(stored) = subscriptions.get_mut(&id) else {
            return Ok(None);
        };
        if stored.profile.status != expected {
            return Ok(None);
        }
        stored.profile.status = new_status;
        stored.profile.updated_at = Some(Utc::now());
        Ok(Some(stored.profile.clone()))
    }

    async fn find_active_due(
        &self,
        now: DateTime<Utc>,
        look_ahead_days: i64,
    ) -> AppResult<Vec<SubscriptionProfile>> {
        let window = RenewalWindow::new(look_ahead_days);
        let mut due: Vec<_> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.profile.status.is_renewable())
            .filter(|s| window.contains(now, s.profile.next_shipment_date))
            .map(|s| s.profile.clone())
            .collect();
        due.sort_by_key(|s| s.next_shipment_date);
        Ok(due)
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        look_ahead_days: i64,
        lease: Duration,
        limit: i64,
    ) -> AppResult<Vec<ClaimedSubscription>> {
        let window = RenewalWindow::new(look_ahead_days);
        let mut subscriptions = self.subscriptions.lock().unwrap();

        let mut due: Vec<&mut StoredSubscription> = subscriptions
            .values_mut()
            .filter(|s| s.profile.status.is_renewable())
            .filter(|s| window.contains(now, s.profile.next_shipment_date))
            .filter(|s| s.is_claimable(now))
            .filter(|s| s.profile.next_attempt_at.is_none_or(|at| at <= now))
            .collect();
        due.sort_by_key(|s| s.profile.next_shipment_date);

        let claimed = due
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|stored| {
                let token = Uuid::new_v4();
                let previous_payment_status = stored.profile.payment_status;
                stored.claim_token = Some(token);
                stored.claimed_until = Some(now + lease);
                stored.profile.payment_status = PaymentStatus::Processing;
                ClaimedSubscription {
                    claim_token: token,
                    previous_payment_status,
                    subscription: stored.profile.clone(),
                }
            })
            .collect();
        Ok(claimed)
    }

    async fn apply_renewal_outcome(
        &self,
        id: Uuid,
        claim_token: Uuid,
        outcome: &RenewalOutcome,
    ) -> AppResult<SubscriptionProfile> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let stored = subscriptions
            .get_mut(&id)
            .filter(|s| s.claim_token == Some(claim_token))
            .ok_or(AppError::ClaimLost)?;

        let profile = &mut stored.profile;
        match outcome {
            RenewalOutcome::Completed { record } => {
                profile.next_shipment_date =
                    advance_shipment_date(profile.next_shipment_date, profile.subscription_days);
                profile.payment_status = PaymentStatus::Completed;
                profile.last_error = None;
                profile.last_error_date = None;
                profile.retry_count = 0;
                profile.next_attempt_at = None;
                profile.last_processed_at = Some(record.processed_at);
            }
            RenewalOutcome::Failed {
                record,
                error,
                retry_at,
            } => {
                profile.payment_status = PaymentStatus::Failed;
                profile.last_error = Some(error.clone());
                profile.last_error_date = Some(record.processed_at);
                profile.retry_count += 1;
                profile.next_attempt_at = Some(*retry_at);
                profile.last_processed_at = Some(record.processed_at);
            }
        }
        profile.payment_history.push(outcome.record().clone());
        profile.updated_at = Some(Utc::now());
        stored.claim_token = None;
        stored.claimed_until = None;

        Ok(stored.profile.clone())
    }

    async fn extend_claim(
        &self,
        id: Uuid,
        claim_token: Uuid,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> AppResult<bool> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let Some(stored) = subscriptions
            .get_mut(&id)
            .filter(|s| s.claim_token == Some(claim_token))
            .filter(|s| s.profile.status.is_renewable())
        else {
            return Ok(false);
        };
        stored.claimed_until = Some(now + lease);
        Ok(true)
    }

    async fn record_payment_without_claim(
        &self,
        id: Uuid,
        claim_token: Uuid,
        cycle_date: DateTime<Utc>,
        record: &PaymentRecord,
        error: &str,
    ) -> AppResult<SubscriptionProfile> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let stored = subscriptions
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Subscription not found"))?;

        let profile = &mut stored.profile;
        if profile.next_shipment_date == cycle_date {
            profile.next_shipment_date =
                advance_shipment_date(profile.next_shipment_date, profile.subscription_days);
            profile.retry_count = 0;
            profile.next_attempt_at = None;
        }
        let claim_is_ours = stored.claim_token.is_none_or(|token| token == claim_token);
        if claim_is_ours {
            profile.payment_status = PaymentStatus::Completed;
        }
        profile.last_error = Some(error.to_string());
        profile.last_error_date = Some(record.processed_at);
        profile.last_processed_at = Some(record.processed_at);
        profile.payment_history.push(record.clone());
        profile.updated_at = Some(Utc::now());
        if stored.claim_token == Some(claim_token) {
            stored.claim_token = None;
            stored.claimed_until = None;
        }

        Ok(stored.profile.clone())
    }

    async fn release_claim(
        &self,
        id: Uuid,
        claim_token: Uuid,
        restore_payment_status: PaymentStatus,
    ) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let stored = subscriptions
            .get_mut(&id)
            .filter(|s| s.claim_token == Some(claim_token))
            .ok_or(AppError::ClaimLost)?;
        stored.claim_token = None;
        stored.claimed_until = None;
        stored.profile.payment_status = restore_payment_status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_subscription;

    #[tokio::test]
    async fn claim_is_exclusive_until_lease_expires() {
        let repo = InMemorySubscriptionRepo::new();
        let now = Utc::now();
        let sub = create_test_subscription(|_| {});
        repo.insert(sub.clone());

        let first = repo.claim_due(now, 4, Duration::minutes(5), 10).await.unwrap();
        let second = repo.claim_due(now, 4, Duration::minutes(5), 10).await.unwrap();
        let after_expiry = repo
            .claim_due(now + Duration::minutes(6), 4, Duration::minutes(5), 10)
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].previous_payment_status, PaymentStatus::Pending);
        assert_eq!(first[0].subscription.payment_status, PaymentStatus::Processing);
        assert!(second.is_empty());
        assert_eq!(after_expiry.len(), 1);
        assert_ne!(after_expiry[0].claim_token, first[0].claim_token);
    }

    #[tokio::test]
    async fn release_restores_payment_status() {
        let repo = InMemorySubscriptionRepo::new();
        let sub = create_test_subscription(|s| s.payment_status = PaymentStatus::Failed);
        repo.insert(sub.clone());
        let claim = repo
            .claim_due(Utc::now(), 4, Duration::minutes(5), 10)
            .await
            .unwrap()
            .remove(0);

        repo.release_claim(sub.id, claim.claim_token, claim.previous_payment_status)
            .await
            .unwrap();

        assert!(!repo.is_claimed(sub.id));
        assert_eq!(repo.get(sub.id).unwrap().payment_status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn extend_claim_requires_current_token() {
        let repo = InMemorySubscriptionRepo::new();
        let now = Utc::now();
        let sub = create_test_subscription(|_| {});
        repo.insert(sub.clone());
        let claim = repo
            .claim_due(now, 4, Duration::minutes(5), 10)
            .await
            .unwrap()
            .remove(0);

        let later = now + Duration::minutes(4);
        assert!(repo
            .extend_claim(sub.id, claim.claim_token, later, Duration::minutes(5))
            .await
            .unwrap());
        assert_eq!(repo.claimed_until(sub.id), Some(later + Duration::minutes(5)));

        repo.steal_claim(sub.id);
        assert!(!repo
            .extend_claim(sub.id, claim.claim_token, later, Duration::minutes(5))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn payment_without_claim_advances_each_cycle_once() {
        let repo = InMemorySubscriptionRepo::new();
        let sub = create_test_subscription(|s| s.subscription_days = 30);
        repo.insert(sub.clone());
        let record = PaymentRecord {
            order_id: Some(501),
            amount_cents: Some(2499),
            status: PaymentStatus::Completed,
            transaction_id: None,
            payment_method: None,
            processed_at: Utc::now(),
            error_message: None,
        };

        let first = repo
            .record_payment_without_claim(
                sub.id,
                Uuid::new_v4(),
                sub.next_shipment_date,
                &record,
                "late",
            )
            .await
            .unwrap();
        let second = repo
            .record_payment_without_claim(
                sub.id,
                Uuid::new_v4(),
                sub.next_shipment_date,
                &record,
                "late",
            )
            .await
            .unwrap();

        assert_eq!(first.next_shipment_date, sub.next_shipment_date + Duration::days(30));
        assert_eq!(second.next_shipment_date, first.next_shipment_date);
        assert_eq!(second.payment_history.len(), 2);
        assert_eq!(second.last_error.as_deref(), Some("late"));
    }
}
