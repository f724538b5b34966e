use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::commerce_gateway::{CommerceGateway, GUEST_CUSTOMER_ID};
use crate::domain::entities::{
    address::AddressSnapshot, cadence::parse_cadence_days, payment_record::PaymentRecord,
    payment_status::PaymentStatus, subscription_status::SubscriptionStatus,
};

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// Returns `AppError::Conflict` when the order already has a subscription
    /// for the same SKU.
    async fn create(&self, subscription: &NewSubscription) -> AppResult<SubscriptionProfile>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>>;

    /// Compare-and-set on `status`. Returns `None` when the stored status no
    /// longer equals `expected`.
    async fn set_status(
        &self,
        id: Uuid,
        expected: SubscriptionStatus,
        new_status: SubscriptionStatus,
    ) -> AppResult<Option<SubscriptionProfile>>;

    /// Active subscriptions with `now < next_shipment_date <= now + look_ahead_days`.
    /// Read-only, ignores claims and the retry gate.
    async fn find_active_due(
        &self,
        now: DateTime<Utc>,
        look_ahead_days: i64,
    ) -> AppResult<Vec<SubscriptionProfile>>;

    /// Atomically claim up to `limit` due subscriptions that are not under a
    /// live claim and whose retry gate is open. Claimed rows move to
    /// `payment_status = processing` until the outcome is applied.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        look_ahead_days: i64,
        lease: Duration,
        limit: i64,
    ) -> AppResult<Vec<ClaimedSubscription>>;

    /// Record one renewal attempt and release the claim in a single update.
    /// Fails with `AppError::ClaimLost` when `claim_token` no longer holds.
    async fn apply_renewal_outcome(
        &self,
        id: Uuid,
        claim_token: Uuid,
        outcome: &RenewalOutcome,
    ) -> AppResult<SubscriptionProfile>;

    /// Compare-and-set on `claim_token`: push `claimed_until` to `now + lease`.
    /// Returns `false` when the claim is no longer held or the subscription
    /// left the active state.
    async fn extend_claim(
        &self,
        id: Uuid,
        claim_token: Uuid,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> AppResult<bool>;

    /// Append a paid attempt regardless of who holds the claim.
    ///
    /// Used when the claimed write failed after the customer was charged.
    /// The shipment date advances only if it still equals `cycle_date`, so a
    /// cycle is never advanced twice. `error` lands in `last_error`. The claim
    /// is cleared only when it is still `claim_token`.
    async fn record_payment_without_claim(
        &self,
        id: Uuid,
        claim_token: Uuid,
        cycle_date: DateTime<Utc>,
        record: &PaymentRecord,
        error: &str,
    ) -> AppResult<SubscriptionProfile>;

    /// Give a claim back without recording an attempt
    async fn release_claim(
        &self,
        id: Uuid,
        claim_token: Uuid,
        restore_payment_status: PaymentStatus,
    ) -> AppResult<()>;
}

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionProfile {
    pub id: Uuid,
    pub order_id: i64,
    pub customer_id: Option<i64>,
    pub email: String,
    pub product_id: i64,
    pub sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub billing_address: AddressSnapshot,
    pub shipping_address: AddressSnapshot,
    pub subscription_days: i32,
    pub start_date: DateTime<Utc>,
    pub next_shipment_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub payment_status: PaymentStatus,
    pub payment_history: Vec<PaymentRecord>,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_date: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub order_id: i64,
    pub customer_id: Option<i64>,
    pub email: String,
    pub product_id: i64,
    pub sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub billing_address: AddressSnapshot,
    pub shipping_address: AddressSnapshot,
    pub subscription_days: i32,
    pub start_date: DateTime<Utc>,
    pub next_shipment_date: DateTime<Utc>,
}

/// A subscription held under a renewal lease
#[derive(Debug, Clone)]
pub struct ClaimedSubscription {
    pub claim_token: Uuid,
    /// Payment status before the claim moved it to `processing`
    pub previous_payment_status: PaymentStatus,
    pub subscription: SubscriptionProfile,
}

/// What a renewal attempt writes back to the store
#[derive(Debug, Clone)]
pub enum RenewalOutcome {
    /// Advance `next_shipment_date` by `subscription_days`, reset failure
    /// bookkeeping, append `record`.
    Completed { record: PaymentRecord },
    /// Increment `retry_count`, keep the shipment date, append `record` and
    /// close the retry gate until `retry_at`.
    Failed {
        record: PaymentRecord,
        error: String,
        retry_at: DateTime<Utc>,
    },
}

impl RenewalOutcome {
    pub fn record(&self) -> &PaymentRecord {
        match self {
            RenewalOutcome::Completed { record } | RenewalOutcome::Failed { record, .. } => record,
        }
    }
}

// ============================================================================
// Enrollment Types
// ============================================================================

/// One subscription line picked at checkout
#[derive(Debug, Clone, serde::Deserialize)]
pub struct EnrollmentSelection {
    pub sku: String,
    pub product_name: String,
    /// Storefront option text such as "Every 30 days"
    pub cadence_label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSelection {
    pub sku: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentReport {
    pub order_id: i64,
    pub created: Vec<SubscriptionProfile>,
    pub skipped: Vec<SkippedSelection>,
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct SubscriptionUseCases {
    repo: Arc<dyn SubscriptionRepo>,
    gateway: Arc<dyn CommerceGateway>,
}

impl SubscriptionUseCases {
    pub fn new(repo: Arc<dyn SubscriptionRepo>, gateway: Arc<dyn CommerceGateway>) -> Self {
        Self { repo, gateway }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Subscription not found"))
    }

    /// Create pending subscriptions for the subscription lines of an order.
    ///
    /// Lines without a usable cadence, without a matching product or variant,
    /// or already enrolled are skipped and reported.
    #[instrument(skip(self, selections), fields(selections = selections.len()))]
    pub async fn enroll_from_order(
        &self,
        order_id: i64,
        selections: &[EnrollmentSelection],
    ) -> AppResult<EnrollmentReport> {
        if selections.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one subscription selection is required".into(),
            ));
        }

        let order = self.gateway.get_order(order_id).await?;
        let email = order
            .billing_address
            .email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput("Order has no billing email".into()))?;
        let customer_id = (order.customer_id != GUEST_CUSTOMER_ID).then_some(order.customer_id);

        let mut report = EnrollmentReport {
            order_id,
            created: Vec::new(),
            skipped: Vec::new(),
        };

        for selection in selections {
            let skip = |reason: &str| SkippedSelection {
                sku: selection.sku.clone(),
                reason: reason.to_string(),
            };

            let Some(days) = parse_cadence_days(&selection.cadence_label) else {
                report.skipped.push(skip("No renewal period in cadence label"));
                continue;
            };

            let Some(product) = self
                .gateway
                .find_products_by_sku(&selection.sku)
                .await?
                .into_iter()
                .next()
            else {
                report.skipped.push(skip("Product not found"));
                continue;
            };

            if self.gateway.list_variants(product.id).await?.is_empty() {
                report.skipped.push(skip("Variant not found"));
                continue;
            }

            let now = Utc::now();
            let new_subscription = NewSubscription {
                order_id,
                customer_id,
                email: email.clone(),
                product_id: product.id,
                sku: selection.sku.clone(),
                product_name: selection.product_name.clone(),
                quantity: 1,
                billing_address: order.billing_address.clone(),
                shipping_address: order.billing_address.clone(),
                subscription_days: days,
                start_date: now,
                next_shipment_date: now + Duration::days(days as i64),
            };

            match self.repo.create(&new_subscription).await {
                Ok(profile) => {
                    tracing::info!(
                        subscription_id = %profile.id,
                        order_id,
                        sku = %profile.sku,
                        subscription_days = days,
                        "Subscription enrolled"
                    );
                    report.created.push(profile);
                }
                Err(AppError::Conflict(_)) => {
                    report.skipped.push(skip("Already enrolled"));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    /// Subscriptions the next tick would consider, soonest first
    pub async fn list_due(
        &self,
        now: DateTime<Utc>,
        look_ahead_days: i64,
    ) -> AppResult<Vec<SubscriptionProfile>> {
        self.repo.find_active_due(now, look_ahead_days).await
    }

    pub async fn activate(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        self.transition(id, SubscriptionStatus::Active).await
    }

    pub async fn cancel(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        self.transition(id, SubscriptionStatus::Cancelled).await
    }

    async fn transition(
        &self,
        id: Uuid,
        new_status: SubscriptionStatus,
    ) -> AppResult<SubscriptionProfile> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(new_status) {
            return Err(AppError::InvalidInput(format!(
                "Cannot move subscription from {} to {}",
                current.status, new_status
            )));
        }

        let updated = self
            .repo
            .set_status(id, current.status, new_status)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Subscription status changed concurrently".into())
            })?;

        tracing::info!(
            subscription_id = %id,
            from = %current.status,
            to = %new_status,
            "Subscription status changed"
        );
        Ok(updated)
    }
}
