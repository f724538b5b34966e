use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use crate::app_error::{AppError, AppResult};
use crate::application::email_templates::{RenewalEmailDetails, renewal_confirmation_email};
use crate::application::ports::commerce_gateway::{
    CommerceGateway, CommerceOrder, GUEST_CUSTOMER_ID, NewCustomer, NewOrder,
    ORDER_STATUS_INCOMPLETE, OrderLine, OrderStatusChange,
};
use crate::application::ports::email_sender::EmailSender;
use crate::application::use_cases::payment::{PaymentOutcome, PaymentProcessor};
use crate::application::use_cases::subscription::{
    ClaimedSubscription, RenewalOutcome, SubscriptionProfile, SubscriptionRepo,
};
use crate::domain::entities::{
    address::{AddressSnapshot, OrderAddress},
    payment_record::{PaymentMethodKind, PaymentRecord, parse_money_cents},
    payment_status::PaymentStatus,
};

pub const DEFAULT_RETRY_BASE_SECS: i64 = 300;
pub const DEFAULT_RETRY_MAX_SECS: i64 = 21_600;

#[derive(Debug, Clone)]
pub struct RenewalOptions {
    pub channel_id: i64,
    /// Used when a guest's customer record exists but cannot be looked up
    pub default_customer_id: i64,
    /// Cancel renewal orders left behind by a failed attempt
    pub cancel_orphaned_orders: bool,
    pub retry_base_secs: i64,
    pub retry_max_secs: i64,
}

impl Default for RenewalOptions {
    fn default() -> Self {
        Self {
            channel_id: 1,
            default_customer_id: GUEST_CUSTOMER_ID,
            cancel_orphaned_orders: false,
            retry_base_secs: DEFAULT_RETRY_BASE_SECS,
            retry_max_secs: DEFAULT_RETRY_MAX_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenewalResult {
    pub success: bool,
    pub order_id: Option<i64>,
    pub transaction_id: Option<String>,
    pub payment_method: Option<PaymentMethodKind>,
    pub error: Option<String>,
}

impl RenewalResult {
    fn failed(order_id: Option<i64>, error: String) -> Self {
        Self {
            success: false,
            order_id,
            transaction_id: None,
            payment_method: None,
            error: Some(error),
        }
    }
}

/// What the saga knows about the renewal order so far
#[derive(Debug, Default)]
struct RenewalProgress {
    order_id: Option<i64>,
    total_cents: Option<i64>,
}

/// Delay before the next attempt after `retry_count` earlier failures
pub fn calculate_retry_delay(retry_count: i32, base_secs: i64, max_secs: i64) -> i64 {
    let exponential =
        base_secs.saturating_mul(4i64.saturating_pow(retry_count.max(0) as u32));
    let capped = exponential.min(max_secs);
    let jitter = (rand::random::<u64>() % 60) as i64;
    capped + jitter
}

/// Runs the renewal of one claimed subscription and records the attempt.
#[derive(Clone)]
pub struct RenewalOrchestrator {
    repo: Arc<dyn SubscriptionRepo>,
    gateway: Arc<dyn CommerceGateway>,
    payments: PaymentProcessor,
    email_sender: Arc<dyn EmailSender>,
    options: RenewalOptions,
}

impl RenewalOrchestrator {
    pub fn new(
        repo: Arc<dyn SubscriptionRepo>,
        gateway: Arc<dyn CommerceGateway>,
        payments: PaymentProcessor,
        email_sender: Arc<dyn EmailSender>,
        options: RenewalOptions,
    ) -> Self {
        Self {
            repo,
            gateway,
            payments,
            email_sender,
            options,
        }
    }

    #[instrument(skip(self, claimed), fields(subscription_id = %claimed.subscription.id))]
    pub async fn renew(&self, claimed: &ClaimedSubscription) -> RenewalResult {
        let subscription = &claimed.subscription;
        let mut progress = RenewalProgress::default();

        match self.run_saga(subscription, &mut progress).await {
            Ok(payment) => self.record_success(claimed, &progress, payment).await,
            Err(e) => {
                tracing::warn!(
                    order_id = ?progress.order_id,
                    error = %e,
                    "Renewal attempt failed"
                );
                if let Some(order_id) = progress.order_id {
                    self.cancel_orphaned_order(order_id).await;
                }
                self.record_failure(claimed, progress.order_id, progress.total_cents, e.to_string())
                    .await
            }
        }
    }

    /// Record a failed attempt for a claim whose saga never produced a result
    pub async fn record_aborted(&self, claimed: &ClaimedSubscription, error: String) -> RenewalResult {
        self.record_failure(claimed, None, None, error).await
    }

    async fn run_saga(
        &self,
        subscription: &SubscriptionProfile,
        progress: &mut RenewalProgress,
    ) -> AppResult<PaymentOutcome> {
        let order = self.gateway.get_order(subscription.order_id).await?;

        let product = self
            .gateway
            .find_products_by_sku(&subscription.sku)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("Product not found"))?;

        let variant = self
            .gateway
            .list_variants(product.id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("Variant not found"))?;

        let unit_price = variant.unit_price(&product).ok_or_else(|| {
            AppError::InvalidInput(format!("Product {} has no price", product.id))
        })?;

        let billing = resolve_address(&subscription.billing_address, &order.billing_address, "Billing")?;
        let shipping =
            resolve_address(&subscription.shipping_address, &order.billing_address, "Shipping")?;

        let customer_id = self.resolve_customer(subscription, &order).await?;

        let created = self
            .gateway
            .create_order(&NewOrder {
                status_id: ORDER_STATUS_INCOMPLETE,
                customer_id,
                billing_address: billing,
                shipping_address: shipping,
                line: OrderLine {
                    product_id: product.id,
                    variant_id: variant.id,
                    quantity: subscription.quantity.max(1),
                    unit_price,
                },
                channel_id: self.options.channel_id,
            })
            .await?;

        progress.order_id = Some(created.id);
        progress.total_cents = created.total_inc_tax.as_deref().and_then(parse_money_cents);
        tracing::info!(order_id = created.id, customer_id, "Renewal order created");

        self.payments.process_payment(created.id).await
    }

    async fn resolve_customer(
        &self,
        subscription: &SubscriptionProfile,
        order: &CommerceOrder,
    ) -> AppResult<i64> {
        if order.customer_id != GUEST_CUSTOMER_ID {
            return Ok(order.customer_id);
        }

        let snapshot = subscription.billing_address.or(&order.billing_address);
        let address = snapshot.to_order_address().map_err(|missing| {
            AppError::InvalidInput(format!(
                "Billing address is missing: {}",
                missing.join(", ")
            ))
        })?;
        let customer = NewCustomer {
            email: address.email.clone(),
            first_name: address.first_name.clone(),
            last_name: address.last_name.clone(),
            phone: address.phone.clone(),
            channel_id: self.options.channel_id,
            address,
        };

        match self.gateway.create_customer(&customer).await {
            Ok(id) => {
                tracing::info!(customer_id = id, "Customer created for guest order");
                Ok(id)
            }
            Err(AppError::Conflict(_)) => {
                let existing = self
                    .gateway
                    .find_customer_id_by_email(&customer.email)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "Existing customer lookup failed");
                        None
                    });
                let id = existing.unwrap_or(self.options.default_customer_id);
                tracing::info!(customer_id = id, "Customer already exists, reusing");
                Ok(id)
            }
            Err(e) => Err(e),
        }
    }

    async fn cancel_orphaned_order(&self, order_id: i64) {
        if !self.options.cancel_orphaned_orders {
            return;
        }
        match self
            .gateway
            .update_order_status(order_id, OrderStatusChange::Cancelled)
            .await
        {
            Ok(()) => tracing::info!(order_id, "Cancelled orphaned renewal order"),
            Err(e) => {
                tracing::warn!(order_id, error = %e, "Failed to cancel orphaned renewal order")
            }
        }
    }

    async fn record_success(
        &self,
        claimed: &ClaimedSubscription,
        progress: &RenewalProgress,
        payment: PaymentOutcome,
    ) -> RenewalResult {
        let subscription = &claimed.subscription;
        let record = PaymentRecord {
            order_id: progress.order_id,
            amount_cents: progress.total_cents,
            status: PaymentStatus::Completed,
            transaction_id: payment.transaction_id.clone(),
            payment_method: Some(payment.payment_method),
            processed_at: Utc::now(),
            error_message: None,
        };
        let outcome = RenewalOutcome::Completed {
            record: record.clone(),
        };

        let updated = match self
            .repo
            .apply_renewal_outcome(subscription.id, claimed.claim_token, &outcome)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                // The customer has paid: the order must reach the history even
                // though the claim no longer guards the write.
                tracing::warn!(
                    order_id = ?progress.order_id,
                    error = %e,
                    "Renewal paid but its claim could not be settled"
                );
                match self
                    .repo
                    .record_payment_without_claim(
                        subscription.id,
                        claimed.claim_token,
                        subscription.next_shipment_date,
                        &record,
                        &format!("Renewal paid after its claim was lost: {e}"),
                    )
                    .await
                {
                    Ok(updated) => updated,
                    Err(fallback) => {
                        tracing::error!(
                            order_id = ?progress.order_id,
                            error = %fallback,
                            "Renewal paid but could not be recorded"
                        );
                        return RenewalResult::failed(
                            progress.order_id,
                            format!("Failed to record renewal: {fallback}"),
                        );
                    }
                }
            }
        };

        tracing::info!(
            order_id = ?progress.order_id,
            payment_method = %payment.payment_method,
            next_shipment_date = %updated.next_shipment_date,
            "Renewal completed"
        );

        if let Some(order_id) = progress.order_id {
            self.notify(&updated, order_id, progress.total_cents, payment.payment_method);
        }

        RenewalResult {
            success: true,
            order_id: progress.order_id,
            transaction_id: payment.transaction_id,
            payment_method: Some(payment.payment_method),
            error: None,
        }
    }

    async fn record_failure(
        &self,
        claimed: &ClaimedSubscription,
        order_id: Option<i64>,
        total_cents: Option<i64>,
        error: String,
    ) -> RenewalResult {
        let subscription = &claimed.subscription;
        let now = Utc::now();
        let outcome = RenewalOutcome::Failed {
            record: PaymentRecord {
                order_id,
                amount_cents: total_cents,
                status: PaymentStatus::Failed,
                transaction_id: None,
                payment_method: None,
                processed_at: now,
                error_message: Some(error.clone()),
            },
            error: error.clone(),
            retry_at: self.retry_at(now, subscription.retry_count),
        };

        if let Err(e) = self
            .repo
            .apply_renewal_outcome(subscription.id, claimed.claim_token, &outcome)
            .await
        {
            tracing::error!(error = %e, "Failed to record renewal failure");
        }

        RenewalResult::failed(order_id, error)
    }

    fn retry_at(&self, now: DateTime<Utc>, retry_count: i32) -> DateTime<Utc> {
        let delay = calculate_retry_delay(
            retry_count,
            self.options.retry_base_secs,
            self.options.retry_max_secs,
        );
        now + chrono::Duration::seconds(delay)
    }

    fn notify(
        &self,
        subscription: &SubscriptionProfile,
        order_id: i64,
        total_cents: Option<i64>,
        payment_method: PaymentMethodKind,
    ) {
        let (subject, html) = renewal_confirmation_email(&RenewalEmailDetails {
            order_id,
            product_name: &subscription.product_name,
            quantity: subscription.quantity,
            total_cents,
            payment_method: payment_method.label(),
            next_shipment_date: subscription.next_shipment_date,
        });
        let to = subscription.email.clone();
        let sender = self.email_sender.clone();
        let subscription_id = subscription.id;

        tokio::spawn(async move {
            if let Err(e) = sender.send(&to, &subject, &html).await {
                tracing::warn!(
                    %subscription_id,
                    order_id,
                    error = %e,
                    "Failed to send renewal confirmation"
                );
            }
        });
    }
}

fn resolve_address(
    preferred: &AddressSnapshot,
    fallback: &AddressSnapshot,
    label: &str,
) -> AppResult<OrderAddress> {
    preferred.or(fallback).to_order_address().map_err(|missing| {
        AppError::InvalidInput(format!("{label} address is missing: {}", missing.join(", ")))
    })
}
