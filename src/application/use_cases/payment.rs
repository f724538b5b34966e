use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::commerce_gateway::{
    CardInstrument, ChargeReceipt, ChargeRequest, CommerceGateway, OrderStatusChange,
    PaymentMethod,
};
use crate::application::use_cases::verification::TransactionVerifier;
use crate::domain::entities::payment_record::PaymentMethodKind;

pub const DEFAULT_ONLINE_METHOD_ID: &str = "braintree.card";

/// Card charged for renewals while the store runs its gateway in test mode
pub fn test_card() -> CardInstrument {
    CardInstrument {
        number: "4111111111111111".into(),
        cardholder_name: "John Doe".into(),
        expiry_month: 12,
        expiry_year: 2030,
        verification_value: "123".into(),
    }
}

/// Result of a payment that went through, online or cash on delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentOutcome {
    pub transaction_id: Option<String>,
    pub status: Option<String>,
    pub payment_method: PaymentMethodKind,
}

impl PaymentOutcome {
    fn cash_on_delivery() -> Self {
        Self {
            transaction_id: None,
            status: None,
            payment_method: PaymentMethodKind::CashOnDelivery,
        }
    }
}

/// Pays a renewal order online and falls back to cash on delivery.
///
/// Failures before or during the charge fall back to cash on delivery. Once a
/// charge is accepted there is no fallback: a transaction that does not verify
/// as `ok` fails the payment.
#[derive(Clone)]
pub struct PaymentProcessor {
    gateway: Arc<dyn CommerceGateway>,
    verifier: TransactionVerifier,
    online_method_id: String,
    card: CardInstrument,
}

impl PaymentProcessor {
    pub fn new(gateway: Arc<dyn CommerceGateway>, online_method_id: impl Into<String>) -> Self {
        Self {
            verifier: TransactionVerifier::new(gateway.clone()),
            gateway,
            online_method_id: online_method_id.into(),
            card: test_card(),
        }
    }

    /// Errors are `AppError::PaymentDeclined` with every failure message of
    /// the attempt.
    #[instrument(skip(self))]
    pub async fn process_payment(&self, order_id: i64) -> AppResult<PaymentOutcome> {
        match self.charge_online(order_id).await {
            Ok(receipt) => self.settle_online(order_id, receipt).await,
            Err(online_err) => {
                tracing::warn!(
                    order_id,
                    error = %online_err,
                    "Online payment unavailable, falling back to cash on delivery"
                );
                self.fall_back_to_cash_on_delivery(order_id, online_err)
                    .await
            }
        }
    }

    async fn charge_online(&self, order_id: i64) -> AppResult<ChargeReceipt> {
        let methods = self.gateway.list_payment_methods(order_id).await?;
        let method = self.online_method(&methods)?;

        let token = self.gateway.create_payment_token(order_id).await?;
        let charge = ChargeRequest {
            payment_method_id: method.id.clone(),
            instrument: self.card.clone(),
            save_instrument: false,
        };
        let receipt = self.gateway.charge_payment(&token, &charge).await?;

        tracing::info!(
            order_id,
            payment_id = receipt.id.as_deref().unwrap_or("-"),
            "Online charge accepted"
        );
        Ok(receipt)
    }

    fn online_method<'a>(&self, methods: &'a [PaymentMethod]) -> AppResult<&'a PaymentMethod> {
        if methods.is_empty() {
            return Err(AppError::Configuration(
                "No payment methods available for order".into(),
            ));
        }
        let method = methods
            .iter()
            .find(|m| m.id == self.online_method_id)
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "Payment method {} is not configured",
                    self.online_method_id
                ))
            })?;
        if !method.test_mode {
            return Err(AppError::Configuration(format!(
                "Payment method {} is not in test mode",
                method.id
            )));
        }
        Ok(method)
    }

    async fn settle_online(
        &self,
        order_id: i64,
        receipt: ChargeReceipt,
    ) -> AppResult<PaymentOutcome> {
        if let Err(e) = self
            .gateway
            .update_order_status(order_id, OrderStatusChange::Captured)
            .await
        {
            tracing::warn!(order_id, error = %e, "Failed to mark order as captured");
        }

        let verification = self
            .verifier
            .verify(order_id)
            .await
            .map_err(|e| AppError::PaymentDeclined(format!("Transaction verification failed: {e}")))?;

        if !verification.success {
            return Err(AppError::PaymentDeclined(format!(
                "Transaction verification failed: status {}",
                verification.status.as_deref().unwrap_or("missing")
            )));
        }

        Ok(PaymentOutcome {
            transaction_id: verification.transaction_id.or(receipt.id),
            status: verification.status,
            payment_method: PaymentMethodKind::Online,
        })
    }

    async fn fall_back_to_cash_on_delivery(
        &self,
        order_id: i64,
        online_err: AppError,
    ) -> AppResult<PaymentOutcome> {
        match self
            .gateway
            .update_order_status(order_id, OrderStatusChange::CashOnDelivery)
            .await
        {
            Ok(()) => {
                tracing::info!(order_id, "Order set to cash on delivery");
                Ok(PaymentOutcome::cash_on_delivery())
            }
            Err(cod_err) => Err(AppError::PaymentDeclined(format!(
                "{online_err}; cash on delivery fallback failed: {cod_err}"
            ))),
        }
    }
}
