use std::sync::Arc;

use serde::Serialize;

use crate::app_error::AppResult;
use crate::application::ports::commerce_gateway::CommerceGateway;

/// Status the platform reports for a settled transaction
pub const TRANSACTION_STATUS_OK: &str = "ok";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionVerification {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub status: Option<String>,
    pub amount: Option<f64>,
    pub gateway: Option<String>,
    pub date: Option<String>,
}

impl TransactionVerification {
    fn missing() -> Self {
        Self {
            success: false,
            transaction_id: None,
            status: None,
            amount: None,
            gateway: None,
            date: None,
        }
    }
}

/// Reads the latest transaction of an order
#[derive(Clone)]
pub struct TransactionVerifier {
    gateway: Arc<dyn CommerceGateway>,
}

impl TransactionVerifier {
    pub fn new(gateway: Arc<dyn CommerceGateway>) -> Self {
        Self { gateway }
    }

    pub async fn verify(&self, order_id: i64) -> AppResult<TransactionVerification> {
        let transactions = self.gateway.list_transactions(order_id).await?;

        let Some(latest) = transactions.into_iter().last() else {
            tracing::debug!(order_id, "Order has no transactions");
            return Ok(TransactionVerification::missing());
        };

        Ok(TransactionVerification {
            success: latest.status == TRANSACTION_STATUS_OK,
            transaction_id: Some(latest.id),
            status: Some(latest.status),
            amount: latest.amount,
            gateway: latest.gateway,
            date: latest.date_created,
        })
    }
}
