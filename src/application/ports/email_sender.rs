use async_trait::async_trait;

use crate::app_error::AppResult;

/// Outbound notification sink. Delivery is best effort.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()>;
}
