//! BigCommerce REST client.
//!
//! Speaks the v2 orders API, the v3 catalog/customers/payments APIs and the
//! separate payments host. Reads are retried on transport errors, 429 and 5xx;
//! writes are sent once.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use crate::app_error::{AppError, AppResult};
use crate::infra::config::GatewayConfig;

const AUTH_HEADER: &str = "X-Auth-Token";
const PAYMENTS_ACCEPT: &str = "application/vnd.bc.v1+json";
const CONFLICT_MARKER: &str = "already in use";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BcAddress {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub street_1: Option<String>,
    pub street_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub country_iso2: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BcOrder {
    pub id: i64,
    #[serde(default)]
    pub customer_id: i64,
    #[serde(default)]
    pub billing_address: BcAddress,
    pub total_inc_tax: Option<String>,
    #[serde(default)]
    pub order_is_digital: bool,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BcCreatedOrder {
    pub id: i64,
    pub total_inc_tax: Option<String>,
    pub date_created: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BcProduct {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub sku: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BcVariant {
    pub id: i64,
    pub product_id: i64,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub calculated_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BcCustomer {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BcPaymentMethod {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub test_mode: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BcAccessToken {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BcPayment {
    pub id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BcTransaction {
    /// Numeric on most stores, string on some
    pub id: serde_json::Value,
    pub status: String,
    pub amount: Option<f64>,
    pub gateway: Option<String>,
    pub date_created: Option<String>,
}

impl BcTransaction {
    pub fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct BcCustomerAddress {
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state_or_province: String,
    pub postal_code: String,
    pub country_code: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BcCustomerCreate {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub addresses: Vec<BcCustomerAddress>,
    pub origin_channel_id: i64,
    pub channel_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BcOrderProduct {
    pub product_id: i64,
    pub quantity: i32,
    pub variant_id: i64,
    pub price_inc_tax: f64,
    pub price_ex_tax: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BcOrderCreate {
    pub customer_id: i64,
    pub status_id: i32,
    pub billing_address: BcAddress,
    pub shipping_addresses: Vec<BcAddress>,
    pub products: Vec<BcOrderProduct>,
    pub channel_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BcOrderUpdate {
    pub status_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<&'static str>,
    /// Serialized as `null` when the key is present
    #[serde(skip_serializing_if = "PaymentProviderField::is_absent")]
    pub payment_provider_id: PaymentProviderField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProviderField {
    Absent,
    Cleared,
}

impl PaymentProviderField {
    fn is_absent(&self) -> bool {
        *self == PaymentProviderField::Absent
    }
}

impl Serialize for PaymentProviderField {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BcCardInstrument {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub number: String,
    pub cardholder_name: String,
    pub expiry_month: u32,
    pub expiry_year: u32,
    pub verification_value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BcPaymentBody {
    pub instrument: BcCardInstrument,
    pub payment_method_id: String,
    pub save_instrument: bool,
}

#[derive(Debug, Clone, Serialize)]
struct BcPaymentRequest<'a> {
    payment: &'a BcPaymentBody,
}

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct BigCommerceClient {
    client: Client,
    config: GatewayConfig,
}

impl BigCommerceClient {
    pub fn new(client: Client, config: GatewayConfig) -> Self {
        Self { client, config }
    }

    fn api_url(&self, path: &str) -> AppResult<Url> {
        self.config
            .api_base
            .join(&format!("stores/{}/{}", self.config.store_hash, path))
            .map_err(|e| AppError::Internal(format!("invalid BigCommerce URL: {e}")))
    }

    fn payments_url(&self) -> AppResult<Url> {
        self.config
            .payments_base
            .join(&format!("stores/{}/payments", self.config.store_hash))
            .map_err(|e| AppError::Internal(format!("invalid payments URL: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTH_HEADER, self.config.access_token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    // ========================================================================
    // Orders
    // ========================================================================

    pub async fn get_order(&self, order_id: i64) -> AppResult<BcOrder> {
        let url = self.api_url(&format!("v2/orders/{order_id}"))?;
        self.get_json("Order fetch", url, &[]).await
    }

    pub async fn create_order(&self, order: &BcOrderCreate) -> AppResult<BcCreatedOrder> {
        let url = self.api_url("v2/orders")?;
        let response = self
            .request(Method::POST, url)
            .json(order)
            .send()
            .await
            .map_err(|e| transport("Order creation", e))?;
        handle_response("Order creation", response).await
    }

    pub async fn update_order(&self, order_id: i64, update: &BcOrderUpdate) -> AppResult<()> {
        let url = self.api_url(&format!("v2/orders/{order_id}"))?;
        let response = self
            .request(Method::PUT, url)
            .json(update)
            .send()
            .await
            .map_err(|e| transport("Order status update", e))?;
        let _: serde_json::Value = handle_response("Order status update", response).await?;
        Ok(())
    }

    pub async fn list_transactions(&self, order_id: i64) -> AppResult<Vec<BcTransaction>> {
        let url = self.api_url(&format!("v2/orders/{order_id}/transactions"))?;
        let transactions: Option<Vec<BcTransaction>> =
            self.get_json("Transaction fetch", url, &[]).await?;
        Ok(transactions.unwrap_or_default())
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    pub async fn find_products_by_sku(&self, sku: &str) -> AppResult<Vec<BcProduct>> {
        let url = self.api_url("v3/catalog/products")?;
        let envelope: DataEnvelope<Vec<BcProduct>> =
            self.get_json("Product lookup", url, &[("sku", sku)]).await?;
        Ok(envelope.data)
    }

    pub async fn list_variants(&self, product_id: i64) -> AppResult<Vec<BcVariant>> {
        let url = self.api_url(&format!("v3/catalog/products/{product_id}/variants"))?;
        let envelope: DataEnvelope<Vec<BcVariant>> =
            self.get_json("Variant lookup", url, &[]).await?;
        Ok(envelope.data)
    }

    // ========================================================================
    // Customers
    // ========================================================================

    pub async fn create_customer(&self, customer: &BcCustomerCreate) -> AppResult<BcCustomer> {
        let url = self.api_url("v3/customers")?;
        let response = self
            .request(Method::POST, url)
            .json(&[customer])
            .send()
            .await
            .map_err(|e| transport("Customer creation", e))?;
        let envelope: DataEnvelope<Vec<BcCustomer>> =
            handle_response("Customer creation", response).await?;
        envelope.data.into_iter().next().ok_or_else(|| AppError::Parse {
            operation: "Customer creation".into(),
            message: "response contained no customer".into(),
        })
    }

    pub async fn find_customers_by_email(&self, email: &str) -> AppResult<Vec<BcCustomer>> {
        let url = self.api_url("v3/customers")?;
        let envelope: DataEnvelope<Vec<BcCustomer>> = self
            .get_json("Customer lookup", url, &[("email:in", email)])
            .await?;
        Ok(envelope.data)
    }

    // ========================================================================
    // Payments
    // ========================================================================

    pub async fn list_payment_methods(&self, order_id: i64) -> AppResult<Vec<BcPaymentMethod>> {
        let url = self.api_url("v3/payments/methods")?;
        let order_id = order_id.to_string();
        let envelope: DataEnvelope<Vec<BcPaymentMethod>> = self
            .get_json("Payment methods fetch", url, &[("order_id", &order_id)])
            .await?;
        Ok(envelope.data)
    }

    pub async fn create_payment_token(&self, order_id: i64) -> AppResult<BcAccessToken> {
        let url = self.api_url("v3/payments/access_tokens")?;
        let body = serde_json::json!({ "order": { "id": order_id } });
        let response = self
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport("Payment token creation", e))?;
        let envelope: DataEnvelope<BcAccessToken> =
            handle_response("Payment token creation", response).await?;
        Ok(envelope.data)
    }

    pub async fn process_payment(
        &self,
        access_token: &str,
        payment: &BcPaymentBody,
    ) -> AppResult<BcPayment> {
        let url = self.payments_url()?;
        let response = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, format!("PAT {access_token}"))
            .header(reqwest::header::ACCEPT, PAYMENTS_ACCEPT)
            .json(&BcPaymentRequest { payment })
            .send()
            .await
            .map_err(|e| transport("Payment processing", e))?;
        let envelope: DataEnvelope<BcPayment> =
            handle_response("Payment processing", response).await?;
        Ok(envelope.data)
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// GET with bounded retries. A 204 decodes as JSON `null`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: Url,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let max_attempts = self.config.get_max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = self
                .request(Method::GET, url.clone())
                .query(query)
                .send()
                .await;

            let retryable = match &result {
                Ok(response) => is_retryable_status(response.status()),
                Err(_) => true,
            };

            if retryable && attempt < max_attempts {
                let delay = retry_delay(self.config.retry_base_delay, attempt);
                match &result {
                    Ok(response) => tracing::warn!(
                        operation,
                        attempt,
                        status = %response.status(),
                        delay_ms = delay.as_millis() as u64,
                        "Retrying BigCommerce read"
                    ),
                    Err(e) => tracing::warn!(
                        operation,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying BigCommerce read"
                    ),
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let response = result.map_err(|e| transport(operation, e))?;
            return handle_response(operation, response).await;
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Doubling delay before retry number `attempt` (1-based)
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

fn transport(operation: &str, err: reqwest::Error) -> AppError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    AppError::Transport {
        operation: operation.to_string(),
        message,
    }
}

async fn handle_response<T: DeserializeOwned>(
    operation: &str,
    response: reqwest::Response,
) -> AppResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport(operation, e))?;

    if !status.is_success() {
        tracing::error!(operation, status = %status, body = %body, "BigCommerce API error");

        if (status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY)
            && body.contains(CONFLICT_MARKER)
        {
            return Err(AppError::Conflict(body));
        }
        return Err(AppError::Gateway {
            operation: operation.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let body = if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
        "null"
    } else {
        body.as_str()
    };

    serde_json::from_str(body).map_err(|e| {
        tracing::error!(operation, error = %e, "Failed to parse BigCommerce response");
        AppError::Parse {
            operation: operation.to_string(),
            message: e.to_string(),
        }
    })
}
