use async_trait::async_trait;
use serde::Serialize;

use crate::{
    app_error::AppResult,
    domain::entities::address::{AddressSnapshot, OrderAddress},
};

// ============================================================================
// Port Types - platform-agnostic commerce types
// ============================================================================

/// BigCommerce status id for an order that has not been paid yet
pub const ORDER_STATUS_INCOMPLETE: i32 = 0;
pub const ORDER_STATUS_CANCELLED: i32 = 5;
pub const ORDER_STATUS_AWAITING_FULFILLMENT: i32 = 11;

/// Customer id the platform uses for guest checkouts
pub const GUEST_CUSTOMER_ID: i64 = 0;

#[derive(Debug, Clone)]
pub struct CommerceOrder {
    pub id: i64,
    /// 0 for guest orders
    pub customer_id: i64,
    pub billing_address: AddressSnapshot,
    pub total_inc_tax: Option<String>,
    pub is_digital: bool,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ProductVariant {
    pub id: i64,
    pub product_id: i64,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub calculated_price: Option<f64>,
}

impl ProductVariant {
    /// Unit price for a renewal order line: the variant's calculated price,
    /// then its list price, then the product's price.
    pub fn unit_price(&self, product: &Product) -> Option<f64> {
        self.calculated_price
            .or(self.price)
            .or(product.price)
            .filter(|p| *p >= 0.0)
    }
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: OrderAddress,
    pub channel_id: i64,
}

#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: i64,
    pub variant_id: i64,
    pub quantity: i32,
    pub unit_price: f64,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub status_id: i32,
    pub customer_id: i64,
    pub billing_address: OrderAddress,
    pub shipping_address: OrderAddress,
    pub line: OrderLine,
    pub channel_id: i64,
}

#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub id: i64,
    pub total_inc_tax: Option<String>,
    pub date_created: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethod {
    pub id: String,
    pub name: Option<String>,
    pub test_mode: bool,
}

/// Short-lived token that authorizes one payment against one order
#[derive(Clone)]
pub struct PaymentAccessToken(pub String);

impl PaymentAccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PaymentAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PaymentAccessToken(..)")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CardInstrument {
    pub number: String,
    pub cardholder_name: String,
    pub expiry_month: u32,
    pub expiry_year: u32,
    pub verification_value: String,
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub payment_method_id: String,
    pub instrument: CardInstrument,
    pub save_instrument: bool,
}

#[derive(Debug, Clone)]
pub struct ChargeReceipt {
    pub id: Option<String>,
    pub status: Option<String>,
}

/// Status transitions the renewal flow applies to an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatusChange {
    /// Paid online: awaiting fulfillment, payment captured
    Captured,
    /// Awaiting fulfillment, to be paid on delivery
    CashOnDelivery,
    /// Compensation for a renewal order whose payment never completed
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderTransaction {
    pub id: String,
    pub status: String,
    pub amount: Option<f64>,
    pub gateway: Option<String>,
    pub date_created: Option<String>,
}

// ============================================================================
// Port Trait
// ============================================================================

/// Remote commerce platform used by enrollment, renewal and payment.
///
/// Implementations turn non-success responses into `AppError::Gateway` with
/// the response body attached, and malformed bodies into `AppError::Parse`.
#[async_trait]
pub trait CommerceGateway: Send + Sync {
    async fn get_order(&self, order_id: i64) -> AppResult<CommerceOrder>;

    async fn find_products_by_sku(&self, sku: &str) -> AppResult<Vec<Product>>;

    async fn list_variants(&self, product_id: i64) -> AppResult<Vec<ProductVariant>>;

    /// Returns `AppError::Conflict` when a customer with that email exists
    async fn create_customer(&self, customer: &NewCustomer) -> AppResult<i64>;

    async fn find_customer_id_by_email(&self, email: &str) -> AppResult<Option<i64>>;

    async fn create_order(&self, order: &NewOrder) -> AppResult<CreatedOrder>;

    async fn list_payment_methods(&self, order_id: i64) -> AppResult<Vec<PaymentMethod>>;

    async fn create_payment_token(&self, order_id: i64) -> AppResult<PaymentAccessToken>;

    async fn charge_payment(
        &self,
        token: &PaymentAccessToken,
        charge: &ChargeRequest,
    ) -> AppResult<ChargeReceipt>;

    async fn update_order_status(&self, order_id: i64, change: OrderStatusChange)
    -> AppResult<()>;

    /// Transactions of an order, oldest first
    async fn list_transactions(&self, order_id: i64) -> AppResult<Vec<OrderTransaction>>;
}
