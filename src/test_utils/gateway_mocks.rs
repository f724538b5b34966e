//! Scripted commerce gateway.
//!
//! Defaults describe a healthy store: one registered-customer order, one
//! product with one variant, the online card method in test mode and an `ok`
//! transaction. Tests override pieces and inject failures per call.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::commerce_gateway::{
        ChargeReceipt, ChargeRequest, CommerceGateway, CommerceOrder, CreatedOrder, NewCustomer,
        NewOrder, OrderStatusChange, OrderTransaction, PaymentAccessToken, PaymentMethod, Product,
        ProductVariant,
    },
    test_utils::factories::{
        TEST_ORDER_ID, TEST_SKU, create_test_commerce_order, payment_method, transaction,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    GetOrder,
    FindProductsBySku,
    ListVariants,
    CreateCustomer,
    FindCustomerByEmail,
    CreateOrder,
    ListPaymentMethods,
    CreatePaymentToken,
    ChargePayment,
    UpdateOrderStatus,
    ListTransactions,
}

impl GatewayCall {
    pub fn operation(&self) -> &'static str {
        match self {
            GatewayCall::GetOrder => "Order fetch",
            GatewayCall::FindProductsBySku => "Product lookup",
            GatewayCall::ListVariants => "Variant lookup",
            GatewayCall::CreateCustomer => "Customer creation",
            GatewayCall::FindCustomerByEmail => "Customer lookup",
            GatewayCall::CreateOrder => "Order creation",
            GatewayCall::ListPaymentMethods => "Payment methods fetch",
            GatewayCall::CreatePaymentToken => "Payment token creation",
            GatewayCall::ChargePayment => "Payment processing",
            GatewayCall::UpdateOrderStatus => "Order status update",
            GatewayCall::ListTransactions => "Transaction fetch",
        }
    }
}

pub struct ScriptedGateway {
    order: Mutex<CommerceOrder>,
    products: Mutex<Vec<Product>>,
    variants: Mutex<Vec<ProductVariant>>,
    payment_methods: Mutex<Vec<PaymentMethod>>,
    transactions: Mutex<Vec<OrderTransaction>>,
    /// `Some(lookup)` makes customer creation conflict; `lookup` is what the
    /// email search then finds.
    existing_customer: Mutex<Option<Option<i64>>>,
    failures: Mutex<HashSet<GatewayCall>>,
    panics: Mutex<HashSet<GatewayCall>>,
    calls: Mutex<HashMap<GatewayCall, usize>>,
    status_changes: Mutex<Vec<(i64, OrderStatusChange)>>,
    created_orders: Mutex<Vec<NewOrder>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    pub const CREATED_ORDER_ID: i64 = 5001;
    pub const CREATED_CUSTOMER_ID: i64 = 9001;

    pub fn new() -> Self {
        Self {
            order: Mutex::new(create_test_commerce_order(TEST_ORDER_ID, |_| {})),
            products: Mutex::new(vec![Product {
                id: 7,
                name: "Coffee beans 1kg".into(),
                sku: Some(TEST_SKU.into()),
                price: Some(24.99),
            }]),
            variants: Mutex::new(vec![ProductVariant {
                id: 70,
                product_id: 7,
                sku: Some(TEST_SKU.into()),
                price: Some(24.99),
                calculated_price: Some(24.99),
            }]),
            payment_methods: Mutex::new(vec![payment_method("braintree.card", true)]),
            transactions: Mutex::new(vec![transaction("txn-1", "ok")]),
            existing_customer: Mutex::new(None),
            failures: Mutex::new(HashSet::new()),
            panics: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            status_changes: Mutex::new(Vec::new()),
            created_orders: Mutex::new(Vec::new()),
        }
    }

    pub fn set_order(&self, order: CommerceOrder) {
        *self.order.lock().unwrap() = order;
    }

    pub fn set_products(&self, products: Vec<Product>) {
        *self.products.lock().unwrap() = products;
    }

    pub fn set_variants(&self, variants: Vec<ProductVariant>) {
        *self.variants.lock().unwrap() = variants;
    }

    pub fn set_payment_methods(&self, methods: Vec<PaymentMethod>) {
        *self.payment_methods.lock().unwrap() = methods;
    }

    pub fn set_transactions(&self, transactions: Vec<OrderTransaction>) {
        *self.transactions.lock().unwrap() = transactions;
    }

    pub fn customer_exists(&self, lookup: Option<i64>) {
        *self.existing_customer.lock().unwrap() = Some(lookup);
    }

    pub fn fail_on(&self, call: GatewayCall) {
        self.failures.lock().unwrap().insert(call);
    }

    pub fn panic_on(&self, call: GatewayCall) {
        self.panics.lock().unwrap().insert(call);
    }

    pub fn calls(&self, call: GatewayCall) -> usize {
        self.calls.lock().unwrap().get(&call).copied().unwrap_or(0)
    }

    pub fn status_changes(&self) -> Vec<(i64, OrderStatusChange)> {
        self.status_changes.lock().unwrap().clone()
    }

    pub fn last_order_customer_id(&self) -> Option<i64> {
        self.created_orders
            .lock()
            .unwrap()
            .last()
            .map(|o| o.customer_id)
    }

    fn record(&self, call: GatewayCall) -> AppResult<()> {
        *self.calls.lock().unwrap().entry(call).or_insert(0) += 1;
        let should_panic = self.panics.lock().unwrap().contains(&call);
        if should_panic {
            panic!("scripted panic in {}", call.operation());
        }
        let should_fail = self.failures.lock().unwrap().contains(&call);
        if should_fail {
            return Err(AppError::Gateway {
                operation: call.operation().into(),
                status: 500,
                body: "scripted failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CommerceGateway for ScriptedGateway {
    async fn get_order(&self, order_id: i64) -> AppResult<CommerceOrder> {
        self.record(GatewayCall::GetOrder)?;
        let mut order = self.order.lock().unwrap().clone();
        order.id = order_id;
        Ok(order)
    }

    async fn find_products_by_sku(&self, sku: &str) -> AppResult<Vec<Product>> {
        self.record(GatewayCall::FindProductsBySku)?;
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.sku.as_deref() == Some(sku))
            .cloned()
            .collect())
    }

    async fn list_variants(&self, product_id: i64) -> AppResult<Vec<ProductVariant>> {
        self.record(GatewayCall::ListVariants)?;
        Ok(self
            .variants
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn create_customer(&self, customer: &NewCustomer) -> AppResult<i64> {
        self.record(GatewayCall::CreateCustomer)?;
        if self.existing_customer.lock().unwrap().is_some() {
            return Err(AppError::Conflict(format!(
                "Customer {} already in use",
                customer.email
            )));
        }
        Ok(Self::CREATED_CUSTOMER_ID)
    }

    async fn find_customer_id_by_email(&self, _email: &str) -> AppResult<Option<i64>> {
        self.record(GatewayCall::FindCustomerByEmail)?;
        let lookup = *self.existing_customer.lock().unwrap();
        Ok(lookup.flatten())
    }

    async fn create_order(&self, order: &NewOrder) -> AppResult<CreatedOrder> {
        self.record(GatewayCall::CreateOrder)?;
        self.created_orders.lock().unwrap().push(order.clone());
        Ok(CreatedOrder {
            id: Self::CREATED_ORDER_ID,
            total_inc_tax: Some("24.9900".into()),
            date_created: Some("Sun, 01 Mar 2026 12:00:00 +0000".into()),
        })
    }

    async fn list_payment_methods(&self, _order_id: i64) -> AppResult<Vec<PaymentMethod>> {
        self.record(GatewayCall::ListPaymentMethods)?;
        Ok(self.payment_methods.lock().unwrap().clone())
    }

    async fn create_payment_token(&self, order_id: i64) -> AppResult<PaymentAccessToken> {
        self.record(GatewayCall::CreatePaymentToken)?;
        Ok(PaymentAccessToken(format!("pat-{order_id}")))
    }

    async fn charge_payment(
        &self,
        _token: &PaymentAccessToken,
        _charge: &ChargeRequest,
    ) -> AppResult<ChargeReceipt> {
        self.record(GatewayCall::ChargePayment)?;
        Ok(ChargeReceipt {
            id: Some("pay-1".into()),
            status: Some("success".into()),
        })
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        change: OrderStatusChange,
    ) -> AppResult<()> {
        self.record(GatewayCall::UpdateOrderStatus)?;
        self.status_changes.lock().unwrap().push((order_id, change));
        Ok(())
    }

    async fn list_transactions(&self, _order_id: i64) -> AppResult<Vec<OrderTransaction>> {
        self.record(GatewayCall::ListTransactions)?;
        Ok(self.transactions.lock().unwrap().clone())
    }
}
