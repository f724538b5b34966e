//! Test data factories.
//!
//! Each factory creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    application::{
        ports::commerce_gateway::{CommerceOrder, OrderTransaction, PaymentMethod},
        use_cases::subscription::SubscriptionProfile,
    },
    domain::entities::{
        address::AddressSnapshot,
        payment_record::{PaymentMethodKind, PaymentRecord},
        payment_status::PaymentStatus,
        subscription_status::SubscriptionStatus,
    },
};

pub const TEST_ORDER_ID: i64 = 1001;
pub const TEST_SKU: &str = "BEANS-1KG";
pub const TEST_EMAIL: &str = "ada@example.com";

/// A complete billing address.
pub fn create_test_address(overrides: impl FnOnce(&mut AddressSnapshot)) -> AddressSnapshot {
    let mut address = AddressSnapshot {
        first_name: Some("Ada".into()),
        last_name: Some("Lovelace".into()),
        street_1: Some("12 Analytical Way".into()),
        street_2: None,
        city: Some("London".into()),
        state: Some("Greater London".into()),
        zip: Some("N1 9GU".into()),
        country: Some("United Kingdom".into()),
        country_iso2: Some("GB".into()),
        phone: Some("+44 20 7946 0000".into()),
        email: Some(TEST_EMAIL.into()),
    };
    overrides(&mut address);
    address
}

/// An active subscription due in three days on a 30 day cadence.
pub fn create_test_subscription(
    overrides: impl FnOnce(&mut SubscriptionProfile),
) -> SubscriptionProfile {
    let now = Utc::now();
    let mut subscription = SubscriptionProfile {
        id: Uuid::new_v4(),
        order_id: TEST_ORDER_ID,
        customer_id: Some(42),
        email: TEST_EMAIL.into(),
        product_id: 7,
        sku: TEST_SKU.into(),
        product_name: "Coffee beans 1kg".into(),
        quantity: 1,
        billing_address: create_test_address(|_| {}),
        shipping_address: create_test_address(|_| {}),
        subscription_days: 30,
        start_date: now - Duration::days(27),
        next_shipment_date: now + Duration::days(3),
        status: SubscriptionStatus::Active,
        payment_status: PaymentStatus::Pending,
        payment_history: Vec::new(),
        last_processed_at: None,
        last_error: None,
        last_error_date: None,
        retry_count: 0,
        next_attempt_at: None,
        created_at: Some(now - Duration::days(27)),
        updated_at: Some(now - Duration::days(27)),
    };
    overrides(&mut subscription);
    subscription
}

/// A history entry for an online renewal order.
pub fn payment_record(
    status: PaymentStatus,
    amount_cents: Option<i64>,
    processed_at: DateTime<Utc>,
) -> PaymentRecord {
    PaymentRecord {
        order_id: Some(TEST_ORDER_ID + 1),
        amount_cents,
        status,
        transaction_id: None,
        payment_method: Some(PaymentMethodKind::Online),
        processed_at,
        error_message: status.is_failed().then(|| "Payment declined".into()),
    }
}

/// An order placed by a registered customer.
pub fn create_test_commerce_order(
    id: i64,
    overrides: impl FnOnce(&mut CommerceOrder),
) -> CommerceOrder {
    let mut order = CommerceOrder {
        id,
        customer_id: 42,
        billing_address: create_test_address(|_| {}),
        total_inc_tax: Some("24.9900".into()),
        is_digital: false,
        payment_method: Some("Credit Card".into()),
    };
    overrides(&mut order);
    order
}

pub fn transaction(id: &str, status: &str) -> OrderTransaction {
    OrderTransaction {
        id: id.into(),
        status: status.into(),
        amount: Some(24.99),
        gateway: Some("braintree".into()),
        date_created: Some("2026-03-01T12:00:00+00:00".into()),
    }
}

pub fn payment_method(id: &str, test_mode: bool) -> PaymentMethod {
    PaymentMethod {
        id: id.into(),
        name: Some("Card".into()),
        test_mode,
    }
}
