use async_trait::async_trait;

use crate::{
    app_error::AppResult,
    application::ports::commerce_gateway::{
        ChargeReceipt, ChargeRequest, CommerceGateway, CommerceOrder, CreatedOrder, NewCustomer,
        NewOrder, ORDER_STATUS_AWAITING_FULFILLMENT, ORDER_STATUS_CANCELLED, OrderStatusChange,
        OrderTransaction, PaymentAccessToken, PaymentMethod, Product, ProductVariant,
    },
    domain::entities::address::{AddressSnapshot, OrderAddress},
    infra::bigcommerce_client::{
        BcAddress, BcCardInstrument, BcCustomerAddress, BcCustomerCreate, BcOrderCreate,
        BcOrderProduct, BcOrderUpdate, BcPaymentBody, BigCommerceClient, PaymentProviderField,
    },
};

const CASH_ON_DELIVERY: &str = "Cash on Delivery";
const PAYMENT_CAPTURED: &str = "captured";

/// Adapter that wraps BigCommerceClient to implement CommerceGateway.
#[derive(Clone)]
pub struct BigCommerceGateway {
    client: BigCommerceClient,
}

impl BigCommerceGateway {
    pub fn new(client: BigCommerceClient) -> Self {
        Self { client }
    }

    fn snapshot(address: BcAddress) -> AddressSnapshot {
        AddressSnapshot {
            first_name: address.first_name,
            last_name: address.last_name,
            street_1: address.street_1,
            street_2: address.street_2,
            city: address.city,
            state: address.state,
            zip: address.zip,
            country: address.country,
            country_iso2: address.country_iso2,
            phone: address.phone,
            email: address.email,
        }
    }

    fn wire_address(address: &OrderAddress) -> BcAddress {
        BcAddress {
            first_name: Some(address.first_name.clone()),
            last_name: Some(address.last_name.clone()),
            street_1: Some(address.street_1.clone()),
            street_2: Some(address.street_2.clone()),
            city: Some(address.city.clone()),
            state: Some(address.state.clone()),
            zip: Some(address.zip.clone()),
            country: Some(address.country.clone()),
            country_iso2: Some(address.country_iso2.clone()),
            phone: Some(address.phone.clone()),
            email: Some(address.email.clone()),
        }
    }

    fn status_update(change: OrderStatusChange) -> BcOrderUpdate {
        match change {
            OrderStatusChange::Captured => BcOrderUpdate {
                status_id: ORDER_STATUS_AWAITING_FULFILLMENT,
                payment_status: Some(PAYMENT_CAPTURED),
                payment_method: None,
                payment_provider_id: PaymentProviderField::Absent,
            },
            OrderStatusChange::CashOnDelivery => BcOrderUpdate {
                status_id: ORDER_STATUS_AWAITING_FULFILLMENT,
                payment_status: None,
                payment_method: Some(CASH_ON_DELIVERY),
                payment_provider_id: PaymentProviderField::Cleared,
            },
            OrderStatusChange::Cancelled => BcOrderUpdate {
                status_id: ORDER_STATUS_CANCELLED,
                payment_status: None,
                payment_method: None,
                payment_provider_id: PaymentProviderField::Absent,
            },
        }
    }
}

#[async_trait]
impl CommerceGateway for BigCommerceGateway {
    // ========================================================================
    // Orders
    // ========================================================================

    async fn get_order(&self, order_id: i64) -> AppResult<CommerceOrder> {
        let order = self.client.get_order(order_id).await?;
        Ok(CommerceOrder {
            id: order.id,
            customer_id: order.customer_id,
            billing_address: Self::snapshot(order.billing_address),
            total_inc_tax: order.total_inc_tax,
            is_digital: order.order_is_digital,
            payment_method: order.payment_method,
        })
    }

    async fn create_order(&self, order: &NewOrder) -> AppResult<CreatedOrder> {
        let line = &order.line;
        let body = BcOrderCreate {
            customer_id: order.customer_id,
            status_id: order.status_id,
            billing_address: Self::wire_address(&order.billing_address),
            shipping_addresses: vec![Self::wire_address(&order.shipping_address)],
            products: vec![BcOrderProduct {
                product_id: line.product_id,
                quantity: line.quantity,
                variant_id: line.variant_id,
                price_inc_tax: line.unit_price,
                price_ex_tax: line.unit_price,
            }],
            channel_id: order.channel_id,
        };

        let created = self.client.create_order(&body).await?;
        Ok(CreatedOrder {
            id: created.id,
            total_inc_tax: created.total_inc_tax,
            date_created: created.date_created,
        })
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        change: OrderStatusChange,
    ) -> AppResult<()> {
        self.client
            .update_order(order_id, &Self::status_update(change))
            .await
    }

    async fn list_transactions(&self, order_id: i64) -> AppResult<Vec<OrderTransaction>> {
        let transactions = self.client.list_transactions(order_id).await?;
        Ok(transactions
            .into_iter()
            .map(|t| OrderTransaction {
                id: t.id_string(),
                status: t.status,
                amount: t.amount,
                gateway: t.gateway,
                date_created: t.date_created,
            })
            .collect())
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    async fn find_products_by_sku(&self, sku: &str) -> AppResult<Vec<Product>> {
        let products = self.client.find_products_by_sku(sku).await?;
        Ok(products
            .into_iter()
            .map(|p| Product {
                id: p.id,
                name: p.name,
                sku: p.sku,
                price: p.price,
            })
            .collect())
    }

    async fn list_variants(&self, product_id: i64) -> AppResult<Vec<ProductVariant>> {
        let variants = self.client.list_variants(product_id).await?;
        Ok(variants
            .into_iter()
            .map(|v| ProductVariant {
                id: v.id,
                product_id: v.product_id,
                sku: v.sku,
                price: v.price,
                calculated_price: v.calculated_price,
            })
            .collect())
    }

    // ========================================================================
    // Customers
    // ========================================================================

    async fn create_customer(&self, customer: &NewCustomer) -> AppResult<i64> {
        let address = &customer.address;
        let body = BcCustomerCreate {
            email: customer.email.clone(),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            phone: customer.phone.clone(),
            addresses: vec![BcCustomerAddress {
                first_name: address.first_name.clone(),
                last_name: address.last_name.clone(),
                address1: address.street_1.clone(),
                address2: address.street_2.clone(),
                city: address.city.clone(),
                state_or_province: address.state.clone(),
                postal_code: address.zip.clone(),
                country_code: address.country_iso2.clone(),
                phone: address.phone.clone(),
            }],
            origin_channel_id: customer.channel_id,
            channel_ids: vec![customer.channel_id],
        };

        Ok(self.client.create_customer(&body).await?.id)
    }

    async fn find_customer_id_by_email(&self, email: &str) -> AppResult<Option<i64>> {
        let customers = self.client.find_customers_by_email(email).await?;
        Ok(customers.first().map(|c| c.id))
    }

    // ========================================================================
    // Payments
    // ========================================================================

    async fn list_payment_methods(&self, order_id: i64) -> AppResult<Vec<PaymentMethod>> {
        let methods = self.client.list_payment_methods(order_id).await?;
        Ok(methods
            .into_iter()
            .map(|m| PaymentMethod {
                id: m.id,
                name: m.name,
                test_mode: m.test_mode,
            })
            .collect())
    }

    async fn create_payment_token(&self, order_id: i64) -> AppResult<PaymentAccessToken> {
        let token = self.client.create_payment_token(order_id).await?;
        Ok(PaymentAccessToken(token.id))
    }

    async fn charge_payment(
        &self,
        token: &PaymentAccessToken,
        charge: &ChargeRequest,
    ) -> AppResult<ChargeReceipt> {
        let card = &charge.instrument;
        let body = BcPaymentBody {
            instrument: BcCardInstrument {
                kind: "card",
                number: card.number.clone(),
                cardholder_name: card.cardholder_name.clone(),
                expiry_month: card.expiry_month,
                expiry_year: card.expiry_year,
                verification_value: card.verification_value.clone(),
            },
            payment_method_id: charge.payment_method_id.clone(),
            save_instrument: charge.save_instrument,
        };

        let payment = self.client.process_payment(token.as_str(), &body).await?;
        Ok(ChargeReceipt {
            id: payment.id,
            status: payment.status,
        })
    }
}
