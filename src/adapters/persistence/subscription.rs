use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{
        ClaimedSubscription, NewSubscription, RenewalOutcome, SubscriptionProfile,
        SubscriptionRepo,
    },
    domain::entities::{
        payment_record::PaymentRecord, payment_status::PaymentStatus,
        subscription_status::SubscriptionStatus,
    },
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> SubscriptionProfile {
    let id: Uuid = row.get("id");
    let entity_id = id.to_string();
    let json = |field: &str| row.get::<serde_json::Value, _>(field);

    SubscriptionProfile {
        id,
        order_id: row.get("order_id"),
        customer_id: row.get("customer_id"),
        email: row.get("email"),
        product_id: row.get("product_id"),
        sku: row.get("sku"),
        product_name: row.get("product_name"),
        quantity: row.get("quantity"),
        billing_address: parse_json_with_fallback(
            &json("billing_address"),
            "billing_address",
            "subscription",
            &entity_id,
        ),
        shipping_address: parse_json_with_fallback(
            &json("shipping_address"),
            "shipping_address",
            "subscription",
            &entity_id,
        ),
        subscription_days: row.get("subscription_days"),
        start_date: row.get("start_date"),
        next_shipment_date: row.get("next_shipment_date"),
        status: row.get("status"),
        payment_status: row.get("payment_status"),
        payment_history: parse_json_with_fallback(
            &json("payment_history"),
            "payment_history",
            "subscription",
            &entity_id,
        ),
        last_processed_at: row.get("last_processed_at"),
        last_error: row.get("last_error"),
        last_error_date: row.get("last_error_date"),
        retry_count: row.get("retry_count"),
        next_attempt_at: row.get("next_attempt_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, order_id, customer_id, email, product_id, sku, product_name, quantity,
    billing_address, shipping_address, subscription_days, start_date,
    next_shipment_date, status, payment_status, payment_history,
    last_processed_at, last_error, last_error_date, retry_count,
    next_attempt_at, created_at, updated_at
"#;

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> AppResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(format!("failed to serialize {what}: {e}")))
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn create(&self, subscription: &NewSubscription) -> AppResult<SubscriptionProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (
                id, order_id, customer_id, email, product_id, sku, product_name,
                quantity, billing_address, shipping_address, subscription_days,
                start_date, next_shipment_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(subscription.order_id)
        .bind(subscription.customer_id)
        .bind(&subscription.email)
        .bind(subscription.product_id)
        .bind(&subscription.sku)
        .bind(&subscription.product_name)
        .bind(subscription.quantity)
        .bind(to_json(&subscription.billing_address, "billing address")?)
        .bind(to_json(&subscription.shipping_address, "shipping address")?)
        .bind(subscription.subscription_days)
        .bind(subscription.start_date)
        .bind(subscription.next_shipment_date)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row_to_profile(&row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.as_ref().map(row_to_profile))
    }

    async fn set_status(
        &self,
        id: Uuid,
        expected: SubscriptionStatus,
        new_status: SubscriptionStatus,
    ) -> AppResult<Option<SubscriptionProfile>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(expected)
        .bind(new_status)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.as_ref().map(row_to_profile))
    }

    async fn find_active_due(
        &self,
        now: DateTime<Utc>,
        look_ahead_days: i64,
    ) -> AppResult<Vec<SubscriptionProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE status = 'active'
              AND next_shipment_date > $1
              AND next_shipment_date <= $1 + make_interval(days => $2)
            ORDER BY next_shipment_date
            "#,
            SELECT_COLS
        ))
        .bind(now)
        .bind(look_ahead_days as i32)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        look_ahead_days: i64,
        lease: Duration,
        limit: i64,
    ) -> AppResult<Vec<ClaimedSubscription>> {
        let rows = sqlx::query(
            r#"
            WITH due AS (
                SELECT id, payment_status
                FROM subscriptions
                WHERE status = 'active'
                  AND next_shipment_date > $1
                  AND next_shipment_date <= $1 + make_interval(days => $2)
                  AND (claimed_until IS NULL OR claimed_until < $1)
                  AND (next_attempt_at IS NULL OR next_attempt_at <= $1)
                ORDER BY next_shipment_date
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            UPDATE subscriptions s
            SET claim_token = gen_random_uuid(),
                claimed_until = $1 + make_interval(secs => $3::double precision),
                payment_status = 'processing',
                updated_at = NOW()
            FROM due
            WHERE s.id = due.id
            RETURNING s.*, due.payment_status AS previous_payment_status
            "#,
        )
        .bind(now)
        .bind(look_ahead_days as i32)
        .bind(lease.num_seconds() as f64)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows
            .iter()
            .map(|row| ClaimedSubscription {
                claim_token: row.get("claim_token"),
                previous_payment_status: row.get("previous_payment_status"),
                subscription: row_to_profile(row),
            })
            .collect())
    }

    async fn apply_renewal_outcome(
        &self,
        id: Uuid,
        claim_token: Uuid,
        outcome: &RenewalOutcome,
    ) -> AppResult<SubscriptionProfile> {
        let record = outcome.record();
        let entry = to_json(record, "payment record")?;

        let sql = match outcome {
            RenewalOutcome::Completed { .. } => format!(
                r#"
                UPDATE subscriptions
                SET next_shipment_date = next_shipment_date + make_interval(days => subscription_days),
                    payment_status = 'completed',
                    last_error = NULL,
                    last_error_date = NULL,
                    retry_count = 0,
                    next_attempt_at = NULL,
                    last_processed_at = $3,
                    payment_history = payment_history || jsonb_build_array($4::jsonb),
                    claim_token = NULL,
                    claimed_until = NULL,
                    updated_at = NOW()
                WHERE id = $1 AND claim_token = $2
                RETURNING {}
                "#,
                SELECT_COLS
            ),
            RenewalOutcome::Failed { .. } => format!(
                r#"
                UPDATE subscriptions
                SET payment_status = 'failed',
                    last_error = $5,
                    last_error_date = $3,
                    retry_count = retry_count + 1,
                    next_attempt_at = $6,
                    last_processed_at = $3,
                    payment_history = payment_history || jsonb_build_array($4::jsonb),
                    claim_token = NULL,
                    claimed_until = NULL,
                    updated_at = NOW()
                WHERE id = $1 AND claim_token = $2
                RETURNING {}
                "#,
                SELECT_COLS
            ),
        };

        let mut query = sqlx::query(&sql)
            .bind(id)
            .bind(claim_token)
            .bind(record.processed_at)
            .bind(entry);
        if let RenewalOutcome::Failed {
            error, retry_at, ..
        } = outcome
        {
            query = query.bind(error.clone()).bind(*retry_at);
        }

        let row = query
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?
            .ok_or(AppError::ClaimLost)?;

        Ok(row_to_profile(&row))
    }

    async fn extend_claim(
        &self,
        id: Uuid,
        claim_token: Uuid,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET claimed_until = $3 + make_interval(secs => $4::double precision),
                updated_at = NOW()
            WHERE id = $1 AND claim_token = $2 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(claim_token)
        .bind(now)
        .bind(lease.num_seconds() as f64)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_payment_without_claim(
        &self,
        id: Uuid,
        claim_token: Uuid,
        cycle_date: DateTime<Utc>,
        record: &PaymentRecord,
        error: &str,
    ) -> AppResult<SubscriptionProfile> {
        // SET expressions read the pre-update row, so every CASE sees the
        // same cycle and claim.
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET next_shipment_date = CASE WHEN next_shipment_date = $3
                    THEN next_shipment_date + make_interval(days => subscription_days)
                    ELSE next_shipment_date END,
                retry_count = CASE WHEN next_shipment_date = $3 THEN 0 ELSE retry_count END,
                next_attempt_at = CASE WHEN next_shipment_date = $3 THEN NULL ELSE next_attempt_at END,
                payment_status = CASE WHEN claim_token IS NULL OR claim_token = $2
                    THEN 'completed' ELSE payment_status END,
                claimed_until = CASE WHEN claim_token = $2 THEN NULL ELSE claimed_until END,
                claim_token = CASE WHEN claim_token = $2 THEN NULL ELSE claim_token END,
                last_error = $6,
                last_error_date = $4,
                last_processed_at = $4,
                payment_history = payment_history || jsonb_build_array($5::jsonb),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(claim_token)
        .bind(cycle_date)
        .bind(record.processed_at)
        .bind(to_json(record, "payment record")?)
        .bind(error)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("Subscription not found"))?;

        Ok(row_to_profile(&row))
    }

    async fn release_claim(
        &self,
        id: Uuid,
        claim_token: Uuid,
        restore_payment_status: PaymentStatus,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET claim_token = NULL,
                claimed_until = NULL,
                payment_status = $3,
                updated_at = NOW()
            WHERE id = $1 AND claim_token = $2
            "#,
        )
        .bind(id)
        .bind(claim_token)
        .bind(restore_payment_status)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::ClaimLost);
        }
        Ok(())
    }
}
