use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::reporting::{
        HistoryEntry, HistoryTotal, ProductSales, RecentSubscriber, ReportingRepo, StatusCount,
        SubscriptionCounts,
    },
    domain::entities::{
        payment_record::{PaymentMethodKind, PaymentRecord},
        payment_status::PaymentStatus,
    },
};

/// A JSONB expression that may be SQL NULL when the key is absent
fn json_col(row: &sqlx::postgres::PgRow, name: &str) -> serde_json::Value {
    row.get::<Option<serde_json::Value>, _>(name)
        .unwrap_or(serde_json::Value::Null)
}

#[async_trait]
impl ReportingRepo for PostgresPersistence {
    async fn subscription_counts(&self) -> AppResult<SubscriptionCounts> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS subscriptions,
                   COUNT(DISTINCT email) AS subscribers,
                   COUNT(DISTINCT product_id) AS products,
                   COUNT(DISTINCT subscription_days) AS rate_plans,
                   COUNT(DISTINCT product_name) FILTER (WHERE status = 'active') AS active_plans,
                   (AVG(subscription_days) FILTER (WHERE status = 'active'))::double precision
                       AS avg_active_days
            FROM subscriptions
            "#,
        )
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(SubscriptionCounts {
            subscriptions: row.get("subscriptions"),
            subscribers: row.get("subscribers"),
            products: row.get("products"),
            rate_plans: row.get("rate_plans"),
            active_plans: row.get("active_plans"),
            avg_active_days: row.get("avg_active_days"),
        })
    }

    async fn payment_status_counts(&self) -> AppResult<Vec<StatusCount>> {
        let rows = sqlx::query(
            r#"
            SELECT payment_status, COUNT(*) AS subscriptions
            FROM subscriptions
            GROUP BY payment_status
            ORDER BY payment_status
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows
            .iter()
            .map(|row| StatusCount {
                status: row.get("payment_status"),
                subscriptions: row.get("subscriptions"),
            })
            .collect())
    }

    async fn history_totals(&self, since: Option<DateTime<Utc>>) -> AppResult<Vec<HistoryTotal>> {
        let rows = sqlx::query(
            r#"
            SELECT h->'status' AS status,
                   h->'payment_method' AS payment_method,
                   COUNT(*) AS attempts,
                   COALESCE(SUM((h->>'amount_cents')::bigint), 0)::bigint AS amount_cents
            FROM subscriptions s
            CROSS JOIN LATERAL jsonb_array_elements(s.payment_history) AS h
            WHERE $1::timestamptz IS NULL OR (h->>'processed_at')::timestamptz >= $1
            GROUP BY 1, 2
            "#,
        )
        .bind(since)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        // Entries with an unknown status are skipped rather than failing the view.
        Ok(rows
            .iter()
            .filter_map(|row| {
                let status: Option<PaymentStatus> = parse_json_with_fallback(
                    &json_col(row, "status"),
                    "status",
                    "payment_history",
                    "aggregate",
                );
                let payment_method: Option<PaymentMethodKind> = parse_json_with_fallback(
                    &json_col(row, "payment_method"),
                    "payment_method",
                    "payment_history",
                    "aggregate",
                );
                Some(HistoryTotal {
                    status: status?,
                    payment_method,
                    attempts: row.get("attempts"),
                    amount_cents: row.get("amount_cents"),
                })
            })
            .collect())
    }

    async fn recent_subscribers(&self, limit: i64) -> AppResult<Vec<RecentSubscriber>> {
        let rows = sqlx::query(
            r#"
            SELECT email, product_name, start_date, status
            FROM subscriptions
            ORDER BY start_date DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows
            .iter()
            .map(|row| RecentSubscriber {
                email: row.get("email"),
                plan: row.get("product_name"),
                start_date: row.get("start_date"),
                status: row.get("status"),
            })
            .collect())
    }

    async fn product_sales(&self) -> AppResult<Vec<ProductSales>> {
        let rows = sqlx::query(
            r#"
            SELECT s.product_id,
                   (array_agg(s.product_name ORDER BY s.start_date DESC))[1] AS name,
                   (array_agg(s.sku ORDER BY s.start_date DESC))[1] AS sku,
                   COUNT(*) AS subscriptions,
                   COUNT(*) FILTER (WHERE s.status = 'active') AS active_subscriptions,
                   COALESCE(SUM(paid.amount_cents), 0)::bigint AS revenue_cents,
                   MAX(s.start_date) AS last_started
            FROM subscriptions s
            LEFT JOIN LATERAL (
                SELECT SUM((h->>'amount_cents')::bigint) AS amount_cents
                FROM jsonb_array_elements(s.payment_history) AS h
                WHERE h->>'status' = 'completed'
            ) paid ON TRUE
            GROUP BY s.product_id
            ORDER BY subscriptions DESC, s.product_id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows
            .iter()
            .map(|row| ProductSales {
                product_id: row.get("product_id"),
                name: row.get("name"),
                sku: row.get("sku"),
                subscriptions: row.get("subscriptions"),
                active_subscriptions: row.get("active_subscriptions"),
                revenue_cents: row.get("revenue_cents"),
                last_started: row.get("last_started"),
            })
            .collect())
    }

    async fn recent_history(&self, limit: i64) -> AppResult<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.product_name, h AS entry
            FROM subscriptions s
            CROSS JOIN LATERAL jsonb_array_elements(s.payment_history) AS h
            ORDER BY (h->>'processed_at')::timestamptz DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let subscription_id: uuid::Uuid = row.get("id");
                let record: Option<PaymentRecord> = parse_json_with_fallback(
                    &json_col(row, "entry"),
                    "payment_history",
                    "subscription",
                    &subscription_id.to_string(),
                );
                Some(HistoryEntry {
                    subscription_id,
                    product_name: row.get("product_name"),
                    record: record?,
                })
            })
            .collect())
    }
}
