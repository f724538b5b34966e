use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::app_error::AppResult;
use crate::domain::entities::{
    payment_record::{PaymentMethodKind, PaymentRecord},
    payment_status::PaymentStatus,
    subscription_status::SubscriptionStatus,
};

pub const RECENT_SUBSCRIBERS_LIMIT: i64 = 4;
pub const RECENT_TRANSACTIONS_LIMIT: i64 = 10;
const REVENUE_WINDOW_DAYS: i64 = 30;

// ============================================================================
// Repository Trait
// ============================================================================

/// Read-only aggregates over subscriptions and their payment history
#[async_trait]
pub trait ReportingRepo: Send + Sync {
    async fn subscription_counts(&self) -> AppResult<SubscriptionCounts>;

    /// Number of subscriptions per current payment status
    async fn payment_status_counts(&self) -> AppResult<Vec<StatusCount>>;

    /// History entries grouped by status and payment method, optionally only
    /// those processed at or after `since`.
    async fn history_totals(&self, since: Option<DateTime<Utc>>) -> AppResult<Vec<HistoryTotal>>;

    /// Newest subscriptions by start date
    async fn recent_subscribers(&self, limit: i64) -> AppResult<Vec<RecentSubscriber>>;

    async fn product_sales(&self) -> AppResult<Vec<ProductSales>>;

    /// Newest history entries across all subscriptions
    async fn recent_history(&self, limit: i64) -> AppResult<Vec<HistoryEntry>>;
}

// ============================================================================
// Aggregate Types
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubscriptionCounts {
    pub subscriptions: i64,
    /// Distinct subscriber emails
    pub subscribers: i64,
    pub products: i64,
    /// Distinct renewal periods
    pub rate_plans: i64,
    /// Distinct product names with an active subscription
    pub active_plans: i64,
    pub avg_active_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: PaymentStatus,
    pub subscriptions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryTotal {
    pub status: PaymentStatus,
    pub payment_method: Option<PaymentMethodKind>,
    pub attempts: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentSubscriber {
    pub email: String,
    pub plan: String,
    pub start_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSales {
    pub product_id: i64,
    pub name: String,
    pub sku: String,
    /// Subscriptions ever created for the product
    pub subscriptions: i64,
    pub active_subscriptions: i64,
    /// Completed history amounts
    pub revenue_cents: i64,
    pub last_started: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub subscription_id: Uuid,
    pub product_name: String,
    pub record: PaymentRecord,
}

// ============================================================================
// Dashboard Views
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BillingTotal {
    pub subscriptions: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BillingSummary {
    pub paid: BillingTotal,
    pub processing: i64,
    pub pending: i64,
    pub failed: BillingTotal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub subscriptions: i64,
    pub subscribers: i64,
    pub products: i64,
    pub rate_plans: i64,
    pub billing: BillingSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionDashboard {
    pub total_subscribers: i64,
    pub active_plans: i64,
    /// Mean renewal period of active subscriptions, in 30-day months
    pub avg_subscription_months: f64,
    /// Completed payments over the last 30 days
    pub monthly_revenue_cents: i64,
    pub recent_subscribers: Vec<RecentSubscriber>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDashboard {
    pub total_products: i64,
    pub active_products: i64,
    pub total_sales: i64,
    pub revenue_cents: i64,
    pub products: Vec<ProductSales>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionDirection {
    Credit,
    Debit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentTransaction {
    pub subscription_id: Uuid,
    pub description: String,
    pub direction: TransactionDirection,
    #[serde(flatten)]
    pub record: PaymentRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodStatusTotal {
    pub status: PaymentStatus,
    pub attempts: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentMethodBreakdown {
    /// `None` groups attempts that never reached a payment method
    pub method: Option<PaymentMethodKind>,
    pub statuses: Vec<MethodStatusTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountsDashboard {
    /// Completed payments since the start of the calendar month
    pub monthly_revenue_cents: i64,
    pub pending_cents: i64,
    pub failed_cents: i64,
    pub payment_methods: Vec<PaymentMethodBreakdown>,
    pub recent_transactions: Vec<RecentTransaction>,
}

// ============================================================================
// Use Cases
// ============================================================================

fn sum_amount(totals: &[HistoryTotal], status: PaymentStatus) -> i64 {
    totals
        .iter()
        .filter(|t| t.status == status)
        .map(|t| t.amount_cents)
        .sum()
}

fn count_status(counts: &[StatusCount], status: PaymentStatus) -> i64 {
    counts
        .iter()
        .find(|c| c.status == status)
        .map_or(0, |c| c.subscriptions)
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .with_day(1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map_or(now, |start| start.and_utc())
}

#[derive(Clone)]
pub struct ReportingUseCases {
    repo: Arc<dyn ReportingRepo>,
}

impl ReportingUseCases {
    pub fn new(repo: Arc<dyn ReportingRepo>) -> Self {
        Self { repo }
    }

    pub async fn summary(&self) -> AppResult<DashboardSummary> {
        let counts = self.repo.subscription_counts().await?;
        let statuses = self.repo.payment_status_counts().await?;
        let totals = self.repo.history_totals(None).await?;

        Ok(DashboardSummary {
            subscriptions: counts.subscriptions,
            subscribers: counts.subscribers,
            products: counts.products,
            rate_plans: counts.rate_plans,
            billing: BillingSummary {
                paid: BillingTotal {
                    subscriptions: count_status(&statuses, PaymentStatus::Completed),
                    amount_cents: sum_amount(&totals, PaymentStatus::Completed),
                },
                processing: count_status(&statuses, PaymentStatus::Processing),
                pending: count_status(&statuses, PaymentStatus::Pending),
                failed: BillingTotal {
                    subscriptions: count_status(&statuses, PaymentStatus::Failed),
                    amount_cents: sum_amount(&totals, PaymentStatus::Failed),
                },
            },
        })
    }

    pub async fn subscriptions(&self, now: DateTime<Utc>) -> AppResult<SubscriptionDashboard> {
        let counts = self.repo.subscription_counts().await?;
        let since = now - Duration::days(REVENUE_WINDOW_DAYS);
        let recent_totals = self.repo.history_totals(Some(since)).await?;
        let recent_subscribers = self
            .repo
            .recent_subscribers(RECENT_SUBSCRIBERS_LIMIT)
            .await?;

        let avg_months = counts.avg_active_days.unwrap_or(0.0) / 30.0;
        Ok(SubscriptionDashboard {
            total_subscribers: counts.subscribers,
            active_plans: counts.active_plans,
            avg_subscription_months: (avg_months * 10.0).round() / 10.0,
            monthly_revenue_cents: sum_amount(&recent_totals, PaymentStatus::Completed),
            recent_subscribers,
        })
    }

    pub async fn products(&self) -> AppResult<ProductDashboard> {
        let products = self.repo.product_sales().await?;

        Ok(ProductDashboard {
            total_products: products.len() as i64,
            active_products: products
                .iter()
                .filter(|p| p.active_subscriptions > 0)
                .count() as i64,
            total_sales: products.iter().map(|p| p.subscriptions).sum(),
            revenue_cents: products.iter().map(|p| p.revenue_cents).sum(),
            products,
        })
    }

    pub async fn accounts(&self, now: DateTime<Utc>) -> AppResult<AccountsDashboard> {
        let all_time = self.repo.history_totals(None).await?;
        let this_month = self.repo.history_totals(Some(start_of_month(now))).await?;
        let recent = self
            .repo
            .recent_history(RECENT_TRANSACTIONS_LIMIT)
            .await?;

        let mut by_method: BTreeMap<Option<&'static str>, PaymentMethodBreakdown> =
            BTreeMap::new();
        for total in &all_time {
            by_method
                .entry(total.payment_method.map(|m| m.label()))
                .or_insert_with(|| PaymentMethodBreakdown {
                    method: total.payment_method,
                    statuses: Vec::new(),
                })
                .statuses
                .push(MethodStatusTotal {
                    status: total.status,
                    attempts: total.attempts,
                    amount_cents: total.amount_cents,
                });
        }

        Ok(AccountsDashboard {
            monthly_revenue_cents: sum_amount(&this_month, PaymentStatus::Completed),
            pending_cents: sum_amount(&all_time, PaymentStatus::Pending),
            failed_cents: sum_amount(&all_time, PaymentStatus::Failed),
            payment_methods: by_method.into_values().collect(),
            recent_transactions: recent
                .into_iter()
                .map(|entry| RecentTransaction {
                    subscription_id: entry.subscription_id,
                    description: entry.product_name,
                    direction: if entry.record.status.is_successful() {
                        TransactionDirection::Credit
                    } else {
                        TransactionDirection::Debit
                    },
                    record: entry.record,
                })
                .collect(),
        })
    }
}
