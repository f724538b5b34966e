//! Dashboard aggregates over the in-memory subscription store.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    app_error::AppResult,
    application::use_cases::reporting::{
        HistoryEntry, HistoryTotal, ProductSales, RecentSubscriber, ReportingRepo, StatusCount,
        SubscriptionCounts,
    },
    domain::entities::payment_status::PaymentStatus,
    test_utils::InMemorySubscriptionRepo,
};

#[async_trait]
impl ReportingRepo for InMemorySubscriptionRepo {
    async fn subscription_counts(&self) -> AppResult<SubscriptionCounts> {
        let all = self.all();
        let active: Vec<_> = all.iter().filter(|s| s.status.is_renewable()).collect();
        let distinct =
            |values: Vec<String>| values.into_iter().collect::<HashSet<_>>().len() as i64;

        Ok(SubscriptionCounts {
            subscriptions: all.len() as i64,
            subscribers: distinct(all.iter().map(|s| s.email.clone()).collect()),
            products: distinct(all.iter().map(|s| s.product_id.to_string()).collect()),
            rate_plans: distinct(all.iter().map(|s| s.subscription_days.to_string()).collect()),
            active_plans: distinct(active.iter().map(|s| s.product_name.clone()).collect()),
            avg_active_days: (!active.is_empty()).then(|| {
                active.iter().map(|s| f64::from(s.subscription_days)).sum::<f64>()
                    / active.len() as f64
            }),
        })
    }

    async fn payment_status_counts(&self) -> AppResult<Vec<StatusCount>> {
        let mut counts: BTreeMap<&'static str, StatusCount> = BTreeMap::new();
        for sub in self.all() {
            counts
                .entry(sub.payment_status.as_str())
                .or_insert(StatusCount {
                    status: sub.payment_status,
                    subscriptions: 0,
                })
                .subscriptions += 1;
        }
        Ok(counts.into_values().collect())
    }

    async fn history_totals(&self, since: Option<DateTime<Utc>>) -> AppResult<Vec<HistoryTotal>> {
        let mut totals: BTreeMap<(&'static str, Option<&'static str>), HistoryTotal> =
            BTreeMap::new();
        for record in self.all().into_iter().flat_map(|s| s.payment_history) {
            if since.is_some_and(|since| record.processed_at < since) {
                continue;
            }
            let total = totals
                .entry((record.status.as_str(), record.payment_method.map(|m| m.label())))
                .or_insert(HistoryTotal {
                    status: record.status,
                    payment_method: record.payment_method,
                    attempts: 0,
                    amount_cents: 0,
                });
            total.attempts += 1;
            total.amount_cents += record.amount_cents.unwrap_or(0);
        }
        Ok(totals.into_values().collect())
    }

    async fn recent_subscribers(&self, limit: i64) -> AppResult<Vec<RecentSubscriber>> {
        let mut all = self.all();
        all.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(all
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|s| RecentSubscriber {
                email: s.email,
                plan: s.product_name,
                start_date: s.start_date,
                status: s.status,
            })
            .collect())
    }

    async fn product_sales(&self) -> AppResult<Vec<ProductSales>> {
        let mut all = self.all();
        all.sort_by(|a, b| b.start_date.cmp(&a.start_date));

        let mut products: BTreeMap<i64, ProductSales> = BTreeMap::new();
        for sub in all {
            let revenue: i64 = sub
                .payment_history
                .iter()
                .filter(|r| r.status == PaymentStatus::Completed)
                .filter_map(|r| r.amount_cents)
                .sum();
            let product = products.entry(sub.product_id).or_insert(ProductSales {
                product_id: sub.product_id,
                name: sub.product_name.clone(),
                sku: sub.sku.clone(),
                subscriptions: 0,
                active_subscriptions: 0,
                revenue_cents: 0,
                last_started: Some(sub.start_date),
            });
            product.subscriptions += 1;
            if sub.status.is_renewable() {
                product.active_subscriptions += 1;
            }
            product.revenue_cents += revenue;
        }

        let mut products: Vec<_> = products.into_values().collect();
        products.sort_by(|a, b| {
            b.subscriptions
                .cmp(&a.subscriptions)
                .then(a.product_id.cmp(&b.product_id))
        });
        Ok(products)
    }

    async fn recent_history(&self, limit: i64) -> AppResult<Vec<HistoryEntry>> {
        let mut entries: Vec<_> = self
            .all()
            .into_iter()
            .flat_map(|s| {
                let (id, name) = (s.id, s.product_name);
                s.payment_history.into_iter().map(move |record| HistoryEntry {
                    subscription_id: id,
                    product_name: name.clone(),
                    record,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.record.processed_at.cmp(&a.record.processed_at));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }
}
