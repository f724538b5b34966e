use chrono::{DateTime, Duration, Utc};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Look-ahead window deciding which subscriptions are due for renewal.
///
/// A subscription is due when `now < next_shipment_date <= now + look_ahead_days`.
/// The store query and the per-subscription check both use this rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalWindow {
    look_ahead_days: i64,
}

impl RenewalWindow {
    pub fn new(look_ahead_days: i64) -> Self {
        Self { look_ahead_days }
    }

    pub fn look_ahead_days(&self) -> i64 {
        self.look_ahead_days
    }

    /// Inclusive upper bound of the window
    pub fn end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.look_ahead_days)
    }

    pub fn contains(&self, now: DateTime<Utc>, next_shipment_date: DateTime<Utc>) -> bool {
        next_shipment_date > now && next_shipment_date <= self.end(now)
    }

    /// Whole days until shipment, rounded up
    pub fn days_until_shipment(now: DateTime<Utc>, next_shipment_date: DateTime<Utc>) -> i64 {
        let millis = (next_shipment_date - now).num_milliseconds();
        let whole = millis.div_euclid(MILLIS_PER_DAY);
        if millis.rem_euclid(MILLIS_PER_DAY) > 0 {
            whole + 1
        } else {
            whole
        }
    }

    /// The scheduler's day-count check. Agrees with `contains` for every
    /// shipment date in the future.
    pub fn should_renew(&self, now: DateTime<Utc>, next_shipment_date: DateTime<Utc>) -> bool {
        let days = Self::days_until_shipment(now, next_shipment_date);
        days >= 1 && days <= self.look_ahead_days && self.contains(now, next_shipment_date)
    }
}
