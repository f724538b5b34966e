use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::application::use_cases::{
    payment::DEFAULT_ONLINE_METHOD_ID,
    renewal::{DEFAULT_RETRY_BASE_SECS, DEFAULT_RETRY_MAX_SECS, RenewalOptions},
    renewal_schedule::{
        DEFAULT_BATCH_SIZE, DEFAULT_LEASE_SECS, DEFAULT_LOOK_AHEAD_DAYS, ScheduleOptions,
    },
};
use crate::domain::entities::renewal_window::RenewalWindow;
use crate::infra::error::InfraError;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    pub database_url: String,
    pub gateway: GatewayConfig,
    pub renewal: RenewalSettings,
    pub resend_api_key: SecretString,
    pub email_from: String,
}

/// Credentials and transport settings for the BigCommerce APIs
#[derive(Clone)]
pub struct GatewayConfig {
    pub store_hash: String,
    pub access_token: SecretString,
    /// REST API root, e.g. `https://api.bigcommerce.com`
    pub api_base: Url,
    /// Payments API root, e.g. `https://payments.bigcommerce.com`
    pub payments_base: Url,
    pub channel_id: i64,
    pub online_method_id: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Total attempts for idempotent reads, including the first
    pub get_max_attempts: u32,
    pub retry_base_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct RenewalSettings {
    pub enabled: bool,
    pub poll_interval: Duration,
    pub look_ahead_days: i64,
    pub lease: Duration,
    pub batch_size: i64,
    pub max_concurrency: usize,
    pub retry_base_secs: i64,
    pub retry_max_secs: i64,
    pub default_customer_id: i64,
    pub cancel_orphaned_orders: bool,
}

impl Default for RenewalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(60),
            look_ahead_days: DEFAULT_LOOK_AHEAD_DAYS,
            lease: Duration::from_secs(DEFAULT_LEASE_SECS as u64),
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrency: 1,
            retry_base_secs: DEFAULT_RETRY_BASE_SECS,
            retry_max_secs: DEFAULT_RETRY_MAX_SECS,
            default_customer_id: 0,
            cancel_orphaned_orders: false,
        }
    }
}

impl RenewalSettings {
    pub fn validate(&self) -> Result<(), InfraError> {
        let invalid = |var: &'static str, reason: &str| {
            Err(InfraError::InvalidConfig {
                var,
                reason: reason.to_string(),
            })
        };

        if self.poll_interval.is_zero() {
            return invalid("RENEWAL_POLL_INTERVAL_SECS", "must be positive");
        }
        if self.look_ahead_days < 1 {
            return invalid("RENEWAL_LOOK_AHEAD_DAYS", "must be at least 1");
        }
        if self.lease < self.poll_interval {
            return invalid("RENEWAL_LEASE_SECS", "must not be shorter than the poll interval");
        }
        if self.batch_size < 1 {
            return invalid("RENEWAL_BATCH_SIZE", "must be at least 1");
        }
        if self.max_concurrency < 1 {
            return invalid("RENEWAL_MAX_CONCURRENCY", "must be at least 1");
        }
        if self.retry_base_secs < 1 || self.retry_max_secs < self.retry_base_secs {
            return invalid(
                "RENEWAL_RETRY_MAX_SECS",
                "must be at least RENEWAL_RETRY_BASE_SECS, which must be positive",
            );
        }
        Ok(())
    }

    pub fn schedule_options(&self) -> ScheduleOptions {
        ScheduleOptions {
            window: RenewalWindow::new(self.look_ahead_days),
            lease: chrono::Duration::seconds(self.lease.as_secs() as i64),
            batch_size: self.batch_size,
            max_concurrency: self.max_concurrency,
        }
    }

    pub fn renewal_options(&self, channel_id: i64) -> RenewalOptions {
        RenewalOptions {
            channel_id,
            default_customer_id: self.default_customer_id,
            cancel_orphaned_orders: self.cancel_orphaned_orders,
            retry_base_secs: self.retry_base_secs,
            retry_max_secs: self.retry_max_secs,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3001)));
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000"));
        let database_url: String = get_env("DATABASE_URL");

        let gateway = GatewayConfig {
            store_hash: get_env("BIGCOMMERCE_STORE_HASH"),
            access_token: SecretString::new(get_env::<String>("BIGCOMMERCE_ACCESS_TOKEN").into()),
            api_base: get_env_default(
                "BIGCOMMERCE_API_BASE",
                Url::parse("https://api.bigcommerce.com").expect("static URL"),
            ),
            payments_base: get_env_default(
                "BIGCOMMERCE_PAYMENTS_BASE",
                Url::parse("https://payments.bigcommerce.com").expect("static URL"),
            ),
            channel_id: get_env_default("BIGCOMMERCE_CHANNEL_ID", 1),
            online_method_id: get_env_default(
                "BIGCOMMERCE_ONLINE_METHOD_ID",
                DEFAULT_ONLINE_METHOD_ID.to_string(),
            ),
            request_timeout: Duration::from_secs(get_env_default("GATEWAY_REQUEST_TIMEOUT_SECS", 20)),
            connect_timeout: Duration::from_secs(get_env_default("GATEWAY_CONNECT_TIMEOUT_SECS", 5)),
            get_max_attempts: get_env_default("GATEWAY_GET_MAX_ATTEMPTS", 3),
            retry_base_delay: Duration::from_millis(get_env_default("GATEWAY_RETRY_BASE_MS", 500)),
        };

        let defaults = RenewalSettings::default();
        let renewal = RenewalSettings {
            enabled: get_env_default("RENEWAL_WORKER_ENABLED", defaults.enabled),
            poll_interval: Duration::from_secs(get_env_default(
                "RENEWAL_POLL_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )),
            look_ahead_days: get_env_default("RENEWAL_LOOK_AHEAD_DAYS", defaults.look_ahead_days),
            lease: Duration::from_secs(get_env_default(
                "RENEWAL_LEASE_SECS",
                defaults.lease.as_secs(),
            )),
            batch_size: get_env_default("RENEWAL_BATCH_SIZE", defaults.batch_size),
            max_concurrency: get_env_default("RENEWAL_MAX_CONCURRENCY", defaults.max_concurrency),
            retry_base_secs: get_env_default("RENEWAL_RETRY_BASE_SECS", defaults.retry_base_secs),
            retry_max_secs: get_env_default("RENEWAL_RETRY_MAX_SECS", defaults.retry_max_secs),
            default_customer_id: get_env_default(
                "RENEWAL_DEFAULT_CUSTOMER_ID",
                defaults.default_customer_id,
            ),
            cancel_orphaned_orders: get_env_default(
                "RENEWAL_CANCEL_ORPHANED_ORDERS",
                defaults.cancel_orphaned_orders,
            ),
        };

        let resend_api_key = SecretString::new(get_env::<String>("RESEND_API_KEY").into());
        let email_from: String = get_env_default(
            "EMAIL_FROM",
            "Subscriptions <subscriptions@example.com>".to_string(),
        );

        Self {
            bind_addr,
            cors_origin,
            database_url,
            gateway,
            renewal,
            resend_api_key,
            email_from,
        }
    }
}
