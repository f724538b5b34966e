//! Test app state builder for HTTP-level testing.
//!
//! `TestAppStateBuilder` wires the real use cases to the in-memory store and
//! the scripted gateway so route tests exercise the full request path.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        ports::commerce_gateway::CommerceGateway,
        use_cases::{
            payment::PaymentProcessor,
            renewal::RenewalOrchestrator,
            renewal_schedule::RenewalScheduler,
            reporting::ReportingUseCases,
            subscription::{SubscriptionProfile, SubscriptionRepo, SubscriptionUseCases},
            verification::TransactionVerifier,
        },
    },
    infra::config::{AppConfig, GatewayConfig, RenewalSettings},
    test_utils::{InMemoryEmailSender, InMemorySubscriptionRepo, ScriptedGateway},
};

pub fn create_test_config() -> AppConfig {
    AppConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        database_url: "postgres://localhost/renewd_test".into(),
        gateway: GatewayConfig {
            store_hash: "test-store".into(),
            access_token: SecretString::new("test-token".into()),
            api_base: Url::parse("http://localhost:9").unwrap(),
            payments_base: Url::parse("http://localhost:9").unwrap(),
            channel_id: 1,
            online_method_id: "braintree.card".into(),
            request_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(1),
            get_max_attempts: 1,
            retry_base_delay: Duration::from_millis(1),
        },
        renewal: RenewalSettings::default(),
        resend_api_key: SecretString::new("re_test".into()),
        email_from: "Subscriptions <test@example.com>".into(),
    }
}

pub struct TestAppStateBuilder {
    repo: Arc<InMemorySubscriptionRepo>,
    gateway: Arc<ScriptedGateway>,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            repo: Arc::new(InMemorySubscriptionRepo::new()),
            gateway: Arc::new(ScriptedGateway::new()),
        }
    }

    pub fn with_subscription(self, subscription: SubscriptionProfile) -> Self {
        self.repo.insert(subscription);
        self
    }

    pub fn repo(&self) -> Arc<InMemorySubscriptionRepo> {
        self.repo.clone()
    }

    pub fn gateway(&self) -> Arc<ScriptedGateway> {
        self.gateway.clone()
    }

    pub fn build(&self) -> AppState {
        let repo = self.repo.clone() as Arc<dyn SubscriptionRepo>;
        let gateway = self.gateway.clone() as Arc<dyn CommerceGateway>;

        let config = create_test_config();
        let orchestrator = RenewalOrchestrator::new(
            repo.clone(),
            gateway.clone(),
            PaymentProcessor::new(gateway.clone(), config.gateway.online_method_id.clone()),
            Arc::new(InMemoryEmailSender::new()),
            config.renewal.renewal_options(config.gateway.channel_id),
        );
        let scheduler =
            RenewalScheduler::new(repo.clone(), orchestrator, config.renewal.schedule_options());

        AppState {
            config: Arc::new(config),
            subscription_use_cases: Arc::new(SubscriptionUseCases::new(repo, gateway.clone())),
            transaction_verifier: Arc::new(TransactionVerifier::new(gateway)),
            reporting_use_cases: Arc::new(ReportingUseCases::new(self.repo.clone())),
            renewal_scheduler: Arc::new(scheduler),
        }
    }
}
