use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{email::resend::ResendEmailSender, http::app_state::AppState},
    application::{
        ports::{commerce_gateway::CommerceGateway, email_sender::EmailSender},
        use_cases::{
            payment::PaymentProcessor,
            renewal::RenewalOrchestrator,
            renewal_schedule::RenewalScheduler,
            reporting::{ReportingRepo, ReportingUseCases},
            subscription::{SubscriptionRepo, SubscriptionUseCases},
            verification::TransactionVerifier,
        },
    },
    infra::{
        bigcommerce_adapter::BigCommerceGateway,
        bigcommerce_client::BigCommerceClient,
        config::AppConfig,
        http_client::{try_build_client, try_build_gateway_client},
        postgres_persistence,
    },
};

const LOG_FILE: &str = "renewd.log";

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();
    config.renewal.validate()?;

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let repo = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let reporting_repo = postgres_arc.clone() as Arc<dyn ReportingRepo>;

    let gateway_client = BigCommerceClient::new(
        try_build_gateway_client(&config.gateway)?,
        config.gateway.clone(),
    );
    let gateway = Arc::new(BigCommerceGateway::new(gateway_client)) as Arc<dyn CommerceGateway>;

    let email = Arc::new(ResendEmailSender::new(
        try_build_client()?,
        config.resend_api_key.clone(),
        config.email_from.clone(),
    )) as Arc<dyn EmailSender>;

    let orchestrator = RenewalOrchestrator::new(
        repo.clone(),
        gateway.clone(),
        PaymentProcessor::new(gateway.clone(), config.gateway.online_method_id.clone()),
        email,
        config.renewal.renewal_options(config.gateway.channel_id),
    );
    let renewal_scheduler =
        RenewalScheduler::new(repo.clone(), orchestrator, config.renewal.schedule_options());

    let subscription_use_cases = SubscriptionUseCases::new(repo, gateway.clone());
    let transaction_verifier = TransactionVerifier::new(gateway);
    let reporting_use_cases = ReportingUseCases::new(reporting_repo);

    Ok(AppState {
        config: Arc::new(config),
        subscription_use_cases: Arc::new(subscription_use_cases),
        transaction_verifier: Arc::new(transaction_verifier),
        reporting_use_cases: Arc::new(reporting_use_cases),
        renewal_scheduler: Arc::new(renewal_scheduler),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "renewd=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer().with_target(false).with_level(true).pretty();

    // File (structured JSON logs); skipped when the file cannot be created
    let json_layer = File::create(LOG_FILE).ok().map(|file| {
        fmt::layer()
            .json()
            .with_writer(file)
            .with_current_span(true)
            .with_span_list(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
