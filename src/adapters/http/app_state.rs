use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    infra::config::AppConfig,
    use_cases::{
        renewal_schedule::RenewalScheduler, reporting::ReportingUseCases,
        subscription::SubscriptionUseCases,
        verification::TransactionVerifier,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub transaction_verifier: Arc<TransactionVerifier>,
    pub reporting_use_cases: Arc<ReportingUseCases>,
    pub renewal_scheduler: Arc<RenewalScheduler>,
}

impl FromRef<AppState> for Arc<SubscriptionUseCases> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.subscription_use_cases.clone()
    }
}

impl FromRef<AppState> for Arc<TransactionVerifier> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.transaction_verifier.clone()
    }
}

impl FromRef<AppState> for Arc<ReportingUseCases> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.reporting_use_cases.clone()
    }
}
