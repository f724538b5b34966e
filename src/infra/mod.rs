use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod app;
pub mod bigcommerce_adapter;
pub mod bigcommerce_client;
pub mod config;
pub mod db;
pub mod error;
pub mod http_client;
pub mod renewal_worker;
pub mod setup;

pub async fn postgres_persistence(database_url: &str) -> anyhow::Result<PostgresPersistence> {
    let pool = init_db(database_url).await?;
    let persistence = PostgresPersistence::new(pool);
    Ok(persistence)
}
