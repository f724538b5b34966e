use std::net::SocketAddr;

use dotenvy::dotenv;
use tokio::sync::watch;
use tracing::{error, info};

use renewd::infra::{
    app::create_app,
    error::InfraError,
    renewal_worker::run_renewal_loop,
    setup::{init_app_state, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;
    let renewal = app_state.config.renewal.clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn the renewal worker (after tracing is initialized)
    let worker = if renewal.enabled {
        Some(tokio::spawn(run_renewal_loop(
            app_state.renewal_scheduler.clone(),
            renewal.poll_interval,
            shutdown_rx.clone(),
        )))
    } else {
        info!("Renewal worker disabled");
        None
    };

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(InfraError::TcpBind)?;

    info!("Backend listening at {}", &listener.local_addr()?);

    let mut server_shutdown = shutdown_rx;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    })
    .await
    .map_err(InfraError::Server)?;

    if let Some(worker) = worker {
        if let Err(e) = worker.await {
            error!(error = %e, "Renewal worker panicked");
        }
    }

    info!("Shutdown complete");
    Ok(())
}
