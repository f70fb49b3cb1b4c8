//! Directory Service Binary
//!
//! Runs the registration API server and the certificate manager worker.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gds_server::certman::{start, CertificateManager};
use gds_server::emails::{EmailCourier, LogTransport};
use gds_server::{create_router, AppState, Config, MemoryStore, MemoryVault};
use gds_sectigo::SectigoClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gds_server=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    if !config.gds.enabled {
        warn!("directory service is not enabled");
        return Ok(());
    }
    if config.maintenance {
        warn!("starting directory service in maintenance mode");
    }

    // Storage and vault backends. Durable engines plug in behind the same
    // traits; the defaults keep state in process memory.
    let store = Arc::new(MemoryStore::new());
    let vault = Arc::new(MemoryVault::new());
    let courier = Arc::new(EmailCourier::new(
        Arc::new(LogTransport),
        &config.email.service_email,
        &config.email.admin_email,
        &config.email.verify_base_url,
    ));
    let ca = Arc::new(SectigoClient::new(
        &config.sectigo.base_url,
        &config.sectigo.username,
        &config.sectigo.password,
    )?);

    // Start the certificate manager worker.
    let manager = CertificateManager::new(
        store.clone(),
        vault.clone(),
        courier.clone(),
        ca,
        config.certman.clone(),
    );
    let (stop, manager_handle) = start(manager);

    // Build and serve the registration API.
    let state = Arc::new(AppState {
        store,
        vault,
        courier,
        config: config.clone(),
    });
    let app = create_router(state);

    // The manager only returns early on a storage or vault contract
    // violation; treat that as fatal so operators notice.
    tokio::spawn(async move {
        match manager_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(error = %err, "certificate manager failed");
                std::process::exit(1);
            }
            Err(err) => {
                error!(error = %err, "certificate manager panicked");
                std::process::exit(1);
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&config.gds.bind_addr).await?;
    info!(addr = %config.gds.bind_addr, directory = %config.directory_id, "directory service listening");

    axum::serve(listener, app).await?;
    let _ = stop.send(true);
    Ok(())
}
