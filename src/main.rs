use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use jobboard::auth::jwt::JwtService;
use jobboard::config::AppConfig;
use jobboard::db;
use jobboard::routes;
use jobboard::state::AppState;
use jobboard::store::PgApplicationStore;
use jobboard::uploads::LocalResumeStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        upload_dir = %config.upload_dir.display(),
        max_resume_bytes = config.max_resume_bytes,
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    db::run_migrations(&pool)?;

    let resumes = LocalResumeStore::new(config.upload_dir.clone());
    resumes.ensure_root().await?;
    let applications = PgApplicationStore::new(pool.clone());
    let jwt = JwtService::from_config(&config)?;

    let state = AppState::new(pool, config, jwt, Arc::new(resumes), Arc::new(applications));
    let listen_addr: SocketAddr =
        format!("{}:{}", state.config.server_host, state.config.server_port).parse()?;
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
