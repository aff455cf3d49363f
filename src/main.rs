use anyhow::Context;
use axum::serve;
use pro_estimate_rust::api::handlers::AppState;
use pro_estimate_rust::api::routes::build_app;
use pro_estimate_rust::config::{AppConfig, AuthMode, StoreBackend};
use pro_estimate_rust::seed;
use pro_estimate_rust::store::{
    AuthProvider, EstimateCache, HostedAuth, MemoryStore, PostgresStore, RestStore, SessionContext,
    StaticAuth, Store,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Info by default, quieter for the database and HTTP client crates; RUST_LOG overrides
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("sqlx", log::LevelFilter::Warn)
        .filter_module("reqwest", log::LevelFilter::Warn)
        .parse_env("RUST_LOG")
        .init();

    println!("ProEstimate: agency estimator server");

    // Load configuration
    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{} store={:?} auth={:?}",
        config.server.host, config.server.port, config.store.backend, config.auth.mode
    );

    let auth = build_auth(&config)?;
    spawn_session_logger(auth.subscribe());

    match config.store.backend {
        StoreBackend::Rest => {
            let store = RestStore::new(&config.project_url()?, &config.api_key()?)
                .context("Failed to create REST store client")?
                .with_sessions(auth.subscribe());
            run(Arc::new(store), auth, &config).await
        }
        StoreBackend::Postgres => {
            println!("Connecting to PostgreSQL...");
            let store = PostgresStore::new(&config.database_url()?, config.max_connections()).await?;
            store.migrate().await?;
            println!("Catalog schema ready");
            run(Arc::new(store), auth, &config).await
        }
        StoreBackend::Memory => run(Arc::new(MemoryStore::new()), auth, &config).await,
    }
}

fn build_auth(config: &AppConfig) -> anyhow::Result<Arc<dyn AuthProvider>> {
    match config.auth.mode {
        AuthMode::Hosted => {
            let auth = HostedAuth::new(&config.project_url()?, &config.api_key()?)
                .context("Failed to create auth client")?;
            Ok(Arc::new(auth))
        }
        AuthMode::Static => {
            let email = config
                .auth
                .admin_email
                .as_deref()
                .context("auth.admin_email is required in static auth mode")?;
            let password = config
                .auth
                .admin_password
                .as_deref()
                .context("auth.admin_password is required in static auth mode")?;
            Ok(Arc::new(StaticAuth::new(email, password)))
        }
    }
}

/// Log every sign-in and sign-out until the provider goes away
fn spawn_session_logger(mut sessions: SessionContext) {
    tokio::spawn(async move {
        while sessions.changed().await {
            match sessions.current() {
                Some(session) => log::info!("Admin session active for {}", session.user.id),
                None => log::info!("Admin session ended"),
            }
        }
    });
}

async fn run<S: Store + 'static>(
    store: Arc<S>,
    auth: Arc<dyn AuthProvider>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    // Load seed data for demonstration (optional)
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        println!("Loading seed data...");
        seed::load_seed_data(&*store).await?;
        println!("Seed data loaded successfully");
    }

    let estimates = EstimateCache::with_ttl(config.estimate_ttl());
    spawn_estimate_sweeper(estimates.clone());

    let state = Arc::new(AppState::new(store, auth, estimates, config.quote.clone()));
    let app = build_app(state, config.server.static_dir.as_deref());

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    println!("ProEstimate server running on http://{}", bind_address);

    serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

fn spawn_estimate_sweeper(estimates: EstimateCache) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let dropped = estimates.clear_expired().await;
            if dropped > 0 {
                log::debug!("Dropped {} expired estimates", dropped);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
