use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use kasirka_backend::api::{self, AppState};
use kasirka_backend::config::AppConfig;
use kasirka_backend::crypto::DecryptionResolver;
use kasirka_backend::database::{
    self, CheckoutSessionRepository, PaymentChannelRepository, UserRepository,
};
use kasirka_backend::gateway::XenditClient;
use kasirka_backend::logging::init_tracing;
use kasirka_backend::services::accounts::AccountService;
use kasirka_backend::services::checkout::CheckoutService;
use kasirka_backend::services::webhook_processor::WebhookProcessor;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Kasirka payment backend"
    );

    let pool = database::init_pool_from_config(&config.database)
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            e
        })?;
    info!("Database connection pool initialized");

    // Provision eagerly so the first request does not pay the setup cost.
    // The guard stays in place for the callback path regardless.
    database::ensure_ready(&pool, &config.database.schema).await?;
    info!(schema = %config.database.schema, "Database schema ready");

    let sessions = Arc::new(CheckoutSessionRepository::new(pool.clone()));
    let channels = Arc::new(PaymentChannelRepository::new(pool.clone()));
    let users = Arc::new(UserRepository::new(pool.clone()));

    let gateway = Arc::new(XenditClient::new(&config.xendit)?);
    let resolver = Arc::new(DecryptionResolver::new(
        config.xendit.callback_key.clone(),
    ));
    let checkout = Arc::new(CheckoutService::new(
        sessions.clone(),
        channels,
        gateway,
        &config.server,
        &config.xendit,
    ));
    let webhooks = Arc::new(WebhookProcessor::new(sessions.clone()));
    let accounts = Arc::new(AccountService::new(
        users,
        config.auth.reset_token_expiry_minutes,
    ));

    if let (Some(email), Some(password)) = (
        config.auth.bootstrap_email.as_deref(),
        config.auth.bootstrap_password.as_deref(),
    ) {
        match accounts
            .bootstrap_first_user(email, password, Some("Administrator"))
            .await
        {
            Ok(Some(user)) => info!(user_id = %user.id, "Bootstrap admin user created"),
            Ok(None) => info!("Admin users already present, bootstrap skipped"),
            Err(e) => error!("Failed to bootstrap admin user: {}", e),
        }
    }

    let state = AppState {
        pool,
        schema: config.database.schema.clone(),
        resolver,
        sessions,
        checkout,
        webhooks,
        accounts,
    };

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
