use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method, header};
use clap::{Parser, Subcommand};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use evently::config::Config;
use evently::db::{AppState, DbPool, create_pool, init_db};
use evently::handlers;
use evently::identity::{IdentityWebhookVerifier, SessionVerifier};
use evently::payments::StripeClient;

#[derive(Parser)]
#[command(name = "evently", version, about = "Event management and ticketing backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Override HOST
    #[arg(long, global = true)]
    host: Option<String>,

    /// Override PORT
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Override DATABASE_PATH
    #[arg(long, global = true)]
    database: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create the database schema and exit
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evently=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    let pool = create_pool(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path))?;
    {
        let conn = pool.get()?;
        init_db(&conn).context("Failed to initialize schema")?;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::InitDb => {
            tracing::info!("Schema ready at {}", config.database_path);
            Ok(())
        }
        Command::Serve => serve(config, pool).await,
    }
}

fn build_state(config: &Config, pool: DbPool) -> anyhow::Result<AppState> {
    let stripe = match (&config.stripe_secret_key, &config.stripe_webhook_secret) {
        (Some(key), Some(webhook_secret)) => Some(StripeClient::new(key, webhook_secret)),
        (None, None) => {
            tracing::warn!("Stripe not configured: paid checkouts are disabled");
            None
        }
        _ => {
            tracing::warn!(
                "STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET must both be set: paid checkouts are disabled"
            );
            None
        }
    };

    let sessions = config
        .identity_jwt_public_key
        .as_deref()
        .map(|pem| SessionVerifier::from_pem(pem, config.identity_issuer.clone()))
        .transpose()
        .context("IDENTITY_JWT_PUBLIC_KEY is not a valid RSA public key")?
        .map(Arc::new);
    if sessions.is_none() {
        tracing::warn!("IDENTITY_JWT_PUBLIC_KEY not set: authenticated routes will reject all requests");
    }

    let identity_webhook = config
        .identity_webhook_secret
        .as_deref()
        .map(IdentityWebhookVerifier::new)
        .transpose()
        .context("IDENTITY_WEBHOOK_SECRET is not a valid whsec_ secret")?;

    Ok(AppState {
        db: pool,
        base_url: config.base_url.clone(),
        currency: config.currency.clone(),
        stripe,
        sessions,
        identity_webhook,
        dev_mode: config.dev_mode,
    })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn serve(config: Config, pool: DbPool) -> anyhow::Result<()> {
    let state = build_state(&config, pool)?;

    if state.dev_mode {
        tracing::warn!("Running in DEV mode: /dev endpoints are enabled");
    }

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .finish()
            .context("Invalid rate limit configuration")?,
    );

    // Forget idle client buckets
    let limiter = governor_conf.limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            limiter.retain_recent();
        }
    });

    let app = handlers::open_routes(&state)
        .layer(GovernorLayer::new(governor_conf))
        .merge(handlers::account_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
        .with_state(state);

    let addr = config.addr();
    tracing::info!("Evently listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
