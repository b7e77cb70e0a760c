use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coffee_shop::config::{self, Config};
use coffee_shop::middleware::oidc::TokenVerifier;
use coffee_shop::middleware::rbac::check_permissions;
use coffee_shop::store::postgres::PgStore;
use coffee_shop::store::DrinkStore;
use coffee_shop::{api, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Export spans over OTLP only when an endpoint is configured.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "coffee-shop"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "coffee_shop=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => serve(port).await,
        Some(cli::Commands::Migrate { reset }) => run_migrations(reset).await,
        Some(cli::Commands::VerifyToken { token, permission }) => {
            verify_token(&token, permission.as_deref()).await
        }
        None => serve(None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn serve(port: Option<u16>) -> anyhow::Result<()> {
    let cfg = config::load()?;
    let port = port.unwrap_or(cfg.port);
    run_server(cfg, port).await
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.db.url, cfg.db.max_connections).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    if cfg.db.reset_on_start {
        tracing::warn!("DB_RESET_ON_START is set: emptying drinks table");
        db.reset().await?;
    }

    let verifier = TokenVerifier::from_config(&cfg.auth)?;
    tracing::info!(
        issuer = %cfg.auth.issuer,
        audience = %cfg.auth.audience,
        "Token verifier ready"
    );

    let state = AppState::new(cfg, Arc::new(db), verifier);
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Coffee shop API listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_migrations(reset: bool) -> anyhow::Result<()> {
    let db_cfg = config::load_database()?;
    let db = PgStore::connect(&db_cfg.url, db_cfg.max_connections).await?;
    db.migrate().await?;
    println!("Migrations applied.");

    if reset {
        db.reset().await?;
        println!("Drinks table reset and seeded.");
    }
    Ok(())
}

async fn verify_token(token: &str, permission: Option<&str>) -> anyhow::Result<()> {
    let cfg = config::load()?;
    let verifier = TokenVerifier::from_config(&cfg.auth)?;

    let outcome = match verifier.verify(token).await {
        Ok(claims) => match permission {
            Some(p) => check_permissions(p, &claims).map(|_| claims),
            None => Ok(claims),
        },
        Err(e) => Err(e),
    };

    match outcome {
        Ok(claims) => {
            println!("Token is valid.");
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(())
        }
        Err(e) => {
            anyhow::bail!("{} ({} {})", e.description(), e.status().as_u16(), e.code())
        }
    }
}
