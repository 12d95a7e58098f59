use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_sync::api::router;
use course_sync::config::SyncConfig;
use course_sync::services::{LogNotifier, RunStatus, SyncOptions, SyncScheduler, SyncService, repair_orphans};
use course_sync::state::AppState;
use course_sync::upstream::{CatalogClient, CatalogHttpClient};

enum Command {
    Serve,
    Refresh,
    AttachOrphans,
}

fn parse_command() -> Result<Command, String> {
    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => Ok(Command::Serve),
        Some("refresh") => Ok(Command::Refresh),
        Some("attach-orphans") => Ok(Command::AttachOrphans),
        Some(other) => Err(format!(
            "unknown command {:?} (expected serve, refresh or attach-orphans)",
            other
        )),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "course_sync=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = parse_command()?;
    let config = SyncConfig::new_from_env()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://course_sync.db".to_string());
    let connect_options = database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let catalog: Arc<dyn CatalogClient> = Arc::new(CatalogHttpClient::new(config.clone())?);
    let options = SyncOptions::from(&config);

    match command {
        Command::Refresh => {
            let report = SyncService::new(pool.clone(), catalog, options).refresh().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.status == RunStatus::Failed {
                error!("Refresh failed: {}", report.diagnostic.unwrap_or_default());
                std::process::exit(1);
            }
        }
        Command::AttachOrphans => {
            let report = repair_orphans(&pool).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.status == RunStatus::Failed {
                std::process::exit(1);
            }
        }
        Command::Serve => {
            let state = AppState::new(pool.clone(), catalog.clone(), options.clone());

            let scheduler = SyncScheduler::new(pool.clone(), catalog, options, config.refresh_interval)
                .with_run_lock(state.run_lock.clone())
                .with_notifier(Arc::new(LogNotifier::new(config.notify_email.clone())));
            tokio::spawn(scheduler.start());

            let app = router(state);

            let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
            info!("listening on http://{}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
