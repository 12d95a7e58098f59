use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_sync::services::dedupe::remove_duplicate_offerings;

fn is_dry_run() -> bool {
    !std::env::args().any(|a| a == "--apply")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "course_sync=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://course_sync.db".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let dry_run = is_dry_run();
    let report = remove_duplicate_offerings(&pool, !dry_run).await?;

    if dry_run {
        println!(
            "[DRY RUN] Would remove {} duplicate offerings across {} sections (pass --apply to write)",
            report.removed, report.sections
        );
    } else {
        println!(
            "Removed {} duplicate offerings across {} sections ({} failed)",
            report.removed, report.sections, report.failed
        );
    }

    Ok(())
}
