use std::{env, sync::Arc};

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use devtracker::{
    auth::jwt::JwtService,
    config::AppConfig,
    db, digest,
    email::{Mailer, NoopMailer, ResendMailer},
    s3,
    state::AppState,
    storage::S3Storage,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    let command = match args.next().as_deref() {
        Some("daily") => Command::Daily,
        Some("weekly") => Command::Weekly,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\nUsage: digest <daily|weekly>");
            std::process::exit(1);
        }
        None => {
            eprintln!("Usage: digest <daily|weekly>");
            std::process::exit(1);
        }
    };

    let state = build_state().await?;

    match command {
        Command::Daily => {
            let summary = digest::run_daily_snapshot(&state).await?;
            println!(
                "daily snapshot: {} sent, {} failed, {} skipped",
                summary.success, summary.failed, summary.skipped
            );
            for error in &summary.errors {
                eprintln!("  {error}");
            }
        }
        Command::Weekly => {
            let run = digest::run_weekly_report(&state).await?;
            match run.summary {
                None => println!(
                    "weekly report: no activity for {} to {}",
                    run.week_start, run.week_end
                ),
                Some(summary) => {
                    println!(
                        "weekly report ({} to {}): {} sent, {} failed",
                        run.week_start, run.week_end, summary.success, summary.failed
                    );
                    for error in &summary.errors {
                        eprintln!("  {error}");
                    }
                }
            }
        }
    }

    Ok(())
}

enum Command {
    Daily,
    Weekly,
}

async fn build_state() -> Result<AppState> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "digest",
        database_url = %config.redacted_database_url(),
        email_enabled = config.resend_api_key.is_some(),
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let s3_client = s3::build_client(&config).await?;
    let storage = Arc::new(S3Storage::new(s3_client, config.s3_bucket.clone()));
    let mailer: Arc<dyn Mailer> = match ResendMailer::from_config(&config) {
        Some(mailer) => Arc::new(mailer),
        None => Arc::new(NoopMailer),
    };
    let jwt = JwtService::from_config(&config)?;

    Ok(AppState::new(pool, config, storage, mailer, jwt))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
