//! Operator entry point for scheduled maintenance of the request store.
use clap::{Parser, Subcommand};
use maker_checker::{Config, MakerChecker};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "maker-checker")]
#[command(about = "Maker-checker request maintenance", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark pending requests older than the configured window as expired
    ExpireOverdueRequests,
}

// Load configuration, open the store and run one sweep.
fn expire_overdue_requests() -> anyhow::Result<Option<usize>> {
    let config = Config::from_env()?;
    let engine = MakerChecker::open(config)?;
    Ok(engine.expire_overdue_requests()?)
}

// The line printed for a sweep outcome. Scheduled runs always exit cleanly,
// so an error becomes a warning.
fn report(outcome: &anyhow::Result<Option<usize>>) -> String {
    match outcome {
        Ok(None) => "Request expiration is not configured. Set MAKER_CHECKER_REQUEST_EXPIRATION_MINUTES to enable it.".to_string(),
        Ok(Some(count)) => format!("Expired {count} overdue request(s)."),
        Err(e) => format!("Warning: overdue requests were not expired: {e:#}"),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::ExpireOverdueRequests => {
            let outcome = expire_overdue_requests();
            if let Err(e) = &outcome {
                tracing::warn!(error = %e, "expiration sweep skipped");
            }
            println!("{}", report(&outcome));
        }
    }

    Ok(())
}
