//! givedb admin tool.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use givedb::{Args, Command, Database, SchemaView};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "givedb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let json = args.json;
    let command = args.command;
    let config = args.into_config();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_path = %config.data_path.display(),
        ?command,
        "starting givedb"
    );

    let database = Database::open(config)?;

    match command {
        Command::Schema => {
            let schema = database.schema()?;
            let view = SchemaView::from(schema.as_ref());
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", view);
            }
        }
        Command::Stats => {
            let stats = database.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("schema version {}", stats.schema_version);
                for (entity, count) in &stats.entities {
                    println!("{:<14}{:>8}", entity, count);
                }
                println!("{:<14}{:>8}", "total", stats.total());
            }
        }
        Command::Check => {
            let report = database.check()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for issue in &report.issues {
                    println!("{}", issue);
                }
                println!(
                    "{} records checked, {} issue(s)",
                    report.records_checked,
                    report.issues.len()
                );
            }
            if !report.is_clean() {
                tracing::warn!(issues = report.issues.len(), "integrity check failed");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
