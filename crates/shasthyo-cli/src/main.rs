//! Shasthyo CLI - Offline-first health triage from the terminal
//!
//! Wraps the core engine for field testing and scripting: triage,
//! profile management, queue inspection, and manual sync.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands, ProfileCommands};
use crate::commands::common::CliContext;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shasthyo=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let context = CliContext::resolve(cli.db_path, cli.api_url, cli.offline)?;

    match cli.command {
        Commands::Triage {
            symptoms,
            duration,
            json,
        } => commands::triage::run_triage(&symptoms, duration, json, &context).await?,
        Commands::Symptoms { refresh, json } => {
            commands::symptoms::run_symptoms(refresh, json, &context).await?;
        }
        Commands::Profile { command } => match command {
            ProfileCommands::Set {
                age,
                gender,
                location,
            } => commands::profile::run_profile_set(age, &gender, location, &context).await?,
            ProfileCommands::Show { json } => {
                commands::profile::run_profile_show(json, &context).await?;
            }
        },
        Commands::Queue { limit, json } => {
            commands::queue::run_queue(limit, json, &context).await?;
        }
        Commands::Sync => commands::sync::run_sync(&context).await?,
        Commands::Status { json } => commands::status::run_status(json, &context).await?,
        Commands::Consultations { json } => {
            commands::consultations::run_consultations(json, &context).await?;
        }
    }

    Ok(())
}
