//! Gym API command-line client
//!
//! Drives the client core from a terminal:
//! 1. Loads config and restores the stored session
//! 2. Runs one command through the session facade
//! 3. Prints the result as JSON on stdout, or the error message on stderr

mod cli;
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser as _;
use gym_client::{CredentialStore, FilePart, RequestSpec, Session, SessionFacade, avatar_file_name};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::HttpTransport;

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gym: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    info!(
        base_url = %config.api.base_url,
        storage = %config.storage.path.display(),
        "configuration loaded"
    );

    let transport = HttpTransport::new(
        &config.api.base_url,
        config.api.timeout(),
        config.api.user_agent.as_deref(),
    )
    .context("building HTTP transport")?;

    let facade = SessionFacade::init(
        Arc::new(transport),
        CredentialStore::new(config.storage.path.clone()),
    )
    .await;

    let output = execute(&facade, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn execute(facade: &SessionFacade, command: Command) -> Result<serde_json::Value> {
    debug!(command = command.name(), "running command");
    let output = match command {
        Command::SignIn { email, password } => {
            facade.sign_in(&email, &password).await?;
            describe(facade, &facade.current_session())
        }
        Command::SignUp {
            name,
            email,
            password,
        } => {
            facade.sign_up(&name, &email, &password).await?;
            json!({ "created": email })
        }
        Command::SignOut => {
            facade.sign_out().await;
            json!({ "session": Session::Anonymous.label() })
        }
        Command::WhoAmI => describe(facade, &facade.current_session()),
        Command::Exercise { id } => serde_json::to_value(facade.exercise(&id).await?)?,
        Command::History { exercise_id } => {
            facade.register_history(&exercise_id).await?;
            json!({ "registered": exercise_id })
        }
        Command::Avatar { file } => {
            let mime = cli::image_mime(&file)
                .with_context(|| format!("{} is not a png or jpeg file", file.display()))?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;

            let session = facade.current_session();
            let owner = session.user().map(|u| u.name.as_str()).unwrap_or("avatar");
            let extension = mime.trim_start_matches("image/");
            let part = FilePart::new("avatar", avatar_file_name(owner, extension), mime, bytes);

            let user = facade.upload_avatar(part).await?;
            json!({ "avatar_url": facade.avatar_url(&user) })
        }
        Command::Get { path } => {
            let body = facade.send(&RequestSpec::get(path)).await?;
            serde_json::from_slice::<serde_json::Value>(&body)
                .unwrap_or_else(|_| json!(String::from_utf8_lossy(&body)))
        }
    };
    Ok(output)
}

fn describe(facade: &SessionFacade, session: &Session) -> serde_json::Value {
    match session.user() {
        Some(user) => json!({
            "session": session.label(),
            "user": user,
            "avatar_url": facade.avatar_url(user),
        }),
        None => json!({ "session": session.label() }),
    }
}
