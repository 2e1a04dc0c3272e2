//! Command-line arguments

use std::path::{Path, PathBuf};

/// Command-line client for the gym API
#[derive(Debug, clap::Parser)]
#[command(name = "gym")]
#[command(about = "Sign in to the gym API and call it with the stored session")]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, env = "GYM_CONFIG", default_value = "gym.toml")]
    pub config: PathBuf,

    /// Write logs to stderr as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, clap::Subcommand)]
pub enum Command {
    /// Start a session
    SignIn { email: String, password: String },

    /// Create an account
    SignUp {
        name: String,
        email: String,
        password: String,
    },

    /// End the session
    SignOut,

    /// Show the current session
    #[command(name = "whoami")]
    WhoAmI,

    /// Show one exercise
    Exercise { id: String },

    /// Mark an exercise as done
    History { exercise_id: String },

    /// Upload a new avatar (png or jpeg, up to 5MB)
    Avatar { file: PathBuf },

    /// GET any API path with the session token
    Get {
        #[arg(value_parser = api_path)]
        path: String,
    },
}

impl Command {
    /// Command word, for logs. Never includes arguments.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SignIn { .. } => "sign-in",
            Command::SignUp { .. } => "sign-up",
            Command::SignOut => "sign-out",
            Command::WhoAmI => "whoami",
            Command::Exercise { .. } => "exercise",
            Command::History { .. } => "history",
            Command::Avatar { .. } => "avatar",
            Command::Get { .. } => "get",
        }
    }
}

fn api_path(path: &str) -> Result<String, String> {
    match path {
        "" => Err("path must not be empty".into()),
        p if p.starts_with('/') => Ok(p.to_owned()),
        p => Ok(format!("/{p}")),
    }
}

/// MIME type for an avatar file, from its extension.
pub fn image_mime(file: &Path) -> Option<&'static str> {
    let extension = file.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}
