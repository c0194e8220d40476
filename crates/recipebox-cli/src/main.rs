//! Recipebox CLI - a terminal front end for the recipebox API.
//!
//! Signs in against the backend, keeps the session token in the OS
//! keychain, and issues authenticated calls with transparent token refresh.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recipebox_core::{ApiClient, ClientConfig, Config, KeyringStorage, PendingRequest, SessionStore};
use reqwest::Method;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "recipebox", version, about = "Talk to the recipebox API from the terminal")]
struct Cli {
    /// API base URL (overrides RECIPEBOX_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    Signin {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// End the current session
    Signout,
    /// Send an authenticated request and print the JSON response
    Request {
        /// HTTP method (GET, POST, PATCH, PUT, DELETE)
        method: String,
        /// Path relative to the API base URL, e.g. /recipes
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
    /// Show whether a session token is stored
    Token,
}

fn parse_method(method: &str) -> Result<Method> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PATCH" => Ok(Method::PATCH),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        other => anyhow::bail!("Unsupported HTTP method: {}", other),
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load()?;
    let mut client_config = config.client_config();
    if let Some(url) = cli.api_url.as_deref() {
        client_config = ClientConfig::new(url);
    }
    info!(base_url = %client_config.base_url, "recipebox starting");

    let session = Arc::new(SessionStore::new(KeyringStorage::new()));
    session.on_session_expired(|| {
        eprintln!("Your session has ended. Run `recipebox signin` to sign in again.");
    });
    let client = ApiClient::new(client_config, session.clone())?;

    match cli.command {
        Command::Signin { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => anyhow::bail!("No email given; pass --email"),
            };
            let password = rpassword::prompt_password("Password: ")?;
            client.sign_in(&email, &password).await?;
            config.last_email = Some(email.clone());
            config.save().context("Failed to save config")?;
            println!("Signed in as {}", email);
        }
        Command::Signup { name, email } => {
            let password = rpassword::prompt_password("Password: ")?;
            client.sign_up(&name, &email, &password).await?;
            config.last_email = Some(email.clone());
            config.save().context("Failed to save config")?;
            println!("Account created for {}", email);
        }
        Command::Signout => {
            client.sign_out().await;
            println!("Signed out");
        }
        Command::Request { method, path, body } => {
            let mut request = PendingRequest::new(parse_method(&method)?, path);
            if let Some(body) = body {
                let body: Value = serde_json::from_str(&body).context("--body is not valid JSON")?;
                request = request.with_body(body);
            }
            let response = client.execute_with_recovery(request).await?;
            if !response.is_null() {
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
        }
        Command::Token => {
            if session.get_token().is_some() {
                println!("A session token is stored");
            } else {
                println!("Not signed in");
            }
        }
    }

    Ok(())
}
