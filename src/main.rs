use std::process::ExitCode;

use cadet_auth::{AuthConfig, AuthError, SessionManager, UserAttributes};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("nothing to update; pass --email and/or --username")]
    EmptyUpdate,
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("interrupted: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "cadet-auth", about = "Aspirant portal session client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password.
    Login(Credentials),
    /// Create an account.
    Register(Register),
    /// Request a password-reset email.
    Reset { email: String },
    /// End the current session.
    Logout,
    /// Change email and/or username of the signed-in user.
    Update(Update),
    /// Fetch the signed-in user's profile.
    Profile,
    /// Print the current auth state.
    Status,
    /// Print every auth state change until Ctrl-C.
    Watch,
}

#[derive(Args, Debug)]
struct Credentials {
    email: String,
    #[arg(long, env = "AUTH_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct Register {
    #[command(flatten)]
    credentials: Credentials,
    #[arg(long)]
    username: String,
}

#[derive(Args, Debug)]
struct Update {
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    username: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), CliError> {
    let config = AuthConfig::from_env()?;
    let manager = SessionManager::from_config(&config)?;
    let (listener, init) = manager.start().await;
    if let Err(e) = init {
        tracing::warn!(error = %e, "continuing without restored session");
    }

    match command {
        Command::Login(c) => print_json(&manager.sign_in(&c.email, &c.password).await?)?,
        Command::Register(r) => {
            let c = r.credentials;
            print_json(&manager.sign_up(&c.email, &c.password, &r.username).await?)?;
        }
        Command::Reset { email } => print_json(&manager.reset_password(&email).await?)?,
        Command::Logout => {
            manager.sign_out().await?;
            print_json(&manager.snapshot())?;
        }
        Command::Update(u) => {
            if u.email.is_none() && u.username.is_none() {
                return Err(CliError::EmptyUpdate);
            }
            let attributes = UserAttributes { email: u.email, username: u.username };
            print_json(&manager.update_user(&attributes).await?)?;
        }
        Command::Profile => print_json(&manager.get_profile().await?)?,
        Command::Status => print_json(&manager.snapshot())?,
        Command::Watch => watch(&manager).await?,
    }

    listener.stop().await;
    Ok(())
}

async fn watch(manager: &SessionManager) -> Result<(), CliError> {
    let mut rx = manager.subscribe();
    print_json(&*rx.borrow_and_update())?;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = rx.borrow_and_update().clone();
                print_json(&snapshot)?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                return Ok(());
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
