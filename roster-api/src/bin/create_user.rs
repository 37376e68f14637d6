use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use roster_api::auth::{AuthConfig, AuthError, Authenticator, PasswordService, PgCredentialStore};
use roster_api::config::AppConfig;
use roster_api::db;

#[derive(Parser)]
#[command(name = "create_user", about = "Register a roster account from the command line")]
struct Args {
    /// Username, stored exactly as given.
    #[arg(long)]
    username: String,

    /// Plaintext password to hash and store for this user.
    #[arg(long)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    // DATABASE_URL wins so the tool works without the full server environment.
    let (database_url, auth_config) = match std::env::var("DATABASE_URL") {
        Ok(url) => (url, AuthConfig::from_env()?),
        Err(_) => {
            let config = AppConfig::from_env()?;
            (config.database.url(), config.auth)
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    db::run_migrations(&pool).await?;

    let passwords = PasswordService::with_params(auth_config.password)?;
    let authenticator = Authenticator::new(
        Arc::new(passwords),
        Arc::new(PgCredentialStore::new(pool.clone())),
    );

    match authenticator
        .register_identity(&args.username, &args.password)
        .await
    {
        Ok(()) => {
            println!("Created user '{}'", args.username);
            Ok(())
        }
        Err(AuthError::DuplicateUsername) => {
            writeln!(
                io::stderr(),
                "error: username '{}' is already taken.",
                args.username
            )?;
            std::process::exit(1);
        }
        Err(AuthError::InvalidInput(reason)) => {
            writeln!(io::stderr(), "error: {reason}")?;
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
