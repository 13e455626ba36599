use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use liftlog_auth::auth::{
    Argon2Hasher, Authenticator, ClientOrigin, CredentialHasher, Credentials, MemoryUserStore,
    RegisterError, RegisterForm,
};
use liftlog_auth::config::{LiftlogConfig, LoggingConfig};
use liftlog_auth::guard::RouteGuard;
use liftlog_auth::ratelimit::Limiters;
use liftlog_auth::session::{record_sign_in, SessionIssuer};

/// Liftlog authentication tools.
#[derive(Debug, Parser)]
#[command(name = "liftlog", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(long, short, env = "LIFTLOG_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print an argon2id hash of a password
    HashPassword {
        password: String,
    },

    /// Decide whether a request would be served or redirected
    Guard {
        /// Path with optional query, e.g. /dashboard?tab=log
        target: String,

        /// Treat the caller as signed in
        #[arg(long, conflicts_with = "session")]
        logged_in: bool,

        /// Session token to verify instead of --logged-in
        #[arg(long)]
        session: Option<String>,
    },

    /// Check credentials against a user file
    Login {
        /// YAML user file
        #[arg(long)]
        users: PathBuf,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// Client address used for rate limiting
        #[arg(long)]
        ip: Option<IpAddr>,
    },

    /// Register an account and save it to a user file
    Register {
        /// YAML user file, created if missing
        #[arg(long)]
        users: PathBuf,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// Defaults to --password
        #[arg(long)]
        confirm_password: Option<String>,

        /// Client address used for rate limiting
        #[arg(long)]
        ip: Option<IpAddr>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = LiftlogConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Liftlog auth starting");

    match cli.command {
        Command::HashPassword { password } => {
            let hasher = Argon2Hasher::new(&config.password)?;
            println!("{}", hasher.hash(&password)?);
            Ok(())
        }
        Command::Guard {
            target,
            logged_in,
            session,
        } => guard(&config, &target, logged_in, session.as_deref()),
        Command::Login {
            users,
            email,
            password,
            ip,
        } => {
            let store = Arc::new(MemoryUserStore::load_yaml(&users)?);
            let authenticator = authenticator(&config, store)?;

            let result = authenticator
                .authorize(&Credentials::new(email, password), &origin(ip))
                .await;
            authenticator.limiters().shutdown().await;

            let identity = match result {
                Ok(identity) => identity,
                Err(e) => bail!("{} (status {})", e.user_message(), e.status_code()),
            };
            record_sign_in(&identity, "credentials");

            println!("{}", serde_json::to_string_pretty(&identity)?);
            if !config.session.secret.is_empty() {
                let issuer = SessionIssuer::new(&config.session)?;
                println!("{}={}", issuer.cookie_name(), issuer.issue(&identity)?);
            }
            Ok(())
        }
        Command::Register {
            users,
            name,
            email,
            password,
            confirm_password,
            ip,
        } => {
            let store = Arc::new(if users.exists() {
                MemoryUserStore::load_yaml(&users)?
            } else {
                MemoryUserStore::new()
            });
            let authenticator = authenticator(&config, store.clone())?;

            let form = RegisterForm {
                name,
                email,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
            };
            let result = authenticator.register(&form, &origin(ip)).await;
            authenticator.limiters().shutdown().await;

            match result {
                Ok(user) => {
                    store.save_yaml(&users)?;
                    println!("{}", serde_json::to_string_pretty(&user)?);
                    Ok(())
                }
                Err(RegisterError::Validation(errors)) => {
                    bail!("{}", serde_json::to_string_pretty(&errors)?)
                }
                Err(e) => bail!("{} (status {})", e, e.status_code()),
            }
        }
    }
}

/// Evaluate the route guard for one target and print the outcome.
fn guard(
    config: &LiftlogConfig,
    target: &str,
    logged_in: bool,
    session: Option<&str>,
) -> anyhow::Result<()> {
    let logged_in = match session {
        Some(token) => SessionIssuer::new(&config.session)?.is_logged_in(Some(token)),
        None => logged_in,
    };

    let guard = RouteGuard::new(config.routes.clone());
    let decision = guard.decide(target, logged_in);

    println!("{}", serde_json::to_string(&decision)?);
    if let Some(location) = decision.location(guard.routes()) {
        println!("Location: {}", location);
    }
    Ok(())
}

fn authenticator(config: &LiftlogConfig, store: Arc<MemoryUserStore>) -> anyhow::Result<Authenticator> {
    let hasher = Argon2Hasher::new(&config.password)?;
    let limiters = Limiters::start(&config.rate_limiting)?;
    Ok(Authenticator::new(store, Arc::new(hasher), limiters))
}

fn origin(ip: Option<IpAddr>) -> ClientOrigin {
    ClientOrigin::from_headers(None, None, ip)
}

/// Initialise logging to stderr. `RUST_LOG` overrides the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
