//! tryout CLI: timed practice exams in the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tryout_core::TryoutError;

mod commands;

#[derive(Parser)]
#[command(name = "tryout", version, about = "Timed practice exams with per-category scoring")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and an example package file
    Init,

    /// Check package TOML files for mistakes
    Validate {
        /// Package file or directory
        #[arg(long)]
        package: PathBuf,
    },

    /// Import package files into the store (admin)
    Import {
        /// Package file or directory
        #[arg(long)]
        package: PathBuf,
    },

    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
        /// Defaults to --password
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Sign in
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Sign out
    Logout,

    /// Show the signed-in account
    Whoami,

    /// List available packages and recent sessions
    Packages,

    /// Start or settle the payment for a paid package
    Pay {
        /// Package id
        package: String,

        /// Mark the pending payment as paid
        #[arg(long)]
        confirm: bool,
    },

    /// Take a timed tryout
    Take {
        /// Package id
        package: String,
    },

    /// Show past sessions
    History {
        /// Show the category breakdown of one session
        #[arg(long)]
        session: Option<String>,
    },

    /// Show the leaderboard of a package
    Ranking {
        /// Package id
        package: String,

        #[arg(long, default_value_t = tryout_core::history::RANKING_LIMIT)]
        limit: usize,

        /// Also write an HTML page here
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Payment and score statistics of a package (admin)
    Stats {
        /// Package id
        package: String,

        /// Also write an HTML page here
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Build the report of a session
    Report {
        /// Session id
        session: String,

        /// Output format: text, markdown, json, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Output file (required for html)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show or change payment settings (admin)
    Settings {
        #[arg(long)]
        merchant_id: Option<String>,
        #[arg(long)]
        merchant_name: Option<String>,
        /// Payment window in minutes
        #[arg(long)]
        timeout: Option<u32>,
        /// Enable or disable payments
        #[arg(long)]
        active: Option<bool>,
    },

    /// Manage packages and questions (admin)
    Admin {
        #[command(subcommand)]
        command: commands::admin::AdminCommand,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tryout=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { package } => commands::validate::execute(package),
        Commands::Import { package } => commands::import::execute(config, package).await,
        Commands::Register {
            name,
            email,
            phone,
            password,
            confirm_password,
        } => {
            commands::account::register(config, name, email, phone, password, confirm_password)
                .await
        }
        Commands::Login { email, password } => {
            commands::account::login(config, email, password).await
        }
        Commands::Logout => commands::account::logout(config),
        Commands::Whoami => commands::account::whoami(config).await,
        Commands::Packages => commands::packages::execute(config).await,
        Commands::Pay { package, confirm } => commands::pay::execute(config, package, confirm).await,
        Commands::Take { package } => commands::take::execute(config, package).await,
        Commands::History { session } => commands::history::execute(config, session).await,
        Commands::Ranking {
            package,
            limit,
            html,
        } => commands::ranking::ranking(config, package, limit, html).await,
        Commands::Stats { package, html } => commands::ranking::stats(config, package, html).await,
        Commands::Report {
            session,
            format,
            output,
        } => commands::report::execute(config, session, format, output).await,
        Commands::Settings {
            merchant_id,
            merchant_name,
            timeout,
            active,
        } => {
            commands::settings::execute(config, merchant_id, merchant_name, timeout, active).await
        }
        Commands::Admin { command } => commands::admin::execute(config, command).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<TryoutError>() {
            Some(err) => {
                tracing::debug!("{e:#}");
                eprintln!("Error: {}", err.notice());
            }
            None => eprintln!("Error: {e:#}"),
        }
        process::exit(1);
    }
}
