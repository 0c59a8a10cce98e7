//! Maintenance commands that run outside the HTTP server.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use diesel::pg::PgConnection;
use diesel::Connection;
use log::{error, info};

use clubsite::logger::setup_logger;
use clubsite::migrations::{self, EXPECTED_TABLES, SCHEMA_SQL};
use clubsite::models::NewAdminAccount;
use clubsite::services::AuthService;
use clubsite::validation::{is_valid_email, normalize_email};

#[derive(Parser, Debug)]
#[command(name = "clubctl", version)]
#[command(about = "Club site database maintenance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply the schema inside one transaction
    Migrate {
        /// SQL file to run instead of the bundled schema
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Check connectivity and that every expected table exists
    HealthCheck,
    /// Create an admin account, or reset the password of an existing one
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
}

fn run(cli: Cli) -> Result<(), String> {
    let mut conn =
        PgConnection::establish(&cli.database_url).map_err(|e| format!("Failed to connect to database: {}", e))?;

    match cli.command {
        Command::Migrate { file } => {
            let sql = match &file {
                Some(path) => std::fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?,
                None => SCHEMA_SQL.to_string(),
            };
            migrations::apply_schema(&mut conn, &sql).map_err(|e| format!("Migration failed: {}", e))?;
            info!("Migration completed");
        }
        Command::HealthCheck => {
            migrations::probe(&mut conn).map_err(|e| format!("Database probe failed: {}", e))?;
            let missing = migrations::missing_tables(&mut conn, EXPECTED_TABLES)
                .map_err(|e| format!("Could not list tables: {}", e))?;
            if !missing.is_empty() {
                return Err(format!("Missing tables: {}", missing.join(", ")));
            }
            info!("Database healthy, all {} tables present", EXPECTED_TABLES.len());
        }
        Command::CreateAdmin { email, password, name } => {
            let email = normalize_email(&email);
            if !is_valid_email(&email) {
                return Err("Invalid email format".to_string());
            }
            if password.len() < 8 {
                return Err("Password must be at least 8 characters".to_string());
            }
            let password_hash = AuthService::hash_password(&password).map_err(|e| e.to_string())?;
            let account = NewAdminAccount {
                email,
                password_hash,
                name: name.filter(|n| !n.trim().is_empty()),
                is_active: true,
            };
            let saved = migrations::upsert_admin(&mut conn, &account)
                .map_err(|e| format!("Failed to save admin account: {}", e))?;
            info!("Admin account {} ready (id {})", saved.email, saved.id);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    setup_logger();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
