use std::fmt;

use anyhow::Context;
use sqlx::postgres::PgConnectOptions;

/// Database the server always has, used to create the target one.
const ADMIN_DATABASE: &str = "postgres";

#[derive(Clone)]
pub struct DatabaseConfig {
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Connection options for the configured target database.
    pub fn connect_options(&self) -> PgConnectOptions {
        self.options_for(&self.name)
    }

    /// Connection options for the administrative database, same credentials.
    pub fn admin_connect_options(&self) -> PgConnectOptions {
        self.options_for(ADMIN_DATABASE)
    }

    fn options_for(&self, database: &str) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(database)
    }
}

// Hand-written so the password never ends up in logs.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db: DatabaseConfig,
    pub host: String,
    pub port: u16,
    /// Put raw driver messages into 500 responses instead of a generic text.
    pub expose_db_errors: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let db = DatabaseConfig {
            name: var("POSTGRES_DB", "docker-learn"),
            user: var("POSTGRES_USER", "postgres"),
            password: var("POSTGRES_PASSWORD", "postgres"),
            host: var("POSTGRES_HOST", "localhost"),
            port: var("POSTGRES_PORT", "5432")
                .parse()
                .context("POSTGRES_PORT must be a port number")?,
            max_connections: var("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
        };
        anyhow::ensure!(!db.name.is_empty(), "POSTGRES_DB must not be empty");
        anyhow::ensure!(db.max_connections > 0, "DB_MAX_CONNECTIONS must be at least 1");

        Ok(Self {
            db,
            host: var("APP_HOST", "0.0.0.0"),
            port: var("APP_PORT", "8080")
                .parse()
                .context("APP_PORT must be a port number")?,
            expose_db_errors: parse_flag(&var("EXPOSE_DB_ERRORS", "false")),
        })
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
