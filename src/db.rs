use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, Connection, PgConnection, PgPool};
use tracing::{info, warn};

use crate::config::DatabaseConfig;

const DUPLICATE_DATABASE: &str = "42P04";

/// Makes sure the database and the `users` table exist, then returns a pool for it.
pub async fn bootstrap(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    ensure_database(cfg).await?;
    let pool = connect_pool(cfg).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

pub async fn connect_pool(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect_with(cfg.connect_options())
        .await
        .with_context(|| format!("connect to database {}", cfg.name))
}

/// Creates the target database through the admin database when it is missing.
pub async fn ensure_database(cfg: &DatabaseConfig) -> anyhow::Result<()> {
    let mut conn = PgConnection::connect_with(&cfg.admin_connect_options())
        .await
        .context("connect to admin database")?;

    let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM pg_database WHERE datname = $1")
        .bind(&cfg.name)
        .fetch_optional(&mut conn)
        .await
        .context("look up database")?
        .is_some();

    if exists {
        info!(database = %cfg.name, "database already exists");
    } else {
        // CREATE DATABASE takes no bind parameters and cannot run in a transaction.
        let stmt = format!("CREATE DATABASE {}", quote_ident(&cfg.name));
        match sqlx::query(&stmt).execute(&mut conn).await {
            Ok(_) => info!(database = %cfg.name, "database created"),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(DUPLICATE_DATABASE) => {
                warn!(database = %cfg.name, "database created concurrently; continuing");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("create database {}", cfg.name));
            }
        }
    }

    conn.close().await.context("close admin connection")?;
    Ok(())
}

pub async fn ensure_schema(db: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(db)
    .await
    .context("create users table")?;
    info!("users table ready");
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
