use axum::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::error::DbError;
use crate::users::repo_types::{Registration, User};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Returns the user for `email`, inserting it first when it does not exist yet.
    async fn get_or_create(&self, email: &str) -> Result<Registration, DbError>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn get_or_create(&self, email: &str) -> Result<Registration, DbError> {
        // The transaction owns the pooled connection until commit or rollback.
        let mut tx = self.pool.begin().await?;
        match get_or_create_tx(&mut tx, email).await {
            Ok(reg) => {
                tx.commit().await?;
                Ok(reg)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "rollback failed");
                }
                Err(e.into())
            }
        }
    }
}

async fn get_or_create_tx(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
) -> Result<Registration, sqlx::Error> {
    if let Some(user) = find_by_email_tx(tx, email).await? {
        return Ok(Registration::Existing(user));
    }
    if let Some(user) = insert_if_absent_tx(tx, email).await? {
        return Ok(Registration::Created(user));
    }

    // Another request inserted the same email between our lookup and insert.
    debug!(%email, "lost insert race, reading winner");
    let user = find_by_email_tx(tx, email)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok(Registration::Existing(user))
}

/// Find a user by exact email.
pub async fn find_by_email_tx(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, created_at::timestamptz AS created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(&mut **tx)
    .await
}

/// Insert a user; `None` when the email already exists.
pub async fn insert_if_absent_tx(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email)
        VALUES ($1)
        ON CONFLICT (email) DO NOTHING
        RETURNING id, email, created_at::timestamptz AS created_at
        "#,
    )
    .bind(email)
    .fetch_optional(&mut **tx)
    .await
}
