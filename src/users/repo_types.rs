use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime, // store clock, always UTC
}

/// Result of a get-or-create: which branch produced the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(User),
    Existing(User),
}

impl Registration {
    pub fn user(&self) -> &User {
        match self {
            Registration::Created(u) | Registration::Existing(u) => u,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Registration::Created(_))
    }
}
