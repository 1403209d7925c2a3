use tracing::{debug, error, info};

use crate::{
    error::ApiError,
    state::AppState,
    users::repo_types::Registration,
};

/// Missing or empty emails are rejected; anything else is used verbatim.
pub(crate) fn require_email(raw: Option<String>) -> Result<String, ApiError> {
    match raw {
        Some(email) if !email.is_empty() => Ok(email),
        _ => Err(ApiError::EmailRequired),
    }
}

pub async fn register_email(
    state: &AppState,
    raw_email: Option<String>,
) -> Result<Registration, ApiError> {
    let email = require_email(raw_email)?;

    let reg = state.users.get_or_create(&email).await.map_err(|e| {
        error!(error = %e, kind = e.kind.as_str(), %email, "get_or_create failed");
        ApiError::database(e, state.config.expose_db_errors)
    })?;

    let user = reg.user();
    if reg.is_created() {
        info!(user_id = user.id, email = %user.email, "user created");
    } else {
        debug!(user_id = user.id, email = %user.email, "user exists");
    }
    Ok(reg)
}
