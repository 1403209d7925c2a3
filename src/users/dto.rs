use serde::{Deserialize, Serialize};

use crate::users::repo_types::{Registration, User};

/// Request body for `POST /`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Created,
    Exists,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub status: RegistrationStatus,
    pub user: User,
}

impl From<Registration> for RegistrationResponse {
    fn from(reg: Registration) -> Self {
        match reg {
            Registration::Created(user) => Self {
                status: RegistrationStatus::Created,
                user,
            },
            Registration::Existing(user) => Self {
                status: RegistrationStatus::Exists,
                user,
            },
        }
    }
}
