use crate::config::AppConfig;
use crate::db;
use crate::users::repo::{PgUserRepo, UserRepo};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
}

impl AppState {
    /// Bootstraps the database and wires the Postgres-backed repository.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::bootstrap(&config.db).await?;
        let users = Arc::new(PgUserRepo::new(pool)) as Arc<dyn UserRepo>;
        Ok(Self::from_parts(Arc::new(config), users))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserRepo>) -> Self {
        Self { config, users }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::users::repo::fakes::MemoryUserRepo;

        let config = AppConfig::from_lookup(|_| None).expect("default config");
        Self::from_parts(Arc::new(config), Arc::new(MemoryUserRepo::default()))
    }

    #[cfg(test)]
    pub fn with_users(mut self, users: Arc<dyn UserRepo>) -> Self {
        self.users = users;
        self
    }
}
