pub mod invoke;
pub mod server;

// Internal "interpreter" for `Action`.
mod run;

use crate::api::handlers::auth::AuthHandler;
use crate::store::PgStore;
use secrecy::SecretString;
use sqlx::PgPool;
use std::time::Duration;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Invoke(invoke::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}

/// Store settings shared by `server` and `invoke`.
#[derive(Debug)]
pub struct StoreArgs {
    pub dsn: SecretString,
    pub db_timeout: Duration,
    pub session_ttl_days: i64,
}

impl StoreArgs {
    /// Build the auth handler on top of a Postgres pool.
    #[must_use]
    pub fn handler(&self, pool: PgPool) -> AuthHandler {
        AuthHandler::new(std::sync::Arc::new(PgStore::new(pool, self.db_timeout)))
            .with_session_ttl(chrono::Duration::days(self.session_ttl_days))
    }
}
