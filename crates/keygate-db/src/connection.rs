//! SurrealDB connection bootstrap.
//!
//! `DbManager::bootstrap` is the deployment entry point: it connects,
//! authenticates, selects the namespace/database, and brings the
//! schema up to date before handing out a client.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::StoreError;
use crate::schema::run_migrations;

/// Connection settings for a remote SurrealDB instance.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket address (e.g., `127.0.0.1:8000`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "keygate".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

/// Holds the authenticated client for one namespace/database pair.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Connect and authenticate without touching the schema. Useful
    /// when migrations are run out of band.
    pub async fn connect(config: &DbConfig) -> Result<Self, StoreError> {
        let db = Surreal::new::<Ws>(config.url.as_str()).await?;

        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "connected to SurrealDB"
        );

        Ok(Self { db })
    }

    /// Connect and apply any pending schema migrations.
    pub async fn bootstrap(config: &DbConfig) -> Result<Self, StoreError> {
        let manager = Self::connect(config).await?;
        run_migrations(&manager.db).await?;
        Ok(manager)
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
