//! Schema definitions and migration runner.
//!
//! Tables are SCHEMAFULL; UUIDs are stored as strings. The unique
//! index on `(app_id, email)` is what makes concurrent signups for the
//! same pair resolve to exactly one success.

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::StoreError;

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, Deserialize)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users (app scope)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD app_id ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD hashed_pass ON TABLE user TYPE string;
DEFINE FIELD lang ON TABLE user TYPE string;
DEFINE FIELD confirmation_key ON TABLE user TYPE option<string>;
DEFINE FIELD confirmed_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD reset_key ON TABLE user TYPE option<string>;
DEFINE FIELD reset_key_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE user TYPE datetime;
DEFINE INDEX idx_user_app_email ON TABLE user \
    COLUMNS app_id, email UNIQUE;

-- =======================================================================
-- Sessions
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD user_id ON TABLE session TYPE string;
DEFINE FIELD created_at ON TABLE session TYPE datetime;
DEFINE INDEX idx_session_user ON TABLE session COLUMNS user_id;
";

/// Apply any schema migrations newer than the recorded version.
/// Idempotent; safe to run on every startup.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), StoreError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| StoreError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                StoreError::Migration(format!(
                    "migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query("CREATE _migration SET version = $version, name = $name")
                .bind(("version", migration.version))
                .bind(("name", migration.name))
                .await?
                .check()
                .map_err(|e| {
                    StoreError::Migration(format!(
                        "failed to record migration v{}: {}",
                        migration.version, e,
                    ))
                })?;
        }
    }

    Ok(())
}
