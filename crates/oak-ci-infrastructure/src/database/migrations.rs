//! Embedded schema migrations, applied in order and tracked in a
//! `schema_meta` row rather than `PRAGMA user_version` (keeps the version
//! readable from plain SQL, which the backup export path also wants).

use sqlx::SqlitePool;

use oak_ci_domain::error::{Error, Result};

struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("sql/0001_initial.sql"),
    },
];

/// Apply every migration newer than the database's current version.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_meta (version INTEGER NOT NULL)",
    )
    .execute(pool)
    .await
    .map_err(store_err)?;

    let current: Option<i64> = sqlx::query_scalar("SELECT version FROM schema_meta LIMIT 1")
        .fetch_optional(pool)
        .await
        .map_err(store_err)?;
    let mut current = current.unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        let mut tx = pool.begin().await.map_err(store_err)?;
        for statement in migration.sql.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::SchemaMigrationError {
                    message: format!("migration {} failed: {e}", migration.version),
                })?;
        }
        tx.commit().await.map_err(store_err)?;
        current = migration.version;
    }

    sqlx::query("DELETE FROM schema_meta").execute(pool).await.map_err(store_err)?;
    sqlx::query("INSERT INTO schema_meta (version) VALUES (?)")
        .bind(current)
        .execute(pool)
        .await
        .map_err(store_err)?;
    Ok(())
}

/// Read the stamped schema version without running migrations.
pub async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let version: Option<i64> = sqlx::query_scalar("SELECT version FROM schema_meta LIMIT 1")
        .fetch_optional(pool)
        .await
        .map_err(store_err)?;
    Ok(version.unwrap_or(0))
}

fn store_err(e: sqlx::Error) -> Error {
    Error::Store { message: e.to_string() }
}
