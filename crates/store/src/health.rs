//! Postgres health checks and schema init.

use crate::schema::all_statements;
use crate::PgStore;
use tracing::{debug, error};

/// Check Postgres connection health.
pub async fn check_connection(store: &PgStore) -> bool {
    match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(store.pool())
        .await
    {
        Ok(_) => {
            debug!("Postgres connection healthy");
            true
        }
        Err(e) => {
            error!("Postgres health check failed: {}", e);
            false
        }
    }
}

/// Initialize database schema.
pub async fn init_schema(store: &PgStore) -> Result<(), String> {
    for ddl in all_statements() {
        sqlx::query(ddl)
            .execute(store.pool())
            .await
            .map_err(|e| format!("Failed to execute DDL: {}", e))?;
    }

    debug!("Postgres schema initialized");
    Ok(())
}
