use sqlx::migrate::{MigrateError, Migrator};
use sqlx::{Pool, Sqlite};
use thiserror::Error;
use tracing::info;

use crate::storage::database::Database;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("schema step failed: {0}")]
    Step(#[from] sqlx::Error),

    #[error("migration runner failed: {0}")]
    Runner(#[from] MigrateError),
}

/// Schema-migration handle bound to the persistence pool.
#[derive(Clone)]
pub struct Migrations {
    pool: Pool<Sqlite>,
}

impl Migrations {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Applies every pending revision.
    pub async fn upgrade(&self) -> Result<(), MigrationError> {
        info!("Running database migrations");
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Reverts applied revisions newer than `target`. `0` reverts everything.
    pub async fn downgrade_to(&self, target: i64) -> Result<(), MigrationError> {
        info!("Reverting database migrations down to {}", target);
        MIGRATOR.undo(&self.pool, target).await?;
        Ok(())
    }

    pub async fn applied(&self) -> Result<Vec<i64>, MigrationError> {
        let versions = sqlx::query_scalar::<_, i64>(
            "SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(versions)
    }
}

/// The followers revision as a standalone, unguarded step. Creating an
/// existing table or dropping a missing one is an error for the caller.
pub mod followers {
    use sqlx::SqliteConnection;

    use super::MigrationError;

    pub const VERSION: i64 = 20220313214709;

    const UP: &str = include_str!("../../migrations/20220313214709_followers.up.sql");
    const DOWN: &str = include_str!("../../migrations/20220313214709_followers.down.sql");

    pub async fn upgrade(conn: &mut SqliteConnection) -> Result<(), MigrationError> {
        sqlx::query(UP).execute(&mut *conn).await?;
        Ok(())
    }

    pub async fn downgrade(conn: &mut SqliteConnection) -> Result<(), MigrationError> {
        sqlx::query(DOWN).execute(&mut *conn).await?;
        Ok(())
    }
}
