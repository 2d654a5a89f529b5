pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{LibsqlStore, Store};

use anyhow::Result;
use libsql::Connection;

/// Initialize the database schema, applying any pending migrations
pub async fn initialize_database(conn: &Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

#[cfg(test)]
pub mod test_support {
    use anyhow::Result;
    use tempfile::TempDir;

    use super::{LibsqlStore, initialize_database};
    use crate::pool::{LibsqlManager, LibsqlPool};

    /// Create a pool over a fresh temporary database with the schema applied
    pub async fn create_test_pool() -> Result<(LibsqlPool, TempDir)> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("test.db");

        let db = libsql::Builder::new_local(db_path.to_string_lossy().as_ref()).build().await?;
        let pool: LibsqlPool = deadpool::managed::Pool::builder(LibsqlManager::new(db)).build()?;

        let conn = pool.get().await?;
        initialize_database(&conn).await?;
        drop(conn);

        Ok((pool, dir))
    }

    pub async fn create_test_store() -> Result<(LibsqlStore, TempDir)> {
        let (pool, dir) = create_test_pool().await?;
        Ok((LibsqlStore::new_from_pool(pool), dir))
    }
}
