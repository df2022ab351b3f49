//! SQLite persistence built on SQLx.

use std::str::FromStr;

use log::debug;
use log::info;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;

use crate::repository::table::SubscriptionTable;
use crate::repository::table::TableBase;
use crate::repository::table::UserTable;

pub mod error;
pub mod table;
pub mod tracking_store;

/// Main database struct containing all table handlers.
pub struct Repository {
    pool: SqlitePool,
    pub user: UserTable,
    pub subscription: SubscriptionTable,
}

impl Repository {
    /// Opens (creating if needed) the database file and initializes table handlers.
    pub async fn new(db_url: &str, db_path: &str) -> anyhow::Result<Self> {
        let path = std::path::Path::new(db_path);
        if !path.exists() {
            debug!("Database path {db_path} does not exist. Creating...");
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, "")?;
            info!("Created {db_path}");
        }

        debug!("Connecting to db...");
        let opts = SqliteConnectOptions::from_str(db_url)?.foreign_keys(true);
        let pool = SqlitePool::connect_with(opts).await?;
        info!("Connected to db.");

        let user = UserTable::new(pool.clone());
        let subscription = SubscriptionTable::new(pool.clone());

        Ok(Self {
            pool,
            user,
            subscription,
        })
    }

    /// Creates all tables that don't exist yet. Users first, subscriptions reference them.
    pub async fn create_tables(&self) -> anyhow::Result<()> {
        self.user.create_table().await?;
        self.subscription.create_table().await?;
        Ok(())
    }

    /// Drops all tables. Use with caution!
    pub async fn drop_all_tables(&self) -> anyhow::Result<()> {
        self.subscription.drop_table().await?;
        self.user.drop_table().await?;
        Ok(())
    }

    /// Deletes all data from all tables. Use with caution!
    pub async fn delete_all_tables(&self) -> anyhow::Result<()> {
        self.subscription.delete_all().await?;
        self.user.delete_all().await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
