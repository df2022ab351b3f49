//! Database table operations and implementations.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::entity::SubscriptionModel;
use crate::entity::UserModel;
use crate::repository::error::DatabaseError;

/// Base table struct providing database pool access.
#[derive(Clone)]
pub struct BaseTable {
    pub pool: SqlitePool,
}

impl BaseTable {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Schema-level operations every table supports.
#[async_trait::async_trait]
pub trait TableBase {
    async fn create_table(&self) -> Result<(), DatabaseError>;
    async fn drop_table(&self) -> Result<(), DatabaseError>;
    async fn delete_all(&self) -> Result<(), DatabaseError>;
}

/// Row lookup by primary key.
#[async_trait::async_trait]
pub trait Table<T, ID>: TableBase {
    async fn select(&self, id: &ID) -> Result<Option<T>, DatabaseError>;
}

macro_rules! impl_table {
    (
        $struct_name:ident,
        $model:ty,
        $table:expr,
        $pk:ident,
        $id_type:ty,
        $create_sql:expr
    ) => {
        #[derive(Clone)]
        pub struct $struct_name {
            base: BaseTable,
        }

        impl $struct_name {
            pub fn new(pool: SqlitePool) -> Self {
                Self {
                    base: BaseTable::new(pool),
                }
            }
        }

        #[async_trait::async_trait]
        impl TableBase for $struct_name {
            async fn create_table(&self) -> Result<(), DatabaseError> {
                sqlx::query($create_sql)
                    .execute(&self.base.pool)
                    .await?;
                Ok(())
            }

            async fn drop_table(&self) -> Result<(), DatabaseError> {
                sqlx::query(concat!("DROP TABLE IF EXISTS ", $table))
                    .execute(&self.base.pool)
                    .await?;
                Ok(())
            }

            async fn delete_all(&self) -> Result<(), DatabaseError> {
                sqlx::query(concat!("DELETE FROM ", $table))
                    .execute(&self.base.pool)
                    .await?;
                Ok(())
            }
        }

        #[async_trait::async_trait]
        impl Table<$model, $id_type> for $struct_name {
            async fn select(&self, id: &$id_type) -> Result<Option<$model>, DatabaseError> {
                Ok(sqlx::query_as::<_, $model>(concat!("SELECT * FROM ", $table, " WHERE ", stringify!($pk), " = ?"))
                    .bind(*id)
                    .fetch_optional(&self.base.pool)
                    .await?)
            }
        }
    };
}

// ============================================================================
// UserTable
// ============================================================================

impl_table!(
    UserTable,
    UserModel,
    "users",
    id,
    i32,
    r#"CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT NOT NULL,
        username TEXT DEFAULT NULL,
        created_at TIMESTAMP NOT NULL,
        UNIQUE(external_id)
    )"#
);

impl UserTable {
    pub async fn select_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<UserModel>, DatabaseError> {
        Ok(
            sqlx::query_as::<_, UserModel>("SELECT * FROM users WHERE external_id = ? LIMIT 1")
                .bind(external_id)
                .fetch_optional(&self.base.pool)
                .await?,
        )
    }

    /// Inserts the user unless the external id is already known. An existing
    /// user keeps its stored username.
    pub async fn insert_or_get(
        &self,
        external_id: &str,
        username: Option<&str>,
    ) -> Result<UserModel, DatabaseError> {
        sqlx::query(
            "INSERT INTO users (external_id, username, created_at) VALUES (?, ?, ?)
             ON CONFLICT(external_id) DO NOTHING",
        )
        .bind(external_id)
        .bind(username)
        .bind(Utc::now())
        .execute(&self.base.pool)
        .await?;

        self.select_by_external_id(external_id)
            .await?
            .ok_or_else(|| DatabaseError::InternalError {
                message: format!("User with external id {external_id} vanished after insert"),
            })
    }
}

// ============================================================================
// SubscriptionTable
// ============================================================================

impl_table!(
    SubscriptionTable,
    SubscriptionModel,
    "subscriptions",
    id,
    i32,
    r#"CREATE TABLE IF NOT EXISTS subscriptions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        code TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        UNIQUE(user_id, code),
        FOREIGN KEY (user_id) REFERENCES users(id)
            ON DELETE CASCADE
            ON UPDATE CASCADE
    )"#
);

impl SubscriptionTable {
    /// Every active subscription of every user.
    pub async fn select_all_active(&self) -> Result<Vec<SubscriptionModel>, DatabaseError> {
        Ok(sqlx::query_as::<_, SubscriptionModel>(
            "SELECT * FROM subscriptions WHERE active = 1 ORDER BY id",
        )
        .fetch_all(&self.base.pool)
        .await?)
    }

    /// Active subscriptions of one user, ordered by code.
    pub async fn select_active_by_user_id(
        &self,
        user_id: i32,
    ) -> Result<Vec<SubscriptionModel>, DatabaseError> {
        Ok(sqlx::query_as::<_, SubscriptionModel>(
            "SELECT * FROM subscriptions WHERE user_id = ? AND active = 1 ORDER BY code, id",
        )
        .bind(user_id)
        .fetch_all(&self.base.pool)
        .await?)
    }

    pub async fn select_by_user_and_code(
        &self,
        user_id: i32,
        code: &str,
    ) -> Result<Option<SubscriptionModel>, DatabaseError> {
        Ok(sqlx::query_as::<_, SubscriptionModel>(
            "SELECT * FROM subscriptions WHERE user_id = ? AND code = ? LIMIT 1",
        )
        .bind(user_id)
        .bind(code)
        .fetch_optional(&self.base.pool)
        .await?)
    }

    /// Inserts a new active row or reactivates an inactive one.
    ///
    /// Returns `(row, true)` when a row became active, `(row, false)` when it
    /// was already active. Reactivation and the no-op case keep the stored title.
    pub async fn activate(
        &self,
        user_id: i32,
        code: &str,
        title: &str,
    ) -> Result<(SubscriptionModel, bool), DatabaseError> {
        // The upsert only returns a row when it inserted or flipped `active`
        let changed = sqlx::query_as::<_, SubscriptionModel>(
            r#"
            INSERT INTO subscriptions (user_id, code, title, active, created_at)
            VALUES (?, ?, ?, 1, ?)
            ON CONFLICT(user_id, code) DO UPDATE SET active = 1
                WHERE subscriptions.active = 0
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(code)
        .bind(title)
        .bind(Utc::now())
        .fetch_optional(&self.base.pool)
        .await?;

        if let Some(row) = changed {
            return Ok((row, true));
        }

        let existing = self
            .select_by_user_and_code(user_id, code)
            .await?
            .ok_or_else(|| DatabaseError::InternalError {
                message: format!("Subscription {code} for user {user_id} vanished after upsert"),
            })?;
        Ok((existing, false))
    }

    /// Clears `active` on the user's row for `code`. Returns whether a row changed.
    pub async fn deactivate(&self, user_id: i32, code: &str) -> Result<bool, DatabaseError> {
        let res = sqlx::query(
            "UPDATE subscriptions SET active = 0 WHERE user_id = ? AND code = ? AND active = 1",
        )
        .bind(user_id)
        .bind(code)
        .execute(&self.base.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn update_title(
        &self,
        user_id: i32,
        code: &str,
        title: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE subscriptions SET title = ? WHERE user_id = ? AND code = ?")
            .bind(title)
            .bind(user_id)
            .bind(code)
            .execute(&self.base.pool)
            .await?;
        Ok(())
    }
}
