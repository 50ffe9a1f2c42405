//! Database session storage.
//!
//! Rows live in the `hybrid_session_data` table, keyed by the hex SHA-256 of
//! the session id. Payloads go through [`codec`](crate::codec) so arbitrary
//! bytes survive a text column. The payload is obfuscated, not encrypted.
//!
//! Supported engines are MySQL and SQLite. Anything else is rejected when the
//! store is built, since it means the deployment is wired to the wrong
//! database.
//!
//! Readiness (the table exists and answers) is re-checked on every call: the
//! schema may appear or disappear during setup and migrations. A store that
//! is not ready misses on read, declines writes and skips collection.
//!
//! Concurrent writers for one session id race; the last write to commit
//! wins.

use crate::clock::Clock;
use crate::codec;
use crate::config::HybridSessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::traits::SessionHandler;
use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait,
    QueryFilter, Schema, Set, Statement,
};
use sea_query::{Index, OnConflict};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

/// Session table name.
pub const TABLE_NAME: &str = "hybrid_session_data";

const EXPIRY_INDEX: &str = "idx_hybrid_session_data_expiry";

/// Session table entity.
pub mod entity {
    use sea_orm::entity::prelude::*;

    /// One stored session.
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "hybrid_session_data")]
    pub struct Model {
        /// Hex SHA-256 of the session id
        #[sea_orm(primary_key, auto_increment = false, column_type = "String(StringLen::N(64))")]
        pub session_id: String,
        /// Absolute expiry, Unix seconds
        pub expiry: i64,
        /// Codec-encoded payload
        #[sea_orm(column_type = "Text")]
        pub data: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

use entity::{ActiveModel, Column, Entity};

/// Hash a session id into its row key.
pub fn hash_session_id(session_id: &str) -> String {
    hex::encode(Sha256::digest(session_id.as_bytes()))
}

/// Database-backed session handler.
///
/// # Examples
///
/// ```no_run
/// use armature_hybrid_session::*;
///
/// # async fn example() -> SessionResult<()> {
/// let conn = sea_orm::Database::connect("mysql://app@localhost/app").await?;
/// let config = HybridSessionConfig::new("site-secret");
/// let mut store = DatabaseStore::new(conn, &config, SystemClock::shared())?;
/// store.install_schema().await?;
///
/// store.write("abc123", b"payload").await?;
/// # Ok(())
/// # }
/// ```
pub struct DatabaseStore {
    conn: DatabaseConnection,
    clock: Arc<dyn Clock>,
    lifetime: u64,
}

impl DatabaseStore {
    /// Create a database store.
    ///
    /// Fails with [`SessionError::UnsupportedEngine`] if the connection is not
    /// MySQL or SQLite.
    pub fn new(
        conn: DatabaseConnection,
        config: &HybridSessionConfig,
        clock: Arc<dyn Clock>,
    ) -> SessionResult<Self> {
        check_engine(conn.get_database_backend())?;

        Ok(Self {
            conn,
            clock,
            lifetime: config.lifetime(),
        })
    }

    /// Override the row lifetime in seconds.
    pub fn with_lifetime(mut self, seconds: u64) -> Self {
        self.lifetime = seconds;
        self
    }

    /// Underlying connection.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Whether the session table exists.
    pub async fn table_exists(&self) -> SessionResult<bool> {
        let backend = self.conn.get_database_backend();
        let sql = match backend {
            DatabaseBackend::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?"
            }
            _ => {
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
            }
        };

        let row = self
            .conn
            .query_one(Statement::from_sql_and_values(backend, sql, [TABLE_NAME.into()]))
            .await?;

        Ok(row.is_some())
    }

    /// Whether the store can serve requests right now.
    pub async fn is_ready(&self) -> bool {
        match self.table_exists().await {
            Ok(exists) => exists,
            Err(e) => {
                debug!(backend = "database", error = %e, "Readiness probe failed");
                false
            }
        }
    }

    /// Create the session table and its expiry index if the table is absent.
    ///
    /// Returns `true` when the schema was created.
    pub async fn install_schema(&self) -> SessionResult<bool> {
        if self.table_exists().await? {
            return Ok(false);
        }

        let backend = self.conn.get_database_backend();
        let schema = Schema::new(backend);

        let table = schema.create_table_from_entity(Entity);
        self.conn.execute(backend.build(&table)).await?;

        let index = Index::create()
            .name(EXPIRY_INDEX)
            .table(Entity)
            .col(Column::Expiry)
            .to_owned();
        self.conn.execute(backend.build(&index)).await?;

        info!(table = TABLE_NAME, "Created session table");
        Ok(true)
    }
}

fn check_engine(backend: DatabaseBackend) -> SessionResult<()> {
    match backend {
        DatabaseBackend::MySql | DatabaseBackend::Sqlite => Ok(()),
        other => Err(SessionError::UnsupportedEngine(format!(
            "{:?}; the database store only works with MySQL or SQLite",
            other
        ))),
    }
}

#[async_trait]
impl SessionHandler for DatabaseStore {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn open(&mut self, _save_path: &str, _name: &str) -> SessionResult<bool> {
        Ok(true)
    }

    async fn close(&mut self) -> SessionResult<bool> {
        Ok(true)
    }

    async fn read(&mut self, session_id: &str) -> SessionResult<Option<Vec<u8>>> {
        if !self.is_ready().await {
            return Ok(None);
        }

        let row = Entity::find_by_id(hash_session_id(session_id))
            .filter(Column::Expiry.gte(self.clock.now()))
            .one(&self.conn)
            .await?;

        Ok(row.map(|row| codec::decode_or_raw(&row.data)))
    }

    async fn write(&mut self, session_id: &str, data: &[u8]) -> SessionResult<bool> {
        if !self.is_ready().await {
            debug!(
                backend = "database",
                error = %SessionError::BackendNotReady(TABLE_NAME.into()),
                "Declining write"
            );
            return Ok(false);
        }

        let row = ActiveModel {
            session_id: Set(hash_session_id(session_id)),
            expiry: Set(self.clock.expires_in(self.lifetime)),
            data: Set(codec::encode(data)),
        };

        Entity::insert(row)
            .on_conflict(
                OnConflict::column(Column::SessionId)
                    .update_columns([Column::Expiry, Column::Data])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(true)
    }

    async fn destroy(&mut self, session_id: &str) -> SessionResult<bool> {
        if !self.is_ready().await {
            return Ok(false);
        }

        Entity::delete_by_id(hash_session_id(session_id))
            .exec(&self.conn)
            .await?;

        Ok(true)
    }

    async fn gc(&mut self, _max_lifetime: u64) -> SessionResult<Option<u64>> {
        if !self.is_ready().await {
            return Ok(None);
        }

        let result = Entity::delete_many()
            .filter(Column::Expiry.lt(self.clock.now()))
            .exec(&self.conn)
            .await?;

        debug!(backend = "database", removed = result.rows_affected, "Collected expired sessions");
        Ok(Some(result.rows_affected))
    }
}
