//! # Scoped Transactions
//!
//! Every read and write in this crate goes through a [`StoreTx`] issued by
//! [`Database::transaction`](crate::Database::transaction). A transaction
//! names the tables it touches and whether it may write; the connection is
//! only handed out for tables inside that scope.
//!
//! ## Transaction Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  db.transaction(&[Table::Actions], TxMode::ReadWrite).await?            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN ───► tx.writer(Table::Actions)?  ← scope + mode checked          │
//! │       │         │                                                       │
//! │       │         ▼                                                       │
//! │       │     INSERT / UPDATE / DELETE                                    │
//! │       │                                                                 │
//! │       ├── tx.commit().await?   → all writes visible together            │
//! │       └── drop(tx)             → ROLLBACK, nothing visible              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite runs in WAL mode, so a read transaction keeps a consistent
//! snapshot while other connections commit.

use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteConnection, Transaction};

use crate::error::{DbError, DbResult};

/// The tables owned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Properties,
    Regions,
    Features,
    SearchResults,
    Actions,
}

impl Table {
    /// Every table, in the order stats are reported.
    pub const ALL: [Table; 5] = [
        Table::Properties,
        Table::Regions,
        Table::Features,
        Table::Actions,
        Table::SearchResults,
    ];

    /// SQL table name.
    pub const fn name(&self) -> &'static str {
        match self {
            Table::Properties => "properties",
            Table::Regions => "regions",
            Table::Features => "features",
            Table::SearchResults => "search_results",
            Table::Actions => "offline_actions",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a transaction may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

impl std::fmt::Display for TxMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxMode::ReadOnly => write!(f, "read-only"),
            TxMode::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// A transaction scoped to a set of tables and a mode.
pub struct StoreTx {
    inner: Transaction<'static, Sqlite>,
    scope: Vec<Table>,
    mode: TxMode,
}

impl std::fmt::Debug for StoreTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreTx")
            .field("scope", &self.scope)
            .field("mode", &self.mode)
            .finish()
    }
}

impl StoreTx {
    pub(crate) fn new(inner: Transaction<'static, Sqlite>, scope: &[Table], mode: TxMode) -> Self {
        StoreTx {
            inner,
            scope: scope.to_vec(),
            mode,
        }
    }

    pub fn mode(&self) -> TxMode {
        self.mode
    }

    pub fn scope(&self) -> &[Table] {
        &self.scope
    }

    /// Connection for reading `table`.
    pub fn reader(&mut self, table: Table) -> DbResult<&mut SqliteConnection> {
        if !self.scope.contains(&table) {
            return Err(DbError::ScopeViolation {
                table,
                mode: self.mode,
            });
        }
        Ok(&mut *self.inner)
    }

    /// Connection for writing `table`. Requires [`TxMode::ReadWrite`].
    pub fn writer(&mut self, table: Table) -> DbResult<&mut SqliteConnection> {
        if self.mode != TxMode::ReadWrite || !self.scope.contains(&table) {
            return Err(DbError::ScopeViolation {
                table,
                mode: self.mode,
            });
        }
        Ok(&mut *self.inner)
    }

    /// Commits every write made through this transaction as one unit.
    pub async fn commit(self) -> DbResult<()> {
        self.inner.commit().await?;
        Ok(())
    }

    /// Discards every write made through this transaction.
    pub async fn rollback(self) -> DbResult<()> {
        self.inner.rollback().await?;
        Ok(())
    }
}
