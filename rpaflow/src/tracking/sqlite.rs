//! SQLite-backed [`StatusStore`].

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::store::{ConnectionInfo, StatusStore};
use crate::core::{
    Execution, ExecutionId, ExecutionStatus, LogRecord, Transaction, TransactionId,
    TransactionStatus,
};
use crate::errors::StoreError;
use crate::utils::{format_iso8601, parse_iso8601, Timestamp};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS EXECUTIONS (
    IDEXECUTION INTEGER PRIMARY KEY AUTOINCREMENT,
    IDROBOT     TEXT NOT NULL,
    STATUS      TEXT NOT NULL,
    START_TIME  TEXT NOT NULL,
    END_TIME    TEXT,
    CREATED_AT  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "TRANSACTION" (
    IDTRANSACTION    INTEGER PRIMARY KEY AUTOINCREMENT,
    IDEXECUTION      INTEGER NOT NULL REFERENCES EXECUTIONS(IDEXECUTION),
    STATUS           TEXT NOT NULL,
    TRANSACTION_DATA TEXT,
    START_TIME       TEXT NOT NULL,
    END_TIME         TEXT,
    CREATED_AT       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS LOG (
    IDEXECUTION   INTEGER NOT NULL REFERENCES EXECUTIONS(IDEXECUTION),
    IDTRANSACTION INTEGER REFERENCES "TRANSACTION"(IDTRANSACTION),
    FUNCTION      TEXT NOT NULL,
    FILE          TEXT NOT NULL,
    LINENUMBER    INTEGER NOT NULL,
    MESSAGE       TEXT NOT NULL,
    PROCESSTYPE   TEXT NOT NULL,
    STATUS        TEXT NOT NULL,
    CREATED_AT    TEXT NOT NULL
);
"#;

/// A [`StatusStore`] on a SQLite database file.
///
/// The connection is opened on first use and kept until
/// [`SqliteStatusStore::disconnect`] or a reconnect.
#[derive(Debug)]
pub struct SqliteStatusStore {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteStatusStore {
    /// Creates a store for `path` without connecting.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
        }
    }

    /// The database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Closes the connection, if any.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                debug!(error = %e, "Error closing store connection");
            }
        }
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)
            .map_err(|e| StoreError::Connection(format!("{}: {e}", self.path.display())))?;
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(conn)
    }

    fn connection(&mut self) -> Result<&mut Connection, StoreError> {
        if self.conn.is_none() {
            debug!(path = %self.path.display(), "Opening store connection");
            self.conn = Some(self.open()?);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| StoreError::Connection("connection unavailable".to_string()))
    }

    /// Runs `f` in a transaction that commits on success and rolls back on error.
    fn write<T>(
        &mut self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self.connection()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

fn timestamp_column(row: &Row<'_>, idx: usize, table: &'static str) -> rusqlite::Result<Timestamp> {
    let text: String = row.get(idx)?;
    parse_iso8601(&text).map_err(|e| corrupt(idx, table, e.to_string()))
}

fn optional_timestamp_column(
    row: &Row<'_>,
    idx: usize,
    table: &'static str,
) -> rusqlite::Result<Option<Timestamp>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| parse_iso8601(&t).map_err(|e| corrupt(idx, table, e.to_string())))
        .transpose()
}

fn corrupt(idx: usize, table: &'static str, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(StoreError::CorruptRow { table, reason }),
    )
}

fn execution_from_row(row: &Row<'_>) -> rusqlite::Result<Execution> {
    let status: String = row.get(2)?;
    Ok(Execution {
        id: row.get(0)?,
        robot_id: row.get(1)?,
        status: status.parse().map_err(|e| corrupt(2, "EXECUTIONS", e))?,
        start_time: timestamp_column(row, 3, "EXECUTIONS")?,
        end_time: optional_timestamp_column(row, 4, "EXECUTIONS")?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let status: String = row.get(2)?;
    Ok(Transaction {
        id: row.get(0)?,
        execution_id: row.get(1)?,
        status: status.parse().map_err(|e| corrupt(2, "TRANSACTION", e))?,
        data: row.get(3)?,
        start_time: timestamp_column(row, 4, "TRANSACTION")?,
        end_time: optional_timestamp_column(row, 5, "TRANSACTION")?,
    })
}

impl StatusStore for SqliteStatusStore {
    fn self_test(&mut self) -> Result<ConnectionInfo, StoreError> {
        let result = (|| -> Result<ConnectionInfo, StoreError> {
            let conn = self.connection()?;
            let version: String = conn.query_row("SELECT sqlite_version()", [], |r| r.get(0))?;
            let database: String = conn.query_row(
                "SELECT file FROM pragma_database_list WHERE name = 'main'",
                [],
                |r| r.get(0),
            )?;
            Ok(ConnectionInfo { database, version })
        })();
        self.disconnect();

        if let Ok(info) = &result {
            info!(database = %info.database, version = %info.version, "Store connection test passed");
        }
        result
    }

    fn reconnect(&mut self) -> Result<(), StoreError> {
        self.disconnect();
        self.connection().map(|_| ())
    }

    fn insert_execution(
        &mut self,
        robot_id: &str,
        status: ExecutionStatus,
        at: Timestamp,
    ) -> Result<ExecutionId, StoreError> {
        let at = format_iso8601(&at);
        self.write(|tx| {
            tx.query_row(
                "INSERT INTO EXECUTIONS (IDROBOT, STATUS, START_TIME, CREATED_AT)
                 VALUES (?1, ?2, ?3, ?3)
                 RETURNING IDEXECUTION",
                params![robot_id, status.as_str(), at],
                |r| r.get(0),
            )
        })
    }

    fn update_execution(
        &mut self,
        id: ExecutionId,
        status: ExecutionStatus,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let at = format_iso8601(&at);
        self.write(|tx| {
            tx.execute(
                "UPDATE EXECUTIONS SET STATUS = ?1, END_TIME = ?2 WHERE IDEXECUTION = ?3",
                params![status.as_str(), at, id],
            )
        })
        .map(|_| ())
    }

    fn insert_transaction(
        &mut self,
        execution_id: ExecutionId,
        status: TransactionStatus,
        data: Option<String>,
        at: Timestamp,
    ) -> Result<TransactionId, StoreError> {
        let at = format_iso8601(&at);
        self.write(|tx| {
            tx.query_row(
                r#"INSERT INTO "TRANSACTION" (IDEXECUTION, STATUS, TRANSACTION_DATA, START_TIME, CREATED_AT)
                   VALUES (?1, ?2, ?3, ?4, ?4)
                   RETURNING IDTRANSACTION"#,
                params![execution_id, status.as_str(), data, at],
                |r| r.get(0),
            )
        })
    }

    fn update_transaction(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
        data: Option<String>,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let at = format_iso8601(&at);
        self.write(|tx| match data {
            Some(data) => tx.execute(
                r#"UPDATE "TRANSACTION" SET STATUS = ?1, TRANSACTION_DATA = ?2, END_TIME = ?3
                   WHERE IDTRANSACTION = ?4"#,
                params![status.as_str(), data, at, id],
            ),
            None => tx.execute(
                r#"UPDATE "TRANSACTION" SET STATUS = ?1, END_TIME = ?2 WHERE IDTRANSACTION = ?3"#,
                params![status.as_str(), at, id],
            ),
        })
        .map(|_| ())
    }

    fn insert_log(&mut self, record: &LogRecord) -> Result<(), StoreError> {
        let at = format_iso8601(&record.created_at);
        self.write(|tx| {
            tx.execute(
                "INSERT INTO LOG (IDEXECUTION, IDTRANSACTION, FUNCTION, FILE, LINENUMBER,
                                  MESSAGE, PROCESSTYPE, STATUS, CREATED_AT)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.execution_id,
                    record.transaction_id,
                    record.function,
                    record.file,
                    record.line,
                    record.message,
                    record.process_type.as_str(),
                    record.status.as_str(),
                    at,
                ],
            )
        })
        .map(|_| ())
    }

    fn execution(&mut self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT IDEXECUTION, IDROBOT, STATUS, START_TIME, END_TIME
             FROM EXECUTIONS WHERE IDEXECUTION = ?1",
            params![id],
            execution_from_row,
        )
        .optional()
        .map_err(StoreError::from)
    }

    fn transaction(&mut self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let conn = self.connection()?;
        conn.query_row(
            r#"SELECT IDTRANSACTION, IDEXECUTION, STATUS, TRANSACTION_DATA, START_TIME, END_TIME
               FROM "TRANSACTION" WHERE IDTRANSACTION = ?1"#,
            params![id],
            transaction_from_row,
        )
        .optional()
        .map_err(StoreError::from)
    }
}

impl Drop for SqliteStatusStore {
    fn drop(&mut self) {
        self.disconnect();
    }
}
