use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::SQLError;
use crate::traits::{Row, SQLExecutor, SQLStore, SQLTransaction, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL mode for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        Self::configure(conn)
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Self::configure(conn)
    }

    /// Referential integrity is load-bearing here: association rows must
    /// never outlive the records they reference.
    fn configure(conn: Connection) -> Result<Self, SQLError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SQLError> {
        self.conn
            .lock()
            .map_err(|e| SQLError::Connection(e.to_string()))
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

fn is_constraint(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn query_error(e: rusqlite::Error) -> SQLError {
    if is_constraint(&e) {
        SQLError::Constraint(e.to_string())
    } else {
        SQLError::Query(e.to_string())
    }
}

fn exec_error(e: rusqlite::Error) -> SQLError {
    if is_constraint(&e) {
        SQLError::Constraint(e.to_string())
    } else {
        SQLError::Execution(e.to_string())
    }
}

fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn.prepare(sql).map_err(query_error)?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let mut columns = Vec::new();
            for (i, name) in column_names.iter().enumerate() {
                let val = row_value_at(row, i);
                columns.push((name.clone(), val));
            }
            Ok(Row { columns })
        })
        .map_err(query_error)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(query_error)?);
    }
    Ok(result)
}

fn run_exec(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let affected = conn
        .execute(sql, param_refs.as_slice())
        .map_err(exec_error)?;

    Ok(affected as u64)
}

impl SQLExecutor for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self.lock()?;
        run_query(&conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self.lock()?;
        run_exec(&conn, sql, params)
    }
}

impl SQLStore for SqliteStore {
    fn begin(&self) -> Result<Box<dyn SQLTransaction + '_>, SQLError> {
        let conn = self.lock()?;
        // IMMEDIATE takes the write lock up front, so the transaction cannot
        // later fail upgrading from a read lock.
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(exec_error)?;
        Ok(Box::new(SqliteTransaction { conn, open: true }))
    }
}

/// An open transaction holding the connection lock until commit or drop.
struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    open: bool,
}

impl SQLExecutor for SqliteTransaction<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        run_query(&self.conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        run_exec(&self.conn, sql, params)
    }
}

impl SQLTransaction for SqliteTransaction<'_> {
    fn commit(mut self: Box<Self>) -> Result<(), SQLError> {
        self.open = false;
        self.conn.execute_batch("COMMIT").map_err(|e| {
            // The connection must not stay inside a failed transaction.
            let _ = self.conn.execute_batch("ROLLBACK");
            exec_error(e)
        })
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::error!("transaction rollback failed: {}", e);
            }
        }
    }
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> Value {
    // Try integer first, then real, then text, then blob, then null.
    if let Ok(i) = row.get::<_, i64>(idx) {
        return Value::Integer(i);
    }
    if let Ok(f) = row.get::<_, f64>(idx) {
        return Value::Real(f);
    }
    if let Ok(s) = row.get::<_, String>(idx) {
        return Value::Text(s);
    }
    if let Ok(b) = row.get::<_, Vec<u8>>(idx) {
        return Value::Blob(b);
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec(
                "CREATE TABLE items (id TEXT PRIMARY KEY, label TEXT UNIQUE, qty INTEGER)",
                &[],
            )
            .unwrap();
        store
    }

    #[test]
    fn exec_and_query_roundtrip() {
        let store = store();
        let affected = store
            .exec(
                "INSERT INTO items (id, label, qty) VALUES (?1, ?2, ?3)",
                &[
                    Value::Text("a".into()),
                    Value::Text("first".into()),
                    Value::Integer(3),
                ],
            )
            .unwrap();
        assert_eq!(affected, 1);

        let rows = store
            .query("SELECT * FROM items WHERE id = ?1", &[Value::Text("a".into())])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("label"), Some("first"));
        assert_eq!(rows[0].get_i64("qty"), Some(3));
    }

    #[test]
    fn unique_violation_maps_to_constraint() {
        let store = store();
        store
            .exec(
                "INSERT INTO items (id, label) VALUES ('a', 'dup')",
                &[],
            )
            .unwrap();
        let err = store
            .exec(
                "INSERT INTO items (id, label) VALUES ('b', 'dup')",
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, SQLError::Constraint(_)));
    }

    #[test]
    fn transaction_commit_persists() {
        let store = store();
        let tx = store.begin().unwrap();
        tx.exec("INSERT INTO items (id, label) VALUES ('a', 'x')", &[])
            .unwrap();
        tx.commit().unwrap();

        let rows = store.query("SELECT * FROM items", &[]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn transaction_drop_rolls_back() {
        let store = store();
        {
            let tx = store.begin().unwrap();
            tx.exec("INSERT INTO items (id, label) VALUES ('a', 'x')", &[])
                .unwrap();
            // dropped without commit
        }
        let rows = store.query("SELECT * FROM items", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn foreign_keys_enforced() {
        let store = store();
        store
            .exec(
                "CREATE TABLE links (item_id TEXT NOT NULL REFERENCES items(id))",
                &[],
            )
            .unwrap();
        let err = store
            .exec("INSERT INTO links (item_id) VALUES ('missing')", &[])
            .unwrap_err();
        assert!(matches!(err, SQLError::Constraint(_)));
    }
}
