use producto_core::ServiceError;
use sql::{SQLExecutor, SQLStore};

/// SQL DDL statements to initialize the inventory schema.
///
/// `product_groups.count` is denormalized: it mirrors the number of
/// membership rows referencing the group, and is only ever written in the
/// same transaction as the membership change it derives from.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        price REAL NOT NULL,
        barcode TEXT NOT NULL UNIQUE,
        image_ref TEXT,
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS product_groups (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        create_at TEXT,
        update_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS memberships (
        product_id TEXT NOT NULL REFERENCES products(id),
        product_group_id TEXT NOT NULL REFERENCES product_groups(id),
        PRIMARY KEY (product_id, product_group_id)
    )",
    // PK covers product_id lookups; group-side lookups need their own index.
    "CREATE INDEX IF NOT EXISTS idx_memberships_group ON memberships(product_group_id)",
];

pub fn init_schema(sql: &dyn SQLStore) -> Result<(), ServiceError> {
    for stmt in SCHEMA {
        sql.exec(stmt, &[])
            .map_err(|e| ServiceError::Storage(format!("schema init failed: {}", e)))?;
    }
    Ok(())
}
