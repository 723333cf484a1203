pub mod group;
pub mod membership;
pub mod product;
pub mod schema;

use std::sync::Arc;

use blob::BlobStore;
use producto_core::ServiceError;
use sql::{Row, SQLError, SQLStore};

use crate::model::{Group, Product};

/// Inventory service — owns the products, product_groups, and memberships
/// tables and every rule that keeps them consistent.
pub struct InventoryService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) blob: Arc<dyn BlobStore>,
}

impl InventoryService {
    pub fn new(
        sql: Arc<dyn SQLStore>,
        blob: Arc<dyn BlobStore>,
    ) -> Result<Self, ServiceError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Self { sql, blob })
    }
}

// ── Shared row/error plumbing ──

pub(crate) fn map_sql(e: SQLError) -> ServiceError {
    match e {
        SQLError::Constraint(msg) => ServiceError::Conflict(msg),
        SQLError::Connection(msg) => ServiceError::Storage(msg),
        other => ServiceError::Storage(other.to_string()),
    }
}

fn missing(col: &str) -> ServiceError {
    ServiceError::Internal(format!("missing column '{}'", col))
}

pub(crate) fn product_from_row(row: &Row) -> Result<Product, ServiceError> {
    Ok(Product {
        id: row.get_str("id").ok_or_else(|| missing("id"))?.to_string(),
        name: row.get_str("name").ok_or_else(|| missing("name"))?.to_string(),
        price: row.get_f64("price").ok_or_else(|| missing("price"))?,
        barcode: row
            .get_str("barcode")
            .ok_or_else(|| missing("barcode"))?
            .to_string(),
        image_ref: row.get_str("image_ref").map(str::to_string),
        create_at: row.get_str("create_at").map(str::to_string),
        update_at: row.get_str("update_at").map(str::to_string),
    })
}

pub(crate) fn group_from_row(row: &Row) -> Result<Group, ServiceError> {
    let id = row.get_str("id").ok_or_else(|| missing("id"))?.to_string();
    let count = row.get_i64("count").ok_or_else(|| missing("count"))?;
    // The ledger floors decrements at zero; a negative value means the
    // column was written by something else.
    if count < 0 {
        return Err(ServiceError::Invariant(format!(
            "group {} has negative count {}",
            id, count
        )));
    }
    Ok(Group {
        id,
        name: row.get_str("name").ok_or_else(|| missing("name"))?.to_string(),
        count,
        create_at: row.get_str("create_at").map(str::to_string),
        update_at: row.get_str("update_at").map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sql::Value;

    fn group_row(count: i64) -> Row {
        Row {
            columns: vec![
                ("id".into(), Value::Text("g1".into())),
                ("name".into(), Value::Text("Kitchen".into())),
                ("count".into(), Value::Integer(count)),
                ("create_at".into(), Value::Null),
                ("update_at".into(), Value::Null),
            ],
        }
    }

    #[test]
    fn group_row_maps_columns() {
        let group = group_from_row(&group_row(2)).unwrap();
        assert_eq!(group.id, "g1");
        assert_eq!(group.count, 2);
        assert_eq!(group.create_at, None);
    }

    #[test]
    fn negative_count_is_an_invariant_violation() {
        let err = group_from_row(&group_row(-1)).unwrap_err();
        assert!(matches!(err, ServiceError::Invariant(_)));
    }

    #[test]
    fn product_row_missing_column_is_internal() {
        let row = Row {
            columns: vec![("id".into(), Value::Text("p1".into()))],
        };
        let err = product_from_row(&row).unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
    }
}
