//! Membership ledger — the only writer of `product_groups.count`.
//!
//! Every mutation here touches the membership table and the derived group
//! count inside one transaction, so readers can never observe the two out
//! of step.

use std::collections::HashSet;

use producto_core::ServiceError;
use sql::{SQLExecutor, Value};
use tracing::warn;

use super::{group_from_row, map_sql, product_from_row, InventoryService};
use crate::model::{Group, Product};

fn ensure_product<E: SQLExecutor + ?Sized>(ex: &E, id: &str) -> Result<(), ServiceError> {
    let rows = ex
        .query(
            "SELECT id FROM products WHERE id = ?1",
            &[Value::Text(id.to_string())],
        )
        .map_err(map_sql)?;
    if rows.is_empty() {
        return Err(ServiceError::NotFound(format!("products/{}", id)));
    }
    Ok(())
}

fn ensure_group<E: SQLExecutor + ?Sized>(ex: &E, id: &str) -> Result<(), ServiceError> {
    let rows = ex
        .query(
            "SELECT id FROM product_groups WHERE id = ?1",
            &[Value::Text(id.to_string())],
        )
        .map_err(map_sql)?;
    if rows.is_empty() {
        return Err(ServiceError::NotFound(format!("product_groups/{}", id)));
    }
    Ok(())
}

/// Decrement a group's count for one removed membership row, flooring at
/// zero. A floor engagement means the count had already drifted below the
/// true cardinality — log it and heal.
fn decrement_count<E: SQLExecutor + ?Sized>(ex: &E, group_id: &str) -> Result<(), ServiceError> {
    let rows = ex
        .query(
            "SELECT count FROM product_groups WHERE id = ?1",
            &[Value::Text(group_id.to_string())],
        )
        .map_err(map_sql)?;
    if let Some(count) = rows.first().and_then(|r| r.get_i64("count")) {
        if count < 1 {
            warn!(group = %group_id, count, "group count drifted below membership cardinality, flooring at 0");
        }
    }
    ex.exec(
        "UPDATE product_groups SET count = MAX(count - 1, 0) WHERE id = ?1",
        &[Value::Text(group_id.to_string())],
    )
    .map_err(map_sql)?;
    Ok(())
}

fn dedup(ids: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

impl InventoryService {
    /// Idempotent insert of a (product, group) pair.
    ///
    /// Returns true when the pair was newly created. Re-adding an existing
    /// pair is a no-op and leaves the group's count untouched.
    pub fn add_membership(
        &self,
        product_id: &str,
        group_id: &str,
    ) -> Result<bool, ServiceError> {
        let tx = self.sql.begin().map_err(map_sql)?;
        ensure_product(&*tx, product_id)?;
        ensure_group(&*tx, group_id)?;

        let inserted = tx
            .exec(
                "INSERT OR IGNORE INTO memberships (product_id, product_group_id)
                 VALUES (?1, ?2)",
                &[
                    Value::Text(product_id.to_string()),
                    Value::Text(group_id.to_string()),
                ],
            )
            .map_err(map_sql)?;

        if inserted > 0 {
            tx.exec(
                "UPDATE product_groups SET count = count + 1 WHERE id = ?1",
                &[Value::Text(group_id.to_string())],
            )
            .map_err(map_sql)?;
        }

        tx.commit().map_err(map_sql)?;
        Ok(inserted > 0)
    }

    /// Idempotent removal of a (product, group) pair.
    ///
    /// Returns true when a row was actually removed; only then is the
    /// group's count decremented (floored at zero).
    pub fn remove_membership(
        &self,
        product_id: &str,
        group_id: &str,
    ) -> Result<bool, ServiceError> {
        let tx = self.sql.begin().map_err(map_sql)?;
        ensure_product(&*tx, product_id)?;
        ensure_group(&*tx, group_id)?;

        let removed = tx
            .exec(
                "DELETE FROM memberships WHERE product_id = ?1 AND product_group_id = ?2",
                &[
                    Value::Text(product_id.to_string()),
                    Value::Text(group_id.to_string()),
                ],
            )
            .map_err(map_sql)?;

        if removed > 0 {
            decrement_count(&*tx, group_id)?;
        }

        tx.commit().map_err(map_sql)?;
        Ok(removed > 0)
    }

    /// Replace a product's memberships with `group_ids`, atomically.
    ///
    /// Old pairs are removed (each affected group decremented) and the new
    /// set inserted (each incremented) in one transaction; no reader ever
    /// sees the product between sets.
    pub fn replace_memberships_for_product(
        &self,
        product_id: &str,
        group_ids: &[String],
    ) -> Result<(), ServiceError> {
        let new_set = dedup(group_ids);

        let tx = self.sql.begin().map_err(map_sql)?;
        ensure_product(&*tx, product_id)?;
        for gid in &new_set {
            ensure_group(&*tx, gid)?;
        }

        // Each current membership decrements its group exactly once.
        tx.exec(
            "UPDATE product_groups SET count = MAX(count - 1, 0)
             WHERE id IN (SELECT product_group_id FROM memberships WHERE product_id = ?1)",
            &[Value::Text(product_id.to_string())],
        )
        .map_err(map_sql)?;
        tx.exec(
            "DELETE FROM memberships WHERE product_id = ?1",
            &[Value::Text(product_id.to_string())],
        )
        .map_err(map_sql)?;

        for gid in &new_set {
            tx.exec(
                "INSERT INTO memberships (product_id, product_group_id) VALUES (?1, ?2)",
                &[
                    Value::Text(product_id.to_string()),
                    Value::Text(gid.to_string()),
                ],
            )
            .map_err(map_sql)?;
            tx.exec(
                "UPDATE product_groups SET count = count + 1 WHERE id = ?1",
                &[Value::Text(gid.to_string())],
            )
            .map_err(map_sql)?;
        }

        tx.commit().map_err(map_sql)?;
        Ok(())
    }

    /// Assign one group to many products in a single transaction.
    ///
    /// Pairs that already exist are silently skipped; the group's count
    /// grows by exactly the number of newly created rows. Any unknown
    /// product id fails the whole call with nothing applied.
    pub fn bulk_assign_group_to_products(
        &self,
        group_id: &str,
        product_ids: &[String],
    ) -> Result<u64, ServiceError> {
        let tx = self.sql.begin().map_err(map_sql)?;
        ensure_group(&*tx, group_id)?;

        let mut created: u64 = 0;
        for pid in dedup(product_ids) {
            ensure_product(&*tx, pid)?;
            created += tx
                .exec(
                    "INSERT OR IGNORE INTO memberships (product_id, product_group_id)
                     VALUES (?1, ?2)",
                    &[
                        Value::Text(pid.to_string()),
                        Value::Text(group_id.to_string()),
                    ],
                )
                .map_err(map_sql)?;
        }

        if created > 0 {
            tx.exec(
                "UPDATE product_groups SET count = count + ?2 WHERE id = ?1",
                &[
                    Value::Text(group_id.to_string()),
                    Value::Integer(created as i64),
                ],
            )
            .map_err(map_sql)?;
        }

        tx.commit().map_err(map_sql)?;
        Ok(created)
    }

    // ── Read surface ──

    /// All groups a product belongs to.
    pub fn groups_for_product(&self, product_id: &str) -> Result<Vec<Group>, ServiceError> {
        ensure_product(self.sql.as_ref(), product_id)?;
        let rows = self
            .sql
            .query(
                "SELECT g.* FROM product_groups g
                 JOIN memberships m ON g.id = m.product_group_id
                 WHERE m.product_id = ?1
                 ORDER BY g.create_at",
                &[Value::Text(product_id.to_string())],
            )
            .map_err(map_sql)?;
        rows.iter().map(group_from_row).collect()
    }

    /// All products currently in a group.
    pub fn products_in_group(&self, group_id: &str) -> Result<Vec<Product>, ServiceError> {
        ensure_group(self.sql.as_ref(), group_id)?;
        let rows = self
            .sql
            .query(
                "SELECT p.* FROM products p
                 JOIN memberships m ON p.id = m.product_id
                 WHERE m.product_group_id = ?1
                 ORDER BY p.create_at",
                &[Value::Text(group_id.to_string())],
            )
            .map_err(map_sql)?;
        rows.iter().map(product_from_row).collect()
    }
}
