use std::collections::HashSet;

use producto_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use sql::Value;
use tracing::{debug, info, warn};

use super::{map_sql, product_from_row, InventoryService};
use crate::barcode;
use crate::model::Product;

/// Bounded retries for the allocate-then-insert race on generated barcodes.
/// Two concurrent creates of the same name can compute the same suffix; the
/// UNIQUE column rejects the loser, which re-scans and tries again.
const MAX_ALLOCATE_ATTEMPTS: usize = 5;

pub struct CreateProductInput {
    pub name: String,
    pub price: f64,

    /// Used verbatim when supplied; otherwise a barcode is allocated from
    /// the name family.
    pub barcode: Option<String>,

    pub image_ref: Option<String>,

    pub group_ids: Vec<String>,
}

pub struct UpdateProductInput {
    pub name: String,
    pub price: f64,
    pub image_ref: Option<String>,

    /// Full replacement membership set. `None` leaves memberships untouched.
    pub group_ids: Option<Vec<String>>,

    /// Legacy single-group form; treated as a one-element `group_ids`.
    pub group_id: Option<String>,
}

fn validate(name: &str, price: f64) -> Result<String, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("product name must not be empty".into()));
    }
    if !(price > 0.0) {
        return Err(ServiceError::Validation("product price must be positive".into()));
    }
    Ok(name.to_string())
}

impl InventoryService {
    /// Create a product, allocating a barcode when none is supplied, then
    /// attach it to the requested groups.
    ///
    /// A membership failure after the product row exists leaves the product
    /// ungrouped (or partially grouped) — that is a valid state, so the row
    /// is kept and the error propagated.
    pub fn create_product(&self, input: CreateProductInput) -> Result<Product, ServiceError> {
        let name = validate(&input.name, input.price)?;

        // Unknown groups are a client error; catch them before any write.
        let mut group_ids = Vec::new();
        let mut seen = HashSet::new();
        for gid in &input.group_ids {
            if seen.insert(gid.as_str()) {
                self.get_group(gid)?;
                group_ids.push(gid.clone());
            }
        }

        let id = new_id();
        let now = now_rfc3339();

        let resolved = match &input.barcode {
            Some(code) => {
                self.insert_product_row(&id, &name, input.price, code, input.image_ref.as_deref(), &now)
                    .map_err(|e| match e {
                        ServiceError::Conflict(_) => ServiceError::Conflict(format!(
                            "barcode '{}' is already in use",
                            code
                        )),
                        other => other,
                    })?;
                code.clone()
            }
            None => self.insert_allocating_barcode(
                &id,
                &name,
                input.price,
                input.image_ref.as_deref(),
                &now,
            )?,
        };

        for gid in &group_ids {
            self.add_membership(&id, gid)?;
        }

        info!(product = %id, barcode = %resolved, "product created");
        Ok(Product {
            id,
            name,
            price: input.price,
            barcode: resolved,
            image_ref: input.image_ref,
            create_at: Some(now.clone()),
            update_at: Some(now),
        })
    }

    pub fn get_product(&self, id: &str) -> Result<Product, ServiceError> {
        let rows = self
            .sql
            .query(
                "SELECT * FROM products WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(map_sql)?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("products/{}", id)))?;
        product_from_row(row)
    }

    /// Look a product up by its exact barcode (the scan path).
    pub fn find_product_by_barcode(&self, code: &str) -> Result<Product, ServiceError> {
        let rows = self
            .sql
            .query(
                "SELECT * FROM products WHERE barcode = ?1",
                &[Value::Text(code.to_string())],
            )
            .map_err(map_sql)?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("products/barcode/{}", code)))?;
        product_from_row(row)
    }

    pub fn list_products(&self, params: &ListParams) -> Result<ListResult<Product>, ServiceError> {
        let limit = params.limit.min(500);

        let count_rows = self
            .sql
            .query("SELECT COUNT(*) as cnt FROM products", &[])
            .map_err(map_sql)?;
        let total = count_rows
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        let rows = self
            .sql
            .query(
                "SELECT * FROM products ORDER BY create_at DESC LIMIT ?1 OFFSET ?2",
                &[
                    Value::Integer(limit as i64),
                    Value::Integer(params.offset as i64),
                ],
            )
            .map_err(map_sql)?;

        let items = rows
            .iter()
            .map(product_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ListResult { items, total })
    }

    /// Update a product's own fields and, when a group set is supplied,
    /// replace its memberships. The barcode is never re-derived: renames do
    /// not move a product into another barcode family.
    pub fn update_product(
        &self,
        id: &str,
        input: UpdateProductInput,
    ) -> Result<Product, ServiceError> {
        let name = validate(&input.name, input.price)?;
        self.get_product(id)?;

        let now = now_rfc3339();
        self.sql
            .exec(
                "UPDATE products SET name = ?1, price = ?2, image_ref = ?3, update_at = ?4
                 WHERE id = ?5",
                &[
                    Value::Text(name),
                    Value::Real(input.price),
                    match &input.image_ref {
                        Some(r) => Value::Text(r.clone()),
                        None => Value::Null,
                    },
                    Value::Text(now),
                    Value::Text(id.to_string()),
                ],
            )
            .map_err(map_sql)?;

        let replacement = match (input.group_ids, input.group_id) {
            (Some(set), _) => Some(set),
            (None, Some(gid)) => Some(vec![gid]),
            (None, None) => None,
        };
        if let Some(set) = replacement {
            self.replace_memberships_for_product(id, &set)?;
        }

        self.get_product(id)
    }

    /// Swap a product's image reference, deleting the replaced blob.
    pub fn update_product_image(
        &self,
        id: &str,
        image_ref: &str,
    ) -> Result<Product, ServiceError> {
        let current = self.get_product(id)?;

        let now = now_rfc3339();
        self.sql
            .exec(
                "UPDATE products SET image_ref = ?1, update_at = ?2 WHERE id = ?3",
                &[
                    Value::Text(image_ref.to_string()),
                    Value::Text(now),
                    Value::Text(id.to_string()),
                ],
            )
            .map_err(map_sql)?;

        if let Some(old) = current.image_ref {
            if old != image_ref {
                if let Err(e) = self.blob.delete(&old) {
                    warn!(product = %id, blob = %old, "failed to delete replaced image: {}", e);
                }
            }
        }

        self.get_product(id)
    }

    /// Delete a product: memberships (with their count decrements) and the
    /// row go in one transaction, then the owned image blob is removed.
    pub fn delete_product(&self, id: &str) -> Result<(), ServiceError> {
        let product = self.get_product(id)?;

        let tx = self.sql.begin().map_err(map_sql)?;
        tx.exec(
            "UPDATE product_groups SET count = MAX(count - 1, 0)
             WHERE id IN (SELECT product_group_id FROM memberships WHERE product_id = ?1)",
            &[Value::Text(id.to_string())],
        )
        .map_err(map_sql)?;
        tx.exec(
            "DELETE FROM memberships WHERE product_id = ?1",
            &[Value::Text(id.to_string())],
        )
        .map_err(map_sql)?;
        let affected = tx
            .exec(
                "DELETE FROM products WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(map_sql)?;
        tx.commit().map_err(map_sql)?;

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("products/{}", id)));
        }

        // The row delete is committed; blob cleanup failures only leak a file.
        if let Some(ref img) = product.image_ref {
            if let Err(e) = self.blob.delete(img) {
                warn!(product = %id, blob = %img, "failed to delete owned image: {}", e);
            }
        }

        info!(product = %id, "product deleted");
        Ok(())
    }

    // ── Barcode resolution ──

    fn insert_product_row(
        &self,
        id: &str,
        name: &str,
        price: f64,
        code: &str,
        image_ref: Option<&str>,
        now: &str,
    ) -> Result<(), ServiceError> {
        self.sql
            .exec(
                "INSERT INTO products (id, name, price, barcode, image_ref, create_at, update_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                &[
                    Value::Text(id.to_string()),
                    Value::Text(name.to_string()),
                    Value::Real(price),
                    Value::Text(code.to_string()),
                    match image_ref {
                        Some(r) => Value::Text(r.to_string()),
                        None => Value::Null,
                    },
                    Value::Text(now.to_string()),
                    Value::Text(now.to_string()),
                ],
            )
            .map_err(map_sql)?;
        Ok(())
    }

    /// Allocate-then-insert, retrying while another creator wins the same
    /// suffix. The UNIQUE barcode column is the serialization point.
    fn insert_allocating_barcode(
        &self,
        id: &str,
        name: &str,
        price: f64,
        image_ref: Option<&str>,
        now: &str,
    ) -> Result<String, ServiceError> {
        let base = barcode::base_name(name);

        for _ in 0..MAX_ALLOCATE_ATTEMPTS {
            let existing = self.family_barcodes(&base)?;
            let candidate = barcode::allocate(name, &existing)
                .map_err(|e| ServiceError::Conflict(e.to_string()))?;

            match self.insert_product_row(id, name, price, &candidate, image_ref, now) {
                Ok(()) => return Ok(candidate),
                Err(ServiceError::Conflict(_)) => {
                    debug!(barcode = %candidate, "allocated barcode taken, retrying");
                    continue;
                }
                Err(other) => return Err(other),
            }
        }

        warn!(base = %base, "barcode allocation exhausted its retries");
        Err(ServiceError::Conflict(format!(
            "could not allocate a unique barcode for '{}' after {} attempts",
            name, MAX_ALLOCATE_ATTEMPTS
        )))
    }

    fn family_barcodes(&self, base: &str) -> Result<Vec<String>, ServiceError> {
        let rows = self
            .sql
            .query(
                "SELECT barcode FROM products WHERE barcode LIKE ?1",
                &[Value::Text(format!("{}-%", base))],
            )
            .map_err(map_sql)?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("barcode").map(str::to_string))
            .collect())
    }
}
