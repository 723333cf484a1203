use producto_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};
use sql::Value;
use tracing::info;

use super::{group_from_row, map_sql, InventoryService};
use crate::model::Group;

fn validate_name(name: &str) -> Result<String, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("group name must not be empty".into()));
    }
    Ok(name.to_string())
}

impl InventoryService {
    /// Create an empty group. `count` starts at zero and only the
    /// membership ledger moves it from there.
    pub fn create_group(&self, name: &str) -> Result<Group, ServiceError> {
        let name = validate_name(name)?;
        let id = new_id();
        let now = now_rfc3339();

        self.sql
            .exec(
                "INSERT INTO product_groups (id, name, count, create_at, update_at)
                 VALUES (?1, ?2, 0, ?3, ?4)",
                &[
                    Value::Text(id.clone()),
                    Value::Text(name.clone()),
                    Value::Text(now.clone()),
                    Value::Text(now.clone()),
                ],
            )
            .map_err(map_sql)?;

        info!(group = %id, "group created");
        Ok(Group {
            id,
            name,
            count: 0,
            create_at: Some(now.clone()),
            update_at: Some(now),
        })
    }

    pub fn get_group(&self, id: &str) -> Result<Group, ServiceError> {
        let rows = self
            .sql
            .query(
                "SELECT * FROM product_groups WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(map_sql)?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("product_groups/{}", id)))?;
        group_from_row(row)
    }

    pub fn list_groups(&self, params: &ListParams) -> Result<ListResult<Group>, ServiceError> {
        let limit = params.limit.min(500);

        let count_rows = self
            .sql
            .query("SELECT COUNT(*) as cnt FROM product_groups", &[])
            .map_err(map_sql)?;
        let total = count_rows
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        let rows = self
            .sql
            .query(
                "SELECT * FROM product_groups ORDER BY create_at DESC LIMIT ?1 OFFSET ?2",
                &[
                    Value::Integer(limit as i64),
                    Value::Integer(params.offset as i64),
                ],
            )
            .map_err(map_sql)?;

        let items = rows
            .iter()
            .map(group_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ListResult { items, total })
    }

    pub fn rename_group(&self, id: &str, name: &str) -> Result<Group, ServiceError> {
        let name = validate_name(name)?;
        let now = now_rfc3339();

        let affected = self
            .sql
            .exec(
                "UPDATE product_groups SET name = ?1, update_at = ?2 WHERE id = ?3",
                &[
                    Value::Text(name),
                    Value::Text(now),
                    Value::Text(id.to_string()),
                ],
            )
            .map_err(map_sql)?;
        if affected == 0 {
            return Err(ServiceError::NotFound(format!("product_groups/{}", id)));
        }

        self.get_group(id)
    }

    /// Delete a group. Members are detached, never deleted with it: the
    /// group's membership rows go first, the group row last.
    pub fn delete_group(&self, id: &str) -> Result<(), ServiceError> {
        let tx = self.sql.begin().map_err(map_sql)?;
        tx.exec(
            "DELETE FROM memberships WHERE product_group_id = ?1",
            &[Value::Text(id.to_string())],
        )
        .map_err(map_sql)?;
        let affected = tx
            .exec(
                "DELETE FROM product_groups WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(map_sql)?;
        tx.commit().map_err(map_sql)?;

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("product_groups/{}", id)));
        }

        info!(group = %id, "group deleted");
        Ok(())
    }
}
