//! Relationship cleanup helpers used when parent rows are deleted.
//!
//! Deleting a parent either detaches its children (the foreign key is set to
//! NULL and the child row survives) or is refused while children exist.
//!
//! # Relationship Hierarchy
//!
//! ```text
//! users (root)
//! ├── events.organizer_id   (detached on user delete)
//! └── orders.buyer_id       (detached on user delete)
//!
//! categories
//! └── events.category_id    (ON DELETE SET NULL in the schema)
//!
//! events
//! └── orders.event_id       (delete refused while orders exist)
//! ```

use rusqlite::{Connection, params};

use crate::error::Result;

/// Clear a child table's foreign key for every row pointing at `parent_id`.
///
/// Returns the number of detached rows.
pub fn detach_children(
    conn: &Connection,
    child_table: &str,
    fk_column: &str,
    parent_id: &str,
) -> Result<usize> {
    let sql = format!(
        "UPDATE {} SET {} = NULL WHERE {} = ?1",
        child_table, fk_column, fk_column
    );
    let updated = conn.execute(&sql, params![parent_id])?;
    Ok(updated)
}

/// Count rows in a child table that reference `parent_id`.
pub fn count_children(
    conn: &Connection,
    child_table: &str,
    fk_column: &str,
    parent_id: &str,
) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", child_table, fk_column);
    let count = conn.query_row(&sql, params![parent_id], |row| row.get(0))?;
    Ok(count)
}

/// Hard-delete a row by ID.
pub fn delete_entity(conn: &Connection, table: &str, id: &str) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", table);
    let deleted = conn.execute(&sql, params![id])?;
    Ok(deleted > 0)
}

/// Children detached when a user is deleted: (table, foreign key column).
pub const USER_DEPENDENTS: &[(&str, &str)] = &[("events", "organizer_id"), ("orders", "buyer_id")];

/// Detach every dependent row and delete the parent in one transaction.
///
/// Returns whether the parent existed and how many child rows were detached.
pub fn delete_with_detach(
    conn: &Connection,
    table: &str,
    id: &str,
    dependents: &[(&str, &str)],
) -> Result<(bool, usize)> {
    let tx = conn.unchecked_transaction()?;
    let mut detached = 0;
    for (child_table, fk_column) in dependents {
        detached += detach_children(&tx, child_table, fk_column, id)?;
    }
    let deleted = delete_entity(&tx, table, id)?;
    tx.commit()?;
    Ok((deleted, detached))
}
