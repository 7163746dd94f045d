//! Structural operations: task hierarchy, ordering, moves between lists
//!
//! Invariant: no task is its own ancestor. Parent pointers are plain uids (a parent may be missing,
//! e.g. while remote data is being ingested), but every operation that sets a parent refuses to create a cycle.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};

use super::{get_task_row, insert_task_row, TaskStore};
use crate::error::StoreError;

/// What happens to the descendants of a task that is moved to another list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveMode {
    /// The task moves with all of its descendants, which keep their own parent links
    Subtree,
    /// Only the task moves. Its direct children stay in the old list and are re-attached to its former parent
    SingleNode,
}

/// Whether setting `new_parent` as the parent of `uid` would make `uid` one of its own ancestors
pub(super) fn creates_cycle(conn: &Connection, list_uid: &str, uid: &str, new_parent: &str) -> Result<bool, StoreError> {
    if new_parent.is_empty() {
        return Ok(false);
    }

    let mut visited = HashSet::new();
    let mut current = new_parent.to_string();
    loop {
        if current == uid {
            return Ok(true);
        }
        if visited.insert(current.clone()) == false {
            // A pre-existing loop that does not involve `uid`
            log::warn!("Tasks of list {} already form a parent loop around {}", list_uid, current);
            return Ok(false);
        }
        let parent: Option<String> = conn.query_row(
            "SELECT parent FROM tasks WHERE list_uid = ?1 AND uid = ?2",
            params![list_uid, current],
            |row| row.get(0),
        ).optional()?;
        match parent {
            Some(p) if !p.is_empty() => current = p,
            _ => return Ok(false),
        }
    }
}

pub(super) fn min_position(conn: &Connection, list_uid: &str) -> Result<i64, StoreError> {
    let pos: Option<i64> = conn.query_row("SELECT MIN(position) FROM tasks WHERE list_uid = ?1", [list_uid], |row| row.get(0))?;
    Ok(pos.unwrap_or(0))
}

pub(super) fn max_position(conn: &Connection, list_uid: &str) -> Result<i64, StoreError> {
    let pos: Option<i64> = conn.query_row("SELECT MAX(position) FROM tasks WHERE list_uid = ?1", [list_uid], |row| row.get(0))?;
    Ok(pos.unwrap_or(0))
}

fn position_of(conn: &Connection, list_uid: &str, uid: &str) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT position FROM tasks WHERE list_uid = ?1 AND uid = ?2",
        params![list_uid, uid],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StoreError::TaskNotFound { list_uid: list_uid.to_string(), uid: uid.to_string() })
}

fn children_of(conn: &Connection, list_uid: &str, parent: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT uid FROM tasks WHERE list_uid = ?1 AND parent = ?2 ORDER BY position",
    )?;
    let uids = stmt.query_map(params![list_uid, parent], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(uids)
}

/// Depth-first, pre-order walk of the descendants of `parent`
fn collect_descendants(conn: &Connection, list_uid: &str, parent: &str, visited: &mut HashSet<String>, out: &mut Vec<String>) -> Result<(), StoreError> {
    for child in children_of(conn, list_uid, parent)? {
        if visited.insert(child.clone()) == false {
            continue;
        }
        out.push(child.clone());
        collect_descendants(conn, list_uid, &child, visited, out)?;
    }
    Ok(())
}

fn descendants(conn: &Connection, list_uid: &str, parent: &str) -> Result<Vec<String>, StoreError> {
    let mut visited = HashSet::new();
    visited.insert(parent.to_string());
    let mut out = Vec::new();
    collect_descendants(conn, list_uid, parent, &mut visited, &mut out)?;
    Ok(out)
}

fn ancestors(conn: &Connection, list_uid: &str, uid: &str) -> Result<Vec<String>, StoreError> {
    let mut visited = HashSet::new();
    visited.insert(uid.to_string());
    let mut out = Vec::new();
    let mut current = get_task_row(conn, list_uid, uid)?.parent;
    while !current.is_empty() && visited.insert(current.clone()) {
        let parent: Option<String> = conn.query_row(
            "SELECT parent FROM tasks WHERE list_uid = ?1 AND uid = ?2",
            params![list_uid, current],
            |row| row.get(0),
        ).optional()?;
        match parent {
            Some(p) => {
                out.push(current);
                current = p;
            },
            None => break,
        }
    }
    Ok(out)
}

impl TaskStore {
    /// The uids of every descendant of `parent` in a list, depth-first.
    ///
    /// Use an empty `parent` to enumerate the whole list
    pub fn get_task_uids_tree(&self, list_uid: &str, parent: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        descendants(&conn, list_uid, parent)
    }

    /// Reorder a task so that it comes right before `before_uid`
    pub fn move_task_before(&self, list_uid: &str, uid: &str, before_uid: &str) -> Result<(), StoreError> {
        self.move_task_next_to(list_uid, uid, before_uid, false)
    }

    /// Reorder a task so that it comes right after `after_uid`
    pub fn move_task_after(&self, list_uid: &str, uid: &str, after_uid: &str) -> Result<(), StoreError> {
        self.move_task_next_to(list_uid, uid, after_uid, true)
    }

    fn move_task_next_to(&self, list_uid: &str, uid: &str, target_uid: &str, after: bool) -> Result<(), StoreError> {
        if uid == target_uid {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        position_of(&tx, list_uid, uid)?;
        let target = position_of(&tx, list_uid, target_uid)?;
        let new_position = if after { target + 1 } else { target };

        tx.execute(
            "UPDATE tasks SET position = position + 1 WHERE list_uid = ?1 AND position >= ?2 AND uid != ?3",
            params![list_uid, new_position, uid],
        )?;
        tx.execute(
            "UPDATE tasks SET position = ?3 WHERE list_uid = ?1 AND uid = ?2",
            params![list_uid, uid, new_position],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Move a task to another list, as a child of `parent` (or top-level if `parent` is empty).
    ///
    /// Every old row becomes a tombstone. The next sync deletes the ones the old remote calendar knows about,
    /// and the reaper removes the others: `synced` cannot tell a never-synced row from a locally edited one.
    /// New rows are added at the end of the new list, with the given `synced` flag.
    pub fn move_task_to_list(&self, uid: &str, old_list: &str, new_list: &str, parent: &str, synced: bool, mode: MoveMode) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let root = get_task_row(&tx, old_list, uid)?;
        let mut members = vec![uid.to_string()];
        if mode == MoveMode::Subtree {
            members.extend(descendants(&tx, old_list, uid)?);
        }

        if old_list == new_list {
            // Only the hierarchy changes
            if creates_cycle(&tx, new_list, uid, parent)? {
                return Err(StoreError::ParentCycle { uid: uid.to_string(), parent: parent.to_string() });
            }
            if mode == MoveMode::SingleNode {
                tx.execute(
                    "UPDATE tasks SET parent = ?3, synced = 0 WHERE list_uid = ?1 AND parent = ?2",
                    params![old_list, uid, root.parent],
                )?;
            }
            tx.execute(
                "UPDATE tasks SET parent = ?3, synced = ?4 WHERE list_uid = ?1 AND uid = ?2",
                params![old_list, uid, parent, synced],
            )?;
            tx.commit()?;
            return Ok(());
        }

        if members.iter().any(|m| m == parent) || creates_cycle(&tx, new_list, uid, parent)? {
            return Err(StoreError::ParentCycle { uid: uid.to_string(), parent: parent.to_string() });
        }

        if mode == MoveMode::SingleNode {
            tx.execute(
                "UPDATE tasks SET parent = ?3, synced = 0 WHERE list_uid = ?1 AND parent = ?2",
                params![old_list, uid, root.parent],
            )?;
        }

        let mut position = max_position(&tx, new_list)? + 1;
        for member in &members {
            let mut task = get_task_row(&tx, old_list, member)?;
            if member == uid {
                task.parent = parent.to_string();
            }
            task.list_uid = new_list.to_string();
            task.synced = synced;
            task.deleted = false;
            insert_task_row(&tx, &task, position)?;
            position += 1;

            tx.execute(
                "UPDATE tasks SET deleted = 1, synced = 0 WHERE list_uid = ?1 AND uid = ?2",
                params![old_list, member],
            )?;
        }
        tx.commit()?;
        log::debug!("Moved {} task(s) from list {} to list {}", members.len(), old_list, new_list);
        Ok(())
    }

    /// Complete or uncomplete a task, keeping the hierarchy consistent:
    /// completing a task completes all its descendants, uncompleting a task uncompletes all its ancestors.
    ///
    /// Every row whose completion changes is marked as not synced.
    pub fn set_completed(&self, list_uid: &str, uid: &str, completed: bool) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        get_task_row(&tx, list_uid, uid)?;

        let mut affected = vec![uid.to_string()];
        if completed {
            affected.extend(descendants(&tx, list_uid, uid)?);
        } else {
            affected.extend(ancestors(&tx, list_uid, uid)?);
        }

        for task_uid in affected {
            tx.execute(
                &format!(
                    "UPDATE tasks SET completed = ?3, synced = 0, changed_at = {} WHERE list_uid = ?1 AND uid = ?2 AND completed != ?3",
                    super::NOW
                ),
                params![list_uid, task_uid, completed],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Put a task and its descendants in the trash.
    ///
    /// The trash is local only, so `synced` is left as is. See [`TaskStore::empty_trash`] for the remote deletion.
    pub fn trash_task(&self, list_uid: &str, uid: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        get_task_row(&tx, list_uid, uid)?;
        let mut affected = vec![uid.to_string()];
        affected.extend(descendants(&tx, list_uid, uid)?);
        for task_uid in affected {
            tx.execute("UPDATE tasks SET trash = 1 WHERE list_uid = ?1 AND uid = ?2", params![list_uid, task_uid])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Take a task back from the trash, together with its descendants and its ancestors. `synced` is left as is
    pub fn restore_task(&self, list_uid: &str, uid: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        get_task_row(&tx, list_uid, uid)?;
        let mut affected = vec![uid.to_string()];
        affected.extend(descendants(&tx, list_uid, uid)?);
        affected.extend(ancestors(&tx, list_uid, uid)?);
        for task_uid in affected {
            tx.execute("UPDATE tasks SET trash = 0 WHERE list_uid = ?1 AND uid = ?2", params![list_uid, task_uid])?;
        }
        tx.commit()?;
        Ok(())
    }
}
