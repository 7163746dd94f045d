//! This module provides the local, SQLite-backed storage of task lists and tasks
//!
//! Every row carries a `synced` flag, that tells whether the server already knows about its current state.
//! Deletions are soft (`deleted=1`) until the sync provider has propagated them, and [`TaskStore::clean_deleted`] reaps them.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StoreError;
use crate::ical::FloatingDate;
use crate::task::{join_tags, new_uid, split_tags, TaskChange, TaskData, TaskListData};

mod schema;
mod tree;
pub use tree::MoveMode;

use schema::NOW;

const TASK_COLUMNS: &str = "list_uid, uid, parent, text, notes, tags, color, priority, percent_complete, \
    start_date, end_date, completed, deleted, trash, synced, expanded, toolbar_shown, created_at, changed_at";

/// The local task database.
///
/// A single connection is shared by every caller (UI thread, sync worker...), each call locks it for its own duration only.
#[derive(Debug)]
pub struct TaskStore {
    conn: Mutex<Connection>,
}

impl TaskStore {
    /// The default location of the database, in the per-user data directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("errands").join("data.db"))
    }

    /// Open (and create if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(folder) = path.parent() {
            std::fs::create_dir_all(folder)?;
        }
        log::debug!("Opening task database {:?}", path);
        Ok(Self { conn: Mutex::new(schema::open(path)?) })
    }

    /// An empty database that lives in memory only
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self { conn: Mutex::new(schema::open_memory()?) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }


    // Lists

    /// Add a list and return its uid (a random one is picked if `uid` is `None`)
    pub fn add_list(&self, name: &str, uid: Option<&str>, synced: bool) -> Result<String, StoreError> {
        let uid = uid.map(String::from).unwrap_or_else(new_uid);
        self.conn()?.execute(
            "INSERT INTO lists (uid, name, deleted, synced) VALUES (?1, ?2, 0, ?3)",
            params![uid, name, synced],
        )?;
        log::debug!("Added list {} ({})", name, uid);
        Ok(uid)
    }

    /// Every list, including the soft-deleted ones
    pub fn get_lists(&self) -> Result<Vec<TaskListData>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT uid, name, deleted, synced FROM lists ORDER BY rowid")?;
        let lists = stmt.query_map([], list_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lists)
    }

    pub fn get_list(&self, uid: &str) -> Result<TaskListData, StoreError> {
        self.conn()?
            .query_row("SELECT uid, name, deleted, synced FROM lists WHERE uid = ?1", [uid], list_from_row)
            .optional()?
            .ok_or_else(|| StoreError::ListNotFound(uid.to_string()))
    }

    /// Rename a list. The new name will be pushed at the next sync
    pub fn rename_list(&self, uid: &str, name: &str) -> Result<(), StoreError> {
        self.update_list(uid, Some(name), Some(false))
    }

    /// Low-level list update, used by the sync provider
    pub fn update_list(&self, uid: &str, name: Option<&str>, synced: Option<bool>) -> Result<(), StoreError> {
        let n = self.conn()?.execute(
            "UPDATE lists SET name = COALESCE(?2, name), synced = COALESCE(?3, synced) WHERE uid = ?1",
            params![uid, name, synced],
        )?;
        if n == 0 {
            return Err(StoreError::ListNotFound(uid.to_string()));
        }
        Ok(())
    }

    /// Give a list (and all of its tasks) a new uid
    pub fn change_list_uid(&self, old_uid: &str, new_uid: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let n = tx.execute("UPDATE lists SET uid = ?2 WHERE uid = ?1", params![old_uid, new_uid])?;
        if n == 0 {
            return Err(StoreError::ListNotFound(old_uid.to_string()));
        }
        tx.execute("UPDATE tasks SET list_uid = ?2 WHERE list_uid = ?1", params![old_uid, new_uid])?;
        tx.commit()?;
        Ok(())
    }

    /// Mark a list and every task it contains as deleted.
    ///
    /// Rows are kept until the next sync has deleted the remote calendar, see [`Self::clean_deleted`]
    pub fn delete_list(&self, uid: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let n = tx.execute("UPDATE lists SET deleted = 1, synced = 0 WHERE uid = ?1", [uid])?;
        if n == 0 {
            return Err(StoreError::ListNotFound(uid.to_string()));
        }
        tx.execute("UPDATE tasks SET deleted = 1 WHERE list_uid = ?1", [uid])?;
        tx.commit()?;
        Ok(())
    }

    /// Immediately remove a list and its tasks
    pub fn purge_list(&self, uid: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM tasks WHERE list_uid = ?1", [uid])?;
        tx.execute("DELETE FROM lists WHERE uid = ?1", [uid])?;
        tx.commit()?;
        Ok(())
    }


    // Tasks

    /// Insert a task and return its uid.
    ///
    /// A random uid is picked if `task.uid` is empty.
    /// The task is put first in its list if `insert_at_the_top`, last otherwise.
    pub fn add_task(&self, task: &TaskData, insert_at_the_top: bool) -> Result<String, StoreError> {
        let mut task = task.clone();
        if task.uid.is_empty() {
            task.uid = new_uid();
        }
        task.start_date = canonical_date(&task.start_date)?;
        task.end_date = canonical_date(&task.end_date)?;

        let conn = self.conn()?;
        if tree::creates_cycle(&conn, &task.list_uid, &task.uid, &task.parent)? {
            return Err(StoreError::ParentCycle { uid: task.uid, parent: task.parent });
        }
        let position = if insert_at_the_top {
            tree::min_position(&conn, &task.list_uid)? - 1
        } else {
            tree::max_position(&conn, &task.list_uid)? + 1
        };
        insert_task_row(&conn, &task, position)?;
        log::trace!("Added task {} to list {}", task.uid, task.list_uid);
        Ok(task.uid)
    }

    pub fn get_task(&self, list_uid: &str, uid: &str) -> Result<TaskData, StoreError> {
        let conn = self.conn()?;
        get_task_row(&conn, list_uid, uid)
    }

    /// Tasks (including tombstones), optionally restricted to a list and/or to the direct children of `parent`.
    ///
    /// An empty `parent` selects the top-level tasks. Tasks come in list order.
    pub fn get_tasks(&self, list_uid: Option<&str>, parent: Option<&str>) -> Result<Vec<TaskData>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM tasks WHERE (?1 IS NULL OR list_uid = ?1) AND (?2 IS NULL OR parent = ?2) ORDER BY list_uid, position",
            TASK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt.query_map(params![list_uid, parent], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Update some columns of a task.
    ///
    /// This does not touch the `synced` flag unless a [`TaskChange::Synced`] is given.
    /// Dates are stored in their canonical form, and [`StoreError::InvalidDate`] is returned for dates that cannot be understood.
    pub fn update_props(&self, list_uid: &str, uid: &str, changes: &[TaskChange]) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        let n = update_task_row(&conn, list_uid, uid, changes, false)?;
        if n == 0 {
            return Err(StoreError::TaskNotFound { list_uid: list_uid.to_string(), uid: uid.to_string() });
        }
        Ok(())
    }

    /// Apply changes fetched from the server, unless the task has local changes that are not pushed yet.
    ///
    /// Returns whether the row has been updated
    pub fn apply_remote_changes(&self, list_uid: &str, uid: &str, changes: &[TaskChange]) -> Result<bool, StoreError> {
        if changes.is_empty() {
            return Ok(false);
        }
        let conn = self.conn()?;
        Ok(update_task_row(&conn, list_uid, uid, changes, true)? > 0)
    }

    /// Flag a task as synced, provided it still holds what has been pushed to the server.
    ///
    /// Returns `false` and leaves the row alone if the task has been edited or removed since `pushed` was read.
    pub fn mark_synced_if_unchanged(&self, pushed: &TaskData) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let current = match get_task_row(&conn, &pushed.list_uid, &pushed.uid) {
            Err(StoreError::TaskNotFound { .. }) => return Ok(false),
            other => other?,
        };
        if current.deleted != pushed.deleted || !pushed.remote_changes_towards(&current).is_empty() {
            return Ok(false);
        }
        conn.execute(
            "UPDATE tasks SET synced = 1 WHERE list_uid = ?1 AND uid = ?2",
            params![pushed.list_uid, pushed.uid],
        )?;
        Ok(true)
    }

    /// Immediately remove a single task row
    pub fn delete_task(&self, list_uid: &str, uid: &str) -> Result<(), StoreError> {
        self.conn()?.execute("DELETE FROM tasks WHERE list_uid = ?1 AND uid = ?2", params![list_uid, uid])?;
        Ok(())
    }

    /// Remove a task row only if it has no pending local change. Returns whether it has been removed
    pub fn delete_synced_task(&self, list_uid: &str, uid: &str) -> Result<bool, StoreError> {
        let n = self.conn()?.execute(
            "DELETE FROM tasks WHERE list_uid = ?1 AND uid = ?2 AND synced = 1",
            params![list_uid, uid],
        )?;
        Ok(n > 0)
    }

    /// Turn every trashed task into a sync tombstone, and return how many were affected
    pub fn empty_trash(&self, list_uid: Option<&str>) -> Result<usize, StoreError> {
        let n = self.conn()?.execute(
            "UPDATE tasks SET deleted = 1, synced = 0 WHERE trash = 1 AND deleted = 0 AND (?1 IS NULL OR list_uid = ?1)",
            params![list_uid],
        )?;
        Ok(n)
    }

    /// Remove every soft-deleted list and task for good.
    ///
    /// Returns the number of (lists, tasks) that have been removed
    pub fn clean_deleted(&self) -> Result<(usize, usize), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let n_lists = tx.execute("DELETE FROM lists WHERE deleted = 1", [])?;
        let n_tasks = tx.execute(
            "DELETE FROM tasks WHERE deleted = 1 OR list_uid NOT IN (SELECT uid FROM lists)",
            [],
        )?;
        tx.commit()?;
        if n_lists + n_tasks > 0 {
            log::debug!("Cleaned {} deleted lists and {} deleted tasks", n_lists, n_tasks);
        }
        Ok((n_lists, n_tasks))
    }
}


fn list_from_row(row: &Row) -> rusqlite::Result<TaskListData> {
    Ok(TaskListData {
        uid: row.get(0)?,
        name: row.get(1)?,
        deleted: row.get(2)?,
        synced: row.get(3)?,
    })
}

fn task_from_row(row: &Row) -> rusqlite::Result<TaskData> {
    let tags: String = row.get("tags")?;
    let priority: i64 = row.get("priority")?;
    let percent_complete: i64 = row.get("percent_complete")?;
    Ok(TaskData {
        list_uid: row.get("list_uid")?,
        uid: row.get("uid")?,
        parent: row.get("parent")?,
        text: row.get("text")?,
        notes: row.get("notes")?,
        tags: split_tags(&tags),
        color: row.get("color")?,
        priority: priority.clamp(0, 9) as u8,
        percent_complete: percent_complete.clamp(0, 100) as u8,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        completed: row.get("completed")?,
        deleted: row.get("deleted")?,
        trash: row.get("trash")?,
        synced: row.get("synced")?,
        expanded: row.get("expanded")?,
        toolbar_shown: row.get("toolbar_shown")?,
        created_at: row.get("created_at")?,
        changed_at: row.get("changed_at")?,
    })
}

/// The canonical stored form of a date, see [`FloatingDate`]. Empty stays empty
fn canonical_date(value: &str) -> Result<String, StoreError> {
    if value.trim().is_empty() {
        return Ok(String::new());
    }
    FloatingDate::parse(value)
        .map(|date| date.format())
        .ok_or_else(|| StoreError::InvalidDate(value.to_string()))
}

/// Write `changes` to a task row and bump its `changed_at`. Returns the number of updated rows.
///
/// With `only_if_synced`, rows that have pending local changes are left alone.
fn update_task_row(conn: &Connection, list_uid: &str, uid: &str, changes: &[TaskChange], only_if_synced: bool) -> Result<usize, StoreError> {
    let changes = changes.iter()
        .map(|change| match change {
            TaskChange::StartDate(date) => canonical_date(date).map(TaskChange::StartDate),
            TaskChange::EndDate(date) => canonical_date(date).map(TaskChange::EndDate),
            other => Ok(other.clone()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    for change in &changes {
        if let TaskChange::Parent(parent) = change {
            if tree::creates_cycle(conn, list_uid, uid, parent)? {
                return Err(StoreError::ParentCycle { uid: uid.to_string(), parent: parent.clone() });
            }
        }
    }

    let assignments = changes.iter()
        .enumerate()
        .map(|(i, change)| format!("{} = ?{}", change.column(), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE tasks SET {}, changed_at = {} WHERE list_uid = ?{} AND uid = ?{}{}",
        assignments, NOW, changes.len() + 1, changes.len() + 2,
        if only_if_synced { " AND synced = 1" } else { "" }
    );
    let mut values: Vec<rusqlite::types::Value> = changes.iter().map(TaskChange::sql_value).collect();
    values.push(list_uid.to_string().into());
    values.push(uid.to_string().into());

    Ok(conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?)
}

fn get_task_row(conn: &Connection, list_uid: &str, uid: &str) -> Result<TaskData, StoreError> {
    let sql = format!("SELECT {} FROM tasks WHERE list_uid = ?1 AND uid = ?2", TASK_COLUMNS);
    conn.query_row(&sql, params![list_uid, uid], task_from_row)
        .optional()?
        .ok_or_else(|| StoreError::TaskNotFound { list_uid: list_uid.to_string(), uid: uid.to_string() })
}

/// Insert (or replace) a full task row at the given position
fn insert_task_row(conn: &Connection, task: &TaskData, position: i64) -> Result<(), StoreError> {
    let sql = format!(
        "INSERT OR REPLACE INTO tasks ({}, position) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
          COALESCE(NULLIF(?18, ''), {now}), COALESCE(NULLIF(?19, ''), {now}), ?20)",
        TASK_COLUMNS,
        now = NOW
    );
    conn.execute(&sql, params![
        task.list_uid,
        task.uid,
        task.parent,
        task.text,
        task.notes,
        join_tags(&task.tags),
        task.color,
        task.priority.min(9),
        task.percent_complete.min(100),
        task.start_date,
        task.end_date,
        task.completed,
        task.deleted,
        task.trash,
        task.synced,
        task.expanded,
        task.toolbar_shown,
        task.created_at,
        task.changed_at,
        position,
    ])?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_list() -> (TaskStore, String) {
        let store = TaskStore::open_in_memory().unwrap();
        let list = store.add_list("Groceries", None, false).unwrap();
        (store, list)
    }

    #[test]
    fn add_and_get_list() {
        let store = TaskStore::open_in_memory().unwrap();
        let uid = store.add_list("Groceries", Some("L1"), false).unwrap();
        assert_eq!(uid, "L1");

        let generated = store.add_list("Work", None, true).unwrap();
        assert!(!generated.is_empty());

        let lists = store.get_lists().unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0], TaskListData { uid: "L1".into(), name: "Groceries".into(), deleted: false, synced: false });
        assert!(lists[1].synced);
    }

    #[test]
    fn duplicate_list_uid_fails() {
        let store = TaskStore::open_in_memory().unwrap();
        store.add_list("A", Some("L1"), false).unwrap();
        assert!(store.add_list("B", Some("L1"), false).is_err());
    }

    #[test]
    fn missing_list_is_an_error() {
        let store = TaskStore::open_in_memory().unwrap();
        assert!(matches!(store.get_list("nope"), Err(StoreError::ListNotFound(_))));
        assert!(matches!(store.rename_list("nope", "x"), Err(StoreError::ListNotFound(_))));
    }

    #[test]
    fn rename_marks_unsynced() {
        let store = TaskStore::open_in_memory().unwrap();
        let uid = store.add_list("Old", None, true).unwrap();
        store.rename_list(&uid, "New").unwrap();
        let list = store.get_list(&uid).unwrap();
        assert_eq!(list.name, "New");
        assert!(!list.synced);
    }

    #[test]
    fn add_and_get_task() {
        let (store, list) = store_with_list();
        let mut task = TaskData::new(&list, "Buy milk");
        task.tags = vec!["food".into(), "urgent".into()];
        task.priority = 12;
        let uid = store.add_task(&task, false).unwrap();

        let stored = store.get_task(&list, &uid).unwrap();
        assert_eq!(stored.text, "Buy milk");
        assert_eq!(stored.tags, vec!["food", "urgent"]);
        assert_eq!(stored.priority, 9);
        assert!(!stored.synced);
        assert!(!stored.created_at.is_empty());
    }

    #[test]
    fn insert_at_the_top() {
        let (store, list) = store_with_list();
        let a = store.add_task(&TaskData::new(&list, "a"), false).unwrap();
        let b = store.add_task(&TaskData::new(&list, "b"), false).unwrap();
        let c = store.add_task(&TaskData::new(&list, "c"), true).unwrap();

        let order: Vec<String> = store.get_tasks(Some(&list), None).unwrap().into_iter().map(|t| t.uid).collect();
        assert_eq!(order, vec![c, a, b]);
    }

    #[test]
    fn get_tasks_filters_by_parent() {
        let (store, list) = store_with_list();
        let parent = store.add_task(&TaskData::new(&list, "parent"), false).unwrap();
        let mut child = TaskData::new(&list, "child");
        child.parent = parent.clone();
        store.add_task(&child, false).unwrap();

        let other_list = store.add_list("Other", None, false).unwrap();
        store.add_task(&TaskData::new(&other_list, "elsewhere"), false).unwrap();

        assert_eq!(store.get_tasks(None, None).unwrap().len(), 3);
        assert_eq!(store.get_tasks(Some(&list), None).unwrap().len(), 2);
        let top = store.get_tasks(Some(&list), Some("")).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].text, "parent");
        let children = store.get_tasks(Some(&list), Some(&parent)).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].text, "child");
    }

    #[test]
    fn update_props_writes_columns() {
        let (store, list) = store_with_list();
        let uid = store.add_task(&TaskData::new(&list, "draft"), false).unwrap();
        store.update_props(&list, &uid, &[
            TaskChange::Text("final".into()),
            TaskChange::Tags(vec!["a".into(), "b".into()]),
            TaskChange::PercentComplete(50),
            TaskChange::Synced(true),
        ]).unwrap();

        let task = store.get_task(&list, &uid).unwrap();
        assert_eq!(task.text, "final");
        assert_eq!(task.tags, vec!["a", "b"]);
        assert_eq!(task.percent_complete, 50);
        assert!(task.synced);

        let missing = store.update_props(&list, "nope", &[TaskChange::Text("x".into())]);
        assert!(matches!(missing, Err(StoreError::TaskNotFound { .. })));
    }

    #[test]
    fn dates_are_canonicalized() {
        let (store, list) = store_with_list();
        let mut task = TaskData::new(&list, "meeting");
        task.end_date = "2024-01-05T10:00:00".into();
        let uid = store.add_task(&task, false).unwrap();
        assert_eq!(store.get_task(&list, &uid).unwrap().end_date, "20240105T100000");

        store.update_props(&list, &uid, &[TaskChange::StartDate("2024-01-02".into())]).unwrap();
        store.update_props(&list, &uid, &[TaskChange::EndDate(String::new())]).unwrap();
        let task = store.get_task(&list, &uid).unwrap();
        assert_eq!(task.start_date, "20240102");
        assert_eq!(task.end_date, "");
    }

    #[test]
    fn invalid_dates_are_rejected() {
        let (store, list) = store_with_list();
        let mut task = TaskData::new(&list, "someday");
        task.start_date = "next tuesday".into();
        assert!(matches!(store.add_task(&task, false), Err(StoreError::InvalidDate(_))));

        let uid = store.add_task(&TaskData::new(&list, "someday"), false).unwrap();
        let res = store.update_props(&list, &uid, &[TaskChange::Text("later".into()), TaskChange::EndDate("soon".into())]);
        assert!(matches!(res, Err(StoreError::InvalidDate(_))));
        assert_eq!(store.get_task(&list, &uid).unwrap().text, "someday");
    }

    #[test]
    fn remote_changes_skip_locally_edited_tasks() {
        let (store, list) = store_with_list();
        let mut task = TaskData::new(&list, "local edit");
        task.synced = false;
        let uid = store.add_task(&task, false).unwrap();

        let applied = store.apply_remote_changes(&list, &uid, &[TaskChange::Text("server".into())]).unwrap();
        assert!(!applied);
        assert_eq!(store.get_task(&list, &uid).unwrap().text, "local edit");
        assert!(!store.delete_synced_task(&list, &uid).unwrap());

        store.update_props(&list, &uid, &[TaskChange::Synced(true)]).unwrap();
        assert!(store.apply_remote_changes(&list, &uid, &[TaskChange::Text("server".into())]).unwrap());
        assert_eq!(store.get_task(&list, &uid).unwrap().text, "server");
        assert!(store.delete_synced_task(&list, &uid).unwrap());
        assert!(store.get_task(&list, &uid).is_err());
    }

    #[test]
    fn mark_synced_only_when_content_is_unchanged() {
        let (store, list) = store_with_list();
        let uid = store.add_task(&TaskData::new(&list, "pushed"), false).unwrap();
        let pushed = store.get_task(&list, &uid).unwrap();

        store.update_props(&list, &uid, &[TaskChange::Text("edited meanwhile".into())]).unwrap();
        assert!(!store.mark_synced_if_unchanged(&pushed).unwrap());
        assert!(!store.get_task(&list, &uid).unwrap().synced);

        let pushed = store.get_task(&list, &uid).unwrap();
        store.update_props(&list, &uid, &[TaskChange::Expanded(true)]).unwrap();
        assert!(store.mark_synced_if_unchanged(&pushed).unwrap());
        assert!(store.get_task(&list, &uid).unwrap().synced);

        store.delete_task(&list, &uid).unwrap();
        assert!(!store.mark_synced_if_unchanged(&pushed).unwrap());
    }

    #[test]
    fn delete_list_cascades_tombstones() {
        let (store, list) = store_with_list();
        let uid = store.add_task(&TaskData::new(&list, "a"), false).unwrap();
        store.delete_list(&list).unwrap();

        assert!(store.get_list(&list).unwrap().deleted);
        assert!(store.get_task(&list, &uid).unwrap().deleted);

        assert_eq!(store.clean_deleted().unwrap(), (1, 1));
        assert!(store.get_lists().unwrap().is_empty());
        assert!(store.get_tasks(None, None).unwrap().is_empty());
    }

    #[test]
    fn clean_deleted_keeps_live_rows() {
        let (store, list) = store_with_list();
        let keep = store.add_task(&TaskData::new(&list, "keep"), false).unwrap();
        let gone = store.add_task(&TaskData::new(&list, "gone"), false).unwrap();
        store.update_props(&list, &gone, &[TaskChange::Deleted(true)]).unwrap();

        assert_eq!(store.clean_deleted().unwrap(), (0, 1));
        assert!(store.get_task(&list, &keep).is_ok());
        assert!(store.get_task(&list, &gone).is_err());
    }

    #[test]
    fn empty_trash_creates_tombstones() {
        let (store, list) = store_with_list();
        let uid = store.add_task(&TaskData::new(&list, "junk"), false).unwrap();
        store.update_props(&list, &uid, &[TaskChange::Trash(true), TaskChange::Synced(true)]).unwrap();

        assert_eq!(store.empty_trash(Some(&list)).unwrap(), 1);
        let task = store.get_task(&list, &uid).unwrap();
        assert!(task.deleted);
        assert!(!task.synced);
        assert_eq!(store.empty_trash(None).unwrap(), 0);
    }

    #[test]
    fn change_list_uid_moves_tasks() {
        let (store, list) = store_with_list();
        let uid = store.add_task(&TaskData::new(&list, "a"), false).unwrap();
        store.change_list_uid(&list, "remote-id").unwrap();

        assert!(store.get_list("remote-id").is_ok());
        assert!(store.get_task("remote-id", &uid).is_ok());
        assert!(store.get_tasks(Some(&list), None).unwrap().is_empty());
    }

    #[test]
    fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.db");
        {
            let store = TaskStore::open(&path).unwrap();
            store.add_list("Persistent", Some("L1"), false).unwrap();
        }
        let store = TaskStore::open(&path).unwrap();
        assert_eq!(store.get_list("L1").unwrap().name, "Persistent");
    }
}
