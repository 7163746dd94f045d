//! Task lists and to-do tasks, as stored locally and as projected from iCal `VTODO` items

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a new random identifier, used for lists and tasks created locally
pub fn new_uid() -> String {
    Uuid::new_v4().to_hyphenated().to_string()
}

/// A task list.
///
/// When the list is synced, its `uid` is also the identifier of the remote calendar
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListData {
    pub uid: String,
    pub name: String,
    /// Soft-delete flag: the list waits for its remote deletion and for the reaper
    pub deleted: bool,
    /// `false` when the list has local changes the server does not know about
    pub synced: bool,
}

/// A to-do task.
///
/// `(list_uid, uid)` identifies a task. `uid` doubles as the remote `VTODO` UID.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskData {
    pub list_uid: String,
    pub uid: String,
    /// UID of the parent task, or an empty string for a top-level task
    pub parent: String,
    pub text: String,
    pub notes: String,
    pub tags: Vec<String>,
    pub color: String,
    /// 0 (undefined) to 9
    pub priority: u8,
    /// 0 to 100
    pub percent_complete: u8,
    /// Floating date (`YYYYMMDD`) or date-time (`YYYYMMDDTHHMMSS`), empty if unset
    pub start_date: String,
    pub end_date: String,
    pub completed: bool,
    /// Sync tombstone, removed for good by [`TaskStore::clean_deleted`](crate::store::TaskStore::clean_deleted)
    pub deleted: bool,
    /// User-visible recycle bin
    pub trash: bool,
    pub synced: bool,
    pub expanded: bool,
    pub toolbar_shown: bool,
    pub created_at: String,
    pub changed_at: String,
}

impl Default for TaskData {
    fn default() -> Self {
        Self {
            list_uid: String::new(),
            uid: String::new(),
            parent: String::new(),
            text: String::new(),
            notes: String::new(),
            tags: Vec::new(),
            color: String::new(),
            priority: 0,
            percent_complete: 0,
            start_date: String::new(),
            end_date: String::new(),
            completed: false,
            deleted: false,
            trash: false,
            synced: false,
            expanded: false,
            toolbar_shown: false,
            created_at: String::new(),
            changed_at: String::new(),
        }
    }
}

impl TaskData {
    /// A new unsynced task, that has no uid yet (the store will pick one)
    pub fn new<S: ToString, T: ToString>(list_uid: S, text: T) -> Self {
        Self {
            list_uid: list_uid.to_string(),
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_empty()
    }

    /// Returns the changes that would turn `self` into `other`, considering only the fields that
    /// are mirrored on the server (local housekeeping fields are ignored)
    pub fn remote_changes_towards(&self, other: &TaskData) -> Vec<TaskChange> {
        let mut changes = Vec::new();
        if self.text != other.text { changes.push(TaskChange::Text(other.text.clone())); }
        if self.notes != other.notes { changes.push(TaskChange::Notes(other.notes.clone())); }
        if self.parent != other.parent { changes.push(TaskChange::Parent(other.parent.clone())); }
        if self.priority != other.priority { changes.push(TaskChange::Priority(other.priority)); }
        if self.percent_complete != other.percent_complete { changes.push(TaskChange::PercentComplete(other.percent_complete)); }
        if self.completed != other.completed { changes.push(TaskChange::Completed(other.completed)); }
        if self.tags != other.tags { changes.push(TaskChange::Tags(other.tags.clone())); }
        if self.start_date != other.start_date { changes.push(TaskChange::StartDate(other.start_date.clone())); }
        if self.end_date != other.end_date { changes.push(TaskChange::EndDate(other.end_date.clone())); }
        if self.color != other.color { changes.push(TaskChange::Color(other.color.clone())); }
        changes
    }
}

/// A single column update, as consumed by [`TaskStore::update_props`](crate::store::TaskStore::update_props)
#[derive(Clone, Debug, PartialEq)]
pub enum TaskChange {
    Text(String),
    Notes(String),
    Parent(String),
    Tags(Vec<String>),
    Color(String),
    Priority(u8),
    PercentComplete(u8),
    StartDate(String),
    EndDate(String),
    Completed(bool),
    Deleted(bool),
    Trash(bool),
    Synced(bool),
    Expanded(bool),
    ToolbarShown(bool),
}

impl TaskChange {
    /// Name of the database column this change writes to
    pub fn column(&self) -> &'static str {
        match self {
            TaskChange::Text(_) => "text",
            TaskChange::Notes(_) => "notes",
            TaskChange::Parent(_) => "parent",
            TaskChange::Tags(_) => "tags",
            TaskChange::Color(_) => "color",
            TaskChange::Priority(_) => "priority",
            TaskChange::PercentComplete(_) => "percent_complete",
            TaskChange::StartDate(_) => "start_date",
            TaskChange::EndDate(_) => "end_date",
            TaskChange::Completed(_) => "completed",
            TaskChange::Deleted(_) => "deleted",
            TaskChange::Trash(_) => "trash",
            TaskChange::Synced(_) => "synced",
            TaskChange::Expanded(_) => "expanded",
            TaskChange::ToolbarShown(_) => "toolbar_shown",
        }
    }

    /// The value to bind for this column
    pub(crate) fn sql_value(&self) -> rusqlite::types::Value {
        use rusqlite::types::Value;
        match self {
            TaskChange::Text(s) | TaskChange::Notes(s) | TaskChange::Parent(s)
            | TaskChange::Color(s) | TaskChange::StartDate(s) | TaskChange::EndDate(s) => Value::Text(s.clone()),
            TaskChange::Tags(tags) => Value::Text(join_tags(tags)),
            TaskChange::Priority(p) => Value::Integer(i64::from((*p).min(9))),
            TaskChange::PercentComplete(p) => Value::Integer(i64::from((*p).min(100))),
            TaskChange::Completed(b) | TaskChange::Deleted(b) | TaskChange::Trash(b)
            | TaskChange::Synced(b) | TaskChange::Expanded(b) | TaskChange::ToolbarShown(b) => Value::Integer(i64::from(*b)),
        }
    }
}

/// Tags are stored as a single comma-separated string
pub fn join_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn split_tags(joined: &str) -> Vec<String> {
    joined.split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// The tags as the store gives them back: a comma inside a tag splits it
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    split_tags(&join_tags(tags))
}
