//! Traits used at the boundary between the sync engine and the outer world

use async_trait::async_trait;

use crate::calendar::RemoteCalendar;
use crate::error::RemoteError;
use crate::task::TaskData;

/// A source of calendars and tasks that the local store is synced with (usually a CalDAV server).
///
/// Calendars are identified by their id, that local lists use as their uid.
#[async_trait]
pub trait RemoteSource: Send {
    /// Returns the current calendars of this source.
    ///
    /// This may trigger a network round-trip, and callers usually filter out the ones that do not support tasks
    async fn get_calendars(&mut self) -> Result<Vec<RemoteCalendar>, RemoteError>;

    /// Create a calendar that supports tasks
    async fn create_calendar(&mut self, id: &str, name: &str) -> Result<(), RemoteError>;
    async fn rename_calendar(&mut self, id: &str, name: &str) -> Result<(), RemoteError>;
    async fn delete_calendar(&mut self, id: &str) -> Result<(), RemoteError>;

    /// Returns every task of a calendar. Their `list_uid` is the calendar id
    async fn get_tasks(&mut self, calendar_id: &str) -> Result<Vec<TaskData>, RemoteError>;

    /// Upload a task that does not exist on the server yet
    async fn add_task(&mut self, calendar_id: &str, task: &TaskData) -> Result<(), RemoteError>;
    /// Overwrite a task that already exists on the server
    async fn update_task(&mut self, calendar_id: &str, task: &TaskData) -> Result<(), RemoteError>;
    async fn delete_task(&mut self, calendar_id: &str, uid: &str) -> Result<(), RemoteError>;
}
