//! An in-memory remote source, that integration tests sync with instead of a real server
//!
//! Tasks are kept as iCalendar text, and go through the same builder and parser as with a real server
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use errands_sync::calendar::{RemoteCalendar, SupportedComponents};
use errands_sync::error::RemoteError;
use errands_sync::provider::flavor::{GenericCalDav, ServerFlavor};
use errands_sync::traits::RemoteSource;
use errands_sync::{ical, Provider, TaskChange, TaskData, TaskStore};


/// This stores some behaviour tweaks, that describe how a mocked instance will behave during a given test
///
/// So that a functions fails _n_ times after _m_ initial successes, set `(m, n)` for the suited parameter
#[derive(Default, Clone, Debug)]
pub struct MockBehaviour {
    /// If this is true, every action will be allowed
    pub is_suspended: bool,

    pub get_calendars_behaviour: (u32, u32),
    pub create_calendar_behaviour: (u32, u32),
    pub delete_calendar_behaviour: (u32, u32),
    pub get_tasks_behaviour: (u32, u32),
    pub add_task_behaviour: (u32, u32),
    pub update_task_behaviour: (u32, u32),
    pub delete_task_behaviour: (u32, u32),
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// All items will fail at once, for `n_fails` times
    pub fn fail_now(n_fails: u32) -> Self {
        Self {
            is_suspended: false,
            get_calendars_behaviour: (0, n_fails),
            create_calendar_behaviour: (0, n_fails),
            delete_calendar_behaviour: (0, n_fails),
            get_tasks_behaviour: (0, n_fails),
            add_task_behaviour: (0, n_fails),
            update_task_behaviour: (0, n_fails),
            delete_task_behaviour: (0, n_fails),
        }
    }

    /// Suspend this mock behaviour until you call `resume`
    pub fn suspend(&mut self) {
        self.is_suspended = true;
    }
    /// Make this behaviour active again
    pub fn resume(&mut self) {
        self.is_suspended = false;
    }

    pub fn can_get_calendars(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.get_calendars_behaviour, "get_calendars")
    }
    pub fn can_create_calendar(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.create_calendar_behaviour, "create_calendar")
    }
    pub fn can_delete_calendar(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.delete_calendar_behaviour, "delete_calendar")
    }
    pub fn can_get_tasks(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.get_tasks_behaviour, "get_tasks")
    }
    pub fn can_add_task(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.add_task_behaviour, "add_task")
    }
    pub fn can_update_task(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.update_task_behaviour, "update_task")
    }
    pub fn can_delete_task(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.delete_task_behaviour, "delete_task")
    }
}

/// Return Ok(()) in case the value is `(1+, _)` or `(_, 0)`, or return Err and decrement otherwise
fn decrement(value: &mut (u32, u32), descr: &str) -> Result<(), RemoteError> {
    let remaining_successes = value.0;
    let remaining_failures = value.1;

    if remaining_successes > 0 {
        value.0 -= 1;
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    } else if remaining_failures > 0 {
        value.1 -= 1;
        log::debug!("Mock behaviour: failing a {} ({:?})", descr, value);
        Err(RemoteError::Other(format!("Mocked behaviour requires this {} to fail this time. ({:?})", descr, value)))
    } else {
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    }
}


#[derive(Clone, Debug)]
pub struct MockCalendar {
    pub name: String,
    pub components: SupportedComponents,
    /// The iCalendar resources, by task uid
    pub tasks: BTreeMap<String, String>,
}

/// A local edit that happens while a push request is in flight
#[derive(Clone, Debug)]
pub struct LocalEdit {
    pub store: Arc<TaskStore>,
    pub list_uid: String,
    pub uid: String,
    pub changes: Vec<TaskChange>,
}

/// A server that lives in memory, and records every write it receives
#[derive(Default, Debug)]
pub struct MockRemote {
    pub calendars: BTreeMap<String, MockCalendar>,
    pub behaviour: MockBehaviour,
    /// Every write request, as `"<operation> <calendar id>[/<task uid>]"`
    pub writes: Vec<String>,
    /// Applied to the local store during the next add or update of a task
    pub edit_during_push: Option<LocalEdit>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calendar(mut self, id: &str, name: &str) -> Self {
        self.insert_calendar(id, name, SupportedComponents::TODO | SupportedComponents::EVENT);
        self
    }

    pub fn insert_calendar(&mut self, id: &str, name: &str, components: SupportedComponents) {
        self.calendars.insert(id.to_string(), MockCalendar {
            name: name.to_string(),
            components,
            tasks: BTreeMap::new(),
        });
    }

    /// Put a task on the server, as another client would do
    pub fn insert_task(&mut self, calendar_id: &str, uid: &str, text: &str, parent: &str) {
        let task = TaskData {
            list_uid: calendar_id.to_string(),
            uid: uid.to_string(),
            text: text.to_string(),
            parent: parent.to_string(),
            synced: true,
            ..TaskData::default()
        };
        self.insert_raw(calendar_id, uid, &ical::build_from(&task));
    }

    /// Put an iCalendar resource on the server, as another client would do
    pub fn insert_raw(&mut self, calendar_id: &str, uid: &str, content: &str) {
        self.calendars.get_mut(calendar_id)
            .expect("unknown mock calendar")
            .tasks.insert(uid.to_string(), content.to_string());
    }

    pub fn raw(&self, calendar_id: &str, uid: &str) -> Option<&str> {
        self.calendars.get(calendar_id)?.tasks.get(uid).map(String::as_str)
    }

    /// A task, as a client would read it from the server
    pub fn task(&self, calendar_id: &str, uid: &str) -> Option<TaskData> {
        let content = self.raw(calendar_id, uid)?;
        ical::parse(content, calendar_id).unwrap().into_iter().next()
    }

    /// Change a task on the server, as another client would do
    pub fn edit_task<F: FnOnce(&mut TaskData)>(&mut self, calendar_id: &str, uid: &str, edit: F) {
        let mut task = self.task(calendar_id, uid).expect("unknown mock task");
        edit(&mut task);
        let original = self.raw(calendar_id, uid).unwrap_or_default().to_string();
        self.insert_raw(calendar_id, uid, &ical::build_from_existing(&task, &original));
    }

    pub fn task_uids(&self, calendar_id: &str) -> Vec<String> {
        self.calendars.get(calendar_id)
            .map(|cal| cal.tasks.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count_writes(&self, operation: &str) -> usize {
        self.writes.iter()
            .filter(|w| w.split(' ').next() == Some(operation))
            .count()
    }

    fn calendar_mut(&mut self, id: &str) -> Result<&mut MockCalendar, RemoteError> {
        self.calendars.get_mut(id).ok_or_else(|| RemoteError::CalendarNotFound(id.to_string()))
    }

    fn apply_local_edit(&mut self) {
        if let Some(edit) = self.edit_during_push.take() {
            edit.store.update_props(&edit.list_uid, &edit.uid, &edit.changes).unwrap();
        }
    }
}

#[async_trait]
impl RemoteSource for MockRemote {
    async fn get_calendars(&mut self) -> Result<Vec<RemoteCalendar>, RemoteError> {
        self.behaviour.can_get_calendars()?;
        Ok(self.calendars.iter()
            .map(|(id, cal)| {
                let url = Url::parse(&format!("https://mock.example.com/dav/{}/", id)).unwrap();
                RemoteCalendar::new(id.clone(), cal.name.clone(), url, cal.components)
            })
            .collect())
    }

    async fn create_calendar(&mut self, id: &str, name: &str) -> Result<(), RemoteError> {
        self.behaviour.can_create_calendar()?;
        if self.calendars.contains_key(id) {
            return Err(RemoteError::Other(format!("calendar {} already exists", id)));
        }
        self.writes.push(format!("create_calendar {}", id));
        self.insert_calendar(id, name, SupportedComponents::TODO);
        Ok(())
    }

    async fn rename_calendar(&mut self, id: &str, name: &str) -> Result<(), RemoteError> {
        self.writes.push(format!("rename_calendar {}", id));
        self.calendar_mut(id)?.name = name.to_string();
        Ok(())
    }

    async fn delete_calendar(&mut self, id: &str) -> Result<(), RemoteError> {
        self.behaviour.can_delete_calendar()?;
        self.writes.push(format!("delete_calendar {}", id));
        self.calendars.remove(id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::CalendarNotFound(id.to_string()))
    }

    async fn get_tasks(&mut self, calendar_id: &str) -> Result<Vec<TaskData>, RemoteError> {
        self.behaviour.can_get_tasks()?;
        let mut tasks = Vec::new();
        for content in self.calendar_mut(calendar_id)?.tasks.values() {
            tasks.extend(ical::parse(content, calendar_id)?);
        }
        Ok(tasks)
    }

    async fn add_task(&mut self, calendar_id: &str, task: &TaskData) -> Result<(), RemoteError> {
        self.behaviour.can_add_task()?;
        self.writes.push(format!("add_task {}/{}", calendar_id, task.uid));
        self.apply_local_edit();
        let calendar = self.calendar_mut(calendar_id)?;
        if calendar.tasks.contains_key(&task.uid) {
            return Err(RemoteError::Other(format!("task {} already exists", task.uid)));
        }
        calendar.tasks.insert(task.uid.clone(), ical::build_from(task));
        Ok(())
    }

    async fn update_task(&mut self, calendar_id: &str, task: &TaskData) -> Result<(), RemoteError> {
        self.behaviour.can_update_task()?;
        self.writes.push(format!("update_task {}/{}", calendar_id, task.uid));
        self.apply_local_edit();
        let calendar = self.calendar_mut(calendar_id)?;
        let content = match calendar.tasks.get(&task.uid) {
            Some(original) => ical::build_from_existing(task, original),
            None => ical::build_from(task),
        };
        calendar.tasks.insert(task.uid.clone(), content);
        Ok(())
    }

    async fn delete_task(&mut self, calendar_id: &str, uid: &str) -> Result<(), RemoteError> {
        self.behaviour.can_delete_task()?;
        self.writes.push(format!("delete_task {}/{}", calendar_id, uid));
        self.calendar_mut(calendar_id)?.tasks.remove(uid);
        Ok(())
    }
}


pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn new_store() -> Arc<TaskStore> {
    Arc::new(TaskStore::open_in_memory().unwrap())
}

pub fn provider(store: &Arc<TaskStore>, remote: MockRemote) -> Provider<MockRemote> {
    provider_with_flavor(store, remote, Box::new(GenericCalDav))
}

pub fn provider_with_flavor(store: &Arc<TaskStore>, remote: MockRemote, flavor: Box<dyn ServerFlavor>) -> Provider<MockRemote> {
    Provider::new(Arc::clone(store), remote, flavor)
}

/// Add a top-level (or child) task to a local list, and return its uid
pub fn add_local_task(store: &TaskStore, list_uid: &str, text: &str, parent: &str) -> String {
    let mut task = TaskData::new(list_uid, text);
    task.parent = parent.to_string();
    store.add_task(&task, false).unwrap()
}

pub fn local_texts(store: &TaskStore, list_uid: &str) -> Vec<String> {
    let mut texts: Vec<String> = store.get_tasks(Some(list_uid), None).unwrap()
        .into_iter()
        .filter(|t| !t.deleted)
        .map(|t| t.text)
        .collect();
    texts.sort();
    texts
}

pub fn remote_texts(remote: &MockRemote, calendar_id: &str) -> Vec<String> {
    let mut texts: Vec<String> = remote.task_uids(calendar_id)
        .iter()
        .filter_map(|uid| remote.task(calendar_id, uid))
        .map(|t| t.text)
        .collect();
    texts.sort();
    texts
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mock_behaviour() {
        let mut ok = MockBehaviour::new();
        assert!(ok.can_get_calendars().is_ok());
        assert!(ok.can_get_calendars().is_ok());
        assert!(ok.can_get_calendars().is_ok());

        let mut now = MockBehaviour::fail_now(2);
        assert!(now.can_get_calendars().is_err());
        assert!(now.can_create_calendar().is_err());
        assert!(now.can_create_calendar().is_err());
        assert!(now.can_get_calendars().is_err());
        assert!(now.can_get_calendars().is_ok());
        assert!(now.can_create_calendar().is_ok());

        let mut custom = MockBehaviour{
            add_task_behaviour: (1,2),
            ..MockBehaviour::default()
        };
        assert!(custom.can_add_task().is_ok());
        assert!(custom.can_add_task().is_err());
        assert!(custom.can_add_task().is_err());
        assert!(custom.can_add_task().is_ok());

        custom.add_task_behaviour = (0, 1);
        custom.suspend();
        assert!(custom.can_add_task().is_ok());
        custom.resume();
        assert!(custom.can_add_task().is_err());
    }
}
