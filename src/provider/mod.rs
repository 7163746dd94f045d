//! This modules syncs the local task store with a remote source
//!
//! A sync runs in two phases. Lists are reconciled with the remote calendars first, then the tasks of every calendar are reconciled with their local counterparts.
//! Every local row carries a `synced` flag, that tells which side wins in case both sides differ:
//! * a synced row has not been modified locally since the last sync, so the remote version wins
//! * an unsynced row has been modified locally, so it is pushed to the remote

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::calendar::RemoteCalendar;
use crate::client::Client;
use crate::config::{Credentials, ProviderKind};
use crate::error::{RemoteError, StoreError};
use crate::store::TaskStore;
use crate::task::{TaskData, TaskListData};
use crate::traits::RemoteSource;

pub mod flavor;
use flavor::{GenericCalDav, ServerFlavor};

pub mod sync_progress;
use sync_progress::SyncProgress;
use sync_progress::{FeedbackSender, SyncEvent};


/// A provider that talks to an actual CalDAV server
pub type CalDavProvider = Provider<Client>;

/// Syncs a [`TaskStore`] with a [`RemoteSource`].
///
/// The remote source is usually a [`Client`], but integration tests use a mocked one.
pub struct Provider<R: RemoteSource> {
    store: Arc<TaskStore>,
    remote: Option<R>,
    flavor: Box<dyn ServerFlavor>,
    /// Why `remote` could not be set up
    error: Option<RemoteError>,
}

impl Provider<Client> {
    /// Create a provider that is connected to the server described by `credentials`.
    ///
    /// This never fails: in case the server cannot be reached, [`Provider::can_sync`] is false and [`Provider::error`] tells why.
    /// In `testing` mode (i.e. when the user is checking their settings), failures are not logged as errors.
    pub async fn connect(store: Arc<TaskStore>, credentials: Option<Credentials>, kind: ProviderKind, testing: bool) -> Self {
        let flavor = match kind.flavor() {
            None => {
                log::debug!("Sync is disabled");
                return Self::disconnected(store, Box::new(GenericCalDav), None);
            },
            Some(flavor) => flavor,
        };
        let credentials = match credentials {
            None => {
                log::debug!("No credentials for {:?} sync", kind);
                return Self::disconnected(store, flavor, Some(RemoteError::MissingCredentials));
            },
            Some(credentials) => credentials,
        };

        match Client::connect(&credentials, flavor.as_ref()).await {
            Ok(client) => {
                log::info!("Connected to {}", client.url());
                Self::new(store, client, flavor)
            },
            Err(err) => {
                if testing {
                    log::debug!("Unable to connect to {}: {}", credentials.url, err);
                } else {
                    log::error!("Unable to connect to {}: {}", credentials.url, err);
                }
                Self::disconnected(store, flavor, Some(err))
            },
        }
    }
}

impl<R: RemoteSource> Provider<R> {
    /// Create a provider from an already connected remote source
    pub fn new(store: Arc<TaskStore>, remote: R, flavor: Box<dyn ServerFlavor>) -> Self {
        Self { store, remote: Some(remote), flavor, error: None }
    }

    fn disconnected(store: Arc<TaskStore>, flavor: Box<dyn ServerFlavor>, error: Option<RemoteError>) -> Self {
        Self { store, remote: None, flavor, error }
    }

    /// Returns the local store
    pub fn store(&self) -> &Arc<TaskStore> { &self.store }

    /// Returns the remote source, if it is connected.
    ///
    /// Apart from tests, there are very few (if any) reasons to access `remote` directly.
    pub fn remote(&self) -> Option<&R> { self.remote.as_ref() }
    pub fn remote_mut(&mut self) -> Option<&mut R> { self.remote.as_mut() }

    /// Whether a remote source is available
    pub fn can_sync(&self) -> bool {
        self.remote.is_some()
    }

    /// Why this provider cannot sync, if it is known
    pub fn error(&self) -> Option<&RemoteError> {
        self.error.as_ref()
    }

    /// Consume this provider, only keeping why it could not connect
    pub fn into_error(self) -> Option<RemoteError> {
        self.error
    }

    /// Performs a synchronisation between the store and the remote, and provide feeedback to the user about the progress.
    ///
    /// It returns whether the sync was totally successful (details about errors are logged using the `log::*` macros).
    /// In case errors happened, the sync might have been partially executed, but failed items keep their `synced=false` flag.
    /// Simply run this function again, it will re-start a sync, picking up where it failed.
    pub async fn sync_with_feedback(&mut self, feedback_sender: FeedbackSender) -> bool {
        let mut progress = SyncProgress::new_with_feedback_channel(feedback_sender);
        self.run_sync(&mut progress).await
    }

    /// Performs a synchronisation between the store and the remote, without giving any feedback.
    ///
    /// See [`Self::sync_with_feedback`]
    pub async fn sync(&mut self) -> bool {
        let mut progress = SyncProgress::new();
        self.run_sync(&mut progress).await
    }

    async fn run_sync(&mut self, progress: &mut SyncProgress) -> bool {
        if let Err(err) = self.run_sync_inner(progress).await {
            progress.error(&format!("Sync terminated because of an error: {}", err));
        }
        progress.finish();
        progress.is_success()
    }

    async fn run_sync_inner(&mut self, progress: &mut SyncProgress) -> Result<(), RemoteError> {
        let remote = match self.remote.as_mut() {
            None => return Err(RemoteError::Other("no server is connected".to_string())),
            Some(remote) => remote,
        };

        progress.info("Starting a sync.");
        progress.feedback(SyncEvent::Started);

        sync_lists(&self.store, remote, self.flavor.as_ref(), progress).await?;

        // Phase A may have created or deleted calendars
        let calendars = task_calendars(remote).await?;
        for calendar in calendars {
            let list = match self.store.get_list(&calendar.id) {
                Err(StoreError::ListNotFound(_)) => {
                    progress.debug(&format!("Calendar {} has no local list yet, skipping it this time", calendar.id));
                    continue;
                },
                Err(err) => return Err(err.into()),
                Ok(list) => list,
            };
            if list.deleted {
                continue;
            }

            if let Err(err) = sync_tasks(&self.store, remote, &calendar, progress).await {
                progress.warn(&format!("Unable to sync tasks of {}: {}, skipping this time.", calendar.name, err));
            }
        }

        progress.info(&format!("Sync ended ({} changes)", progress.n_changes()));
        Ok(())
    }
}


async fn task_calendars<R: RemoteSource>(remote: &mut R) -> Result<Vec<RemoteCalendar>, RemoteError> {
    let calendars = remote.get_calendars().await?;
    Ok(calendars.into_iter().filter(RemoteCalendar::supports_tasks).collect())
}

/// Reconcile local lists with remote calendars
async fn sync_lists<R: RemoteSource>(store: &TaskStore, remote: &mut R, flavor: &dyn ServerFlavor, progress: &mut SyncProgress) -> Result<(), RemoteError> {
    progress.debug("Syncing lists...");
    let calendars = task_calendars(remote).await?;
    let remote_by_id: HashMap<&str, &RemoteCalendar> = calendars.iter()
        .map(|cal| (cal.id.as_str(), cal))
        .collect();

    let local_lists = store.get_lists()?;
    let local_uids: HashSet<String> = local_lists.iter().map(|l| l.uid.clone()).collect();
    let mut handled = HashSet::new();

    for list in local_lists {
        let counterpart = remote_by_id.get(list.uid.as_str()).copied();
        if counterpart.is_some() {
            handled.insert(list.uid.clone());
        }
        let result = match counterpart {
            Some(_) if list.deleted => push_list_deletion(store, remote, &list, progress).await,
            None if list.deleted => {
                progress.trace(&format!("List {} is deleted on both sides", list.uid));
                Ok(())
            },
            None if list.synced => {
                progress.debug(&format!("List {} has been deleted from the server", list.name));
                progress.count_change();
                store.purge_list(&list.uid).map_err(RemoteError::from)
            },
            None => {
                match push_list_creation(store, remote, flavor, &list, &remote_by_id, &local_uids, progress).await {
                    Ok(Some(id)) => { handled.insert(id); Ok(()) },
                    Ok(None) => Ok(()),
                    Err(err) => Err(err),
                }
            },
            Some(calendar) => reconcile_list_name(store, remote, &list, calendar, progress).await,
        };

        if let Err(err) = result {
            progress.warn(&format!("Unable to sync list {} ({}): {}", list.name, list.uid, err));
        }
    }

    // Calendars that were created on the server
    for calendar in &calendars {
        if handled.contains(&calendar.id) || local_uids.contains(&calendar.id) {
            continue;
        }
        progress.debug(&format!("Calendar {} is a remote addition", calendar.name));
        progress.count_change();
        if let Err(err) = store.add_list(&calendar.name, Some(&calendar.id), true) {
            progress.warn(&format!("Unable to add list {} locally: {}", calendar.name, err));
        }
    }

    Ok(())
}

async fn push_list_deletion<R: RemoteSource>(store: &TaskStore, remote: &mut R, list: &TaskListData, progress: &mut SyncProgress) -> Result<(), RemoteError> {
    progress.debug(&format!("> Pushing deletion of list {} to the server", list.name));
    progress.count_change();
    remote.delete_calendar(&list.uid).await?;
    store.purge_list(&list.uid)?;
    Ok(())
}

/// Create the remote calendar of a local list, and return the id it has been given
async fn push_list_creation<R: RemoteSource>(
    store: &TaskStore,
    remote: &mut R,
    flavor: &dyn ServerFlavor,
    list: &TaskListData,
    remote_by_id: &HashMap<&str, &RemoteCalendar>,
    local_uids: &HashSet<String>,
    progress: &mut SyncProgress,
) -> Result<Option<String>, RemoteError> {
    let id = flavor.remote_calendar_id_for(list);
    if id != list.uid && local_uids.contains(&id) {
        progress.warn(&format!("Cannot push list {}: another local list already uses id {}", list.name, id));
        return Ok(None);
    }

    if remote_by_id.contains_key(id.as_str()) {
        progress.debug(&format!("> Calendar {} already exists on the server, adopting it for list {}", id, list.name));
    } else {
        progress.debug(&format!("> Pushing list {} to the server", list.name));
        remote.create_calendar(&id, &list.name).await?;
    }
    progress.count_change();

    if id != list.uid {
        progress.debug(&format!("List {} is now known as {}", list.uid, id));
        store.change_list_uid(&list.uid, &id)?;
    }
    store.update_list(&id, None, Some(true))?;
    Ok(Some(id))
}

async fn reconcile_list_name<R: RemoteSource>(store: &TaskStore, remote: &mut R, list: &TaskListData, calendar: &RemoteCalendar, progress: &mut SyncProgress) -> Result<(), RemoteError> {
    if list.name != calendar.name {
        progress.count_change();
        if list.synced {
            progress.debug(&format!("List {} has been renamed to {} on the server", list.name, calendar.name));
            store.update_list(&list.uid, Some(&calendar.name), None)?;
        } else {
            progress.debug(&format!("> Pushing new name {} of list {} to the server", list.name, list.uid));
            remote.rename_calendar(&list.uid, &list.name).await?;
            store.update_list(&list.uid, None, Some(true))?;
        }
    } else if !list.synced {
        store.update_list(&list.uid, None, Some(true))?;
    }
    Ok(())
}


/// Reconcile the tasks of a calendar with the tasks of its local list
async fn sync_tasks<R: RemoteSource>(store: &TaskStore, remote: &mut R, calendar: &RemoteCalendar, progress: &mut SyncProgress) -> Result<(), RemoteError> {
    let cal_id = calendar.id.as_str();
    progress.enter_list(&calendar.name);
    progress.info("Syncing tasks");

    let mut remote_tasks = remote.get_tasks(cal_id).await?;
    progress.step(&format!("{} remote tasks", remote_tasks.len()));

    heal_orphans(remote, cal_id, &mut remote_tasks, progress).await;

    let remote_by_uid: HashMap<&str, &TaskData> = remote_tasks.iter()
        .map(|task| (task.uid.as_str(), task))
        .collect();
    let local_tasks = store.get_tasks(Some(cal_id), None)?;
    let local_uids: HashSet<&str> = local_tasks.iter().map(|t| t.uid.as_str()).collect();

    for local in &local_tasks {
        let counterpart = remote_by_uid.get(local.uid.as_str()).copied();
        progress.trace(&format!("***** Considering local task {}...", local.uid));

        let result = match counterpart {
            Some(_) if local.deleted => {
                progress.debug(&format!("> Pushing deletion of {} to the server", local.uid));
                progress.count_change();
                remote.delete_task(cal_id, &local.uid).await
            },
            None if local.deleted => Ok(()),
            Some(remote_task) if local.synced => {
                let changes = local.remote_changes_towards(remote_task);
                if changes.is_empty() {
                    Ok(())
                } else {
                    progress.debug(&format!("*   {} is a remote change ({} fields)", local.uid, changes.len()));
                    progress.count_change();
                    match store.apply_remote_changes(cal_id, &local.uid, &changes) {
                        Ok(false) => {
                            progress.debug(&format!("{} has been edited locally meanwhile, it will be pushed next time", local.uid));
                            Ok(())
                        },
                        Ok(true) => Ok(()),
                        Err(err) => Err(err.into()),
                    }
                }
            },
            None if !local.synced => {
                progress.debug(&format!("> Pushing local addition {} to the server", local.uid));
                progress.count_change();
                match remote.add_task(cal_id, local).await {
                    Err(err) => Err(err),
                    Ok(()) => mark_synced(store, local, progress),
                }
            },
            Some(_) => {
                progress.debug(&format!("> Pushing local change {} to the server", local.uid));
                progress.count_change();
                match remote.update_task(cal_id, local).await {
                    Err(err) => Err(err),
                    Ok(()) => mark_synced(store, local, progress),
                }
            },
            None => {
                progress.debug(&format!("#   {} is a deletion from the server", local.uid));
                progress.count_change();
                match store.delete_synced_task(cal_id, &local.uid) {
                    Ok(false) => {
                        progress.debug(&format!("{} has been edited locally meanwhile, it will be pushed again", local.uid));
                        Ok(())
                    },
                    Ok(true) => Ok(()),
                    Err(err) => Err(err.into()),
                }
            },
        };

        if let Err(err) = result {
            progress.warn(&format!("Unable to sync task {} ({}): {}", local.text, local.uid, err));
        }
    }

    // Tasks that were created on the server. Tombstones count as local tasks, so that local deletions are not undone
    for remote_task in &remote_tasks {
        if local_uids.contains(remote_task.uid.as_str()) {
            continue;
        }
        progress.debug(&format!("*   {} is a remote addition", remote_task.uid));
        progress.count_change();
        let mut task = remote_task.clone();
        task.list_uid = cal_id.to_string();
        task.synced = true;
        if let Err(err) = store.add_task(&task, false) {
            progress.warn(&format!("Unable to add task {} locally: {}", task.uid, err));
        }
    }

    Ok(())
}

/// Flag a pushed task as synced, unless it has been edited while the request was in flight
fn mark_synced(store: &TaskStore, pushed: &TaskData, progress: &mut SyncProgress) -> Result<(), RemoteError> {
    if !store.mark_synced_if_unchanged(pushed)? {
        progress.debug(&format!("{} has changed during the sync, it stays unsynced", pushed.uid));
    }
    Ok(())
}

/// Detach remote tasks whose parent is not part of their calendar, both on the server and in `tasks`
async fn heal_orphans<R: RemoteSource>(remote: &mut R, cal_id: &str, tasks: &mut [TaskData], progress: &mut SyncProgress) {
    let uids: HashSet<String> = tasks.iter().map(|t| t.uid.clone()).collect();
    for task in tasks.iter_mut() {
        if task.parent.is_empty() || uids.contains(&task.parent) {
            continue;
        }
        progress.debug(&format!("Task {} has an unknown parent {}, making it a top-level task", task.uid, task.parent));
        task.parent.clear();
        progress.count_change();
        if let Err(err) = remote.update_task(cal_id, task).await {
            progress.warn(&format!("Unable to detach orphan task {}: {}", task.uid, err));
        }
    }
}
