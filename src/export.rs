//! Import and export task lists as `.ics` files

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::store::TaskStore;

/// Build an iCal file with every task of a list (tombstones excluded)
pub fn export_list(store: &TaskStore, list_uid: &str) -> Result<String, StoreError> {
    // Fails early if the list does not exist
    store.get_list(list_uid)?;
    let tasks: Vec<_> = store.get_tasks(Some(list_uid), None)?
        .into_iter()
        .filter(|task| !task.deleted)
        .collect();
    Ok(crate::ical::build_calendar(&tasks))
}

/// Export a list into `dir`, in a file named after the list. Returns the path of the file
pub fn export_list_to_dir<P: AsRef<Path>>(store: &TaskStore, list_uid: &str, dir: P) -> Result<PathBuf, StoreError> {
    let list = store.get_list(list_uid)?;
    let content = export_list(store, list_uid)?;

    let mut file_name = sanitize_filename::sanitize(&list.name);
    if file_name.is_empty() {
        file_name = list.uid.clone();
    }
    let path = dir.as_ref().join(format!("{}.ics", file_name));

    std::fs::create_dir_all(dir.as_ref())?;
    std::fs::write(&path, content)?;
    log::info!("Exported list {} to {:?}", list.name, path);
    Ok(path)
}

/// Create a new (unsynced) list named `name`, that contains every task of an iCal file. Returns the uid of the list
pub fn import_list(store: &TaskStore, name: &str, content: &str) -> Result<String, StoreError> {
    let tasks = crate::ical::parse(content, "")?;
    let list_uid = store.add_list(name, None, false)?;

    let mut seen = HashSet::new();
    for mut task in tasks {
        if !seen.insert(task.uid.clone()) {
            log::warn!("Task {} appears twice in the imported file, skipping the duplicate", task.uid);
            continue;
        }
        task.list_uid = list_uid.clone();
        task.synced = false;
        if let Err(err) = store.add_task(&task, false) {
            log::warn!("Unable to import task {}: {}", task.uid, err);
        }
    }
    Ok(list_uid)
}
