//! Background syncs through the orchestrator

mod common;

use std::sync::Arc;

use errands_sync::config::ProviderKind;
use errands_sync::error::RemoteError;
use errands_sync::orchestrator::SyncTarget;
use errands_sync::Orchestrator;

use common::*;


#[tokio::test]
async fn test_cleanup_when_sync_is_disabled() {
    init_logs();

    let store = new_store();
    let kept = store.add_list("Kept", None, false).unwrap();
    add_local_task(&store, &kept, "Stay", "");
    let gone = store.add_list("Gone", None, false).unwrap();
    add_local_task(&store, &gone, "Leave", "");
    store.delete_list(&gone).unwrap();

    let orchestrator = Orchestrator::spawn(Arc::clone(&store), None);
    orchestrator.sync();
    let state = orchestrator.wait_for_cycles(1).await;
    assert!(!state.syncing);

    let lists = store.get_lists().unwrap();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].uid, kept);
    assert_eq!(local_texts(&store, &kept), vec!["Stay"]);
    assert!(store.get_tasks(Some(&gone), None).unwrap().is_empty());
}

#[tokio::test]
async fn test_tombstones_are_reaped_after_a_sync() {
    init_logs();

    let store = new_store();
    let mut remote = MockRemote::new().with_calendar("work", "Work");
    remote.insert_task("work", "T1", "Report", "");
    remote.insert_task("work", "T2", "Slides", "");
    let target: Box<dyn SyncTarget> = Box::new(provider(&store, remote));

    let orchestrator = Orchestrator::spawn(Arc::clone(&store), Some(target));
    orchestrator.sync();
    orchestrator.wait_for_cycles(1).await;
    assert_eq!(local_texts(&store, "work"), vec!["Report", "Slides"]);

    store.trash_task("work", "T1").unwrap();
    store.empty_trash(None).unwrap();
    orchestrator.sync();
    orchestrator.wait_for_cycles(2).await;

    // Deleted on the server, then reaped, and not downloaded again
    let uids: Vec<String> = store.get_tasks(Some("work"), None).unwrap().into_iter().map(|t| t.uid).collect();
    assert_eq!(uids, vec!["T2"]);

    orchestrator.sync();
    orchestrator.wait_for_cycles(3).await;
    assert_eq!(local_texts(&store, "work"), vec!["Slides"]);
}

#[tokio::test]
async fn test_connection_check() {
    init_logs();

    let store = new_store();
    let (can_sync, error) = Orchestrator::test_connection(Arc::clone(&store), None, ProviderKind::Disabled).await;
    assert!(!can_sync);
    assert!(error.is_none());

    let (can_sync, error) = Orchestrator::test_connection(store, None, ProviderKind::Vikunja).await;
    assert!(!can_sync);
    assert!(matches!(error, Some(RemoteError::MissingCredentials)));
}
