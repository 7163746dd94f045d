//! Runs syncs in the background, one at a time
//!
//! Sync requests are queued to a single worker task. Requests that pile up while a sync is running are coalesced into one trailing sync,
//! and the store is cleaned of its tombstones after every cycle, whether a server is configured or not.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::config::{Credentials, ProviderKind};
use crate::error::RemoteError;
use crate::provider::Provider;
use crate::store::TaskStore;
use crate::traits::RemoteSource;

/// Something the orchestrator can sync with
#[async_trait]
pub trait SyncTarget: Send {
    fn can_sync(&self) -> bool;
    /// Run a full sync, and tell whether it succeeded
    async fn sync(&mut self) -> bool;
}

#[async_trait]
impl<R: RemoteSource + 'static> SyncTarget for Provider<R> {
    fn can_sync(&self) -> bool {
        Provider::can_sync(self)
    }

    async fn sync(&mut self) -> bool {
        Provider::sync(self).await
    }
}


/// What the orchestrator is doing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrchestratorState {
    pub syncing: bool,
    /// A sync has been requested while another one was running
    pub sync_again: bool,
    /// How many cycles have completed
    pub cycles: u64,
}

enum Command {
    Sync,
    SetTarget(Option<Box<dyn SyncTarget>>),
}

/// A handle to the background sync worker.
///
/// The worker stops once every handle has been dropped.
pub struct Orchestrator {
    commands: mpsc::UnboundedSender<Command>,
    state_sender: Arc<watch::Sender<OrchestratorState>>,
    state: watch::Receiver<OrchestratorState>,
}

impl Orchestrator {
    /// Start the worker. This must be called from within a tokio runtime.
    ///
    /// `target` is `None` when sync is disabled: cycles then only clean the store.
    pub fn spawn(store: Arc<TaskStore>, target: Option<Box<dyn SyncTarget>>) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state_sender, state) = watch::channel(OrchestratorState::default());
        let state_sender = Arc::new(state_sender);

        tokio::spawn(worker(store, target, receiver, Arc::clone(&state_sender)));
        Self { commands, state_sender, state }
    }

    /// Request a sync. This never blocks
    pub fn sync(&self) {
        if self.state.borrow().syncing {
            self.state_sender.send_modify(|state| state.sync_again = true);
        }
        if self.commands.send(Command::Sync).is_err() {
            log::error!("The sync worker has stopped, ignoring sync request");
        }
    }

    /// Replace what is synced with, e.g. after the sync settings have changed
    pub fn set_target(&self, target: Option<Box<dyn SyncTarget>>) {
        if self.commands.send(Command::SetTarget(target)).is_err() {
            log::error!("The sync worker has stopped, ignoring new sync target");
        }
    }

    pub fn state(&self) -> watch::Receiver<OrchestratorState> {
        self.state.clone()
    }

    /// Wait until at least `n` cycles have completed since the worker started
    pub async fn wait_for_cycles(&self, n: u64) -> OrchestratorState {
        let mut receiver = self.state.clone();
        loop {
            let state = *receiver.borrow_and_update();
            if state.cycles >= n {
                return state;
            }
            if receiver.changed().await.is_err() {
                return *receiver.borrow();
            }
        }
    }

    /// Check whether a server can be logged in with these settings, without syncing anything
    pub async fn test_connection(store: Arc<TaskStore>, credentials: Option<Credentials>, kind: ProviderKind) -> (bool, Option<RemoteError>) {
        let provider = Provider::connect(store, credentials, kind, true).await;
        let can_sync = provider.can_sync();
        (can_sync, provider.into_error())
    }
}


async fn worker(
    store: Arc<TaskStore>,
    mut target: Option<Box<dyn SyncTarget>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    state: Arc<watch::Sender<OrchestratorState>>,
) {
    while let Some(command) = commands.recv().await {
        let mut sync_requested = false;
        let mut pending = Some(command);
        while let Some(command) = pending {
            match command {
                Command::Sync => sync_requested = true,
                Command::SetTarget(new_target) => {
                    log::debug!("Sync target replaced (sync {})", if new_target.is_some() { "enabled" } else { "disabled" });
                    target = new_target;
                },
            }
            pending = commands.try_recv().ok();
        }

        if !sync_requested {
            continue;
        }

        state.send_modify(|s| {
            s.syncing = true;
            s.sync_again = false;
        });
        run_cycle(&store, target.as_mut()).await;
        state.send_modify(|s| {
            s.syncing = false;
            s.cycles += 1;
        });
    }
    log::debug!("Sync worker stopped");
}

async fn run_cycle(store: &TaskStore, target: Option<&mut Box<dyn SyncTarget>>) {
    match target {
        None => log::debug!("Sync is disabled, only cleaning up the task store"),
        Some(target) if !target.can_sync() => log::debug!("Cannot sync, only cleaning up the task store"),
        Some(target) => {
            if target.sync().await {
                log::info!("Sync successful");
            } else {
                log::warn!("Sync finished with errors");
            }
        },
    }

    if let Err(err) = store.clean_deleted() {
        log::error!("Unable to clean deleted items: {}", err);
    }
}
