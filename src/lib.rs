//! This crate is the storage and synchronisation engine of a to-do application.
//!
//! Task lists and tasks live in a local SQLite database, the [`TaskStore`](store::TaskStore), that the UI reads and writes directly.
//!
//! A [`Provider`](provider::Provider) syncs this store with a CalDAV server (generic CalDAV, Nextcloud or Vikunja), through the CalDAV client of the [`client`] module. \
//! Local changes are flagged as unsynced and pushed at the next sync, while remote changes overwrite the synced rows.
//!
//! Applications usually do not call the provider themselves, but request syncs from an [`Orchestrator`](orchestrator::Orchestrator),
//! that runs them one at a time in the background and cleans up deleted items afterwards.

pub mod error;
pub mod task;
pub use task::{TaskChange, TaskData, TaskListData};
pub mod store;
pub use store::{MoveMode, TaskStore};

pub mod traits;
pub mod calendar;
pub mod resource;
pub mod client;
pub mod provider;
pub use provider::Provider;
pub mod orchestrator;
pub use orchestrator::Orchestrator;

pub mod ical;
pub mod export;
pub mod config;
pub mod utils;
