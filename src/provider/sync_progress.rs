//! Utilities to track the progression of a sync

use std::fmt::{Display, Error, Formatter};

use tokio::sync::watch;

/// What a sync is currently doing, as published to the UI
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    NotStarted,
    /// Lists are being reconciled, no task has been handled yet
    Started,
    /// Tasks of a list are being reconciled
    InProgress{ list: String, details: String },
    Finished{ success: bool },
}

impl Display for SyncEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            SyncEvent::NotStarted => write!(f, "Not started"),
            SyncEvent::Started => write!(f, "Syncing lists..."),
            SyncEvent::InProgress{list, details} => write!(f, "[{}] {}...", list, details),
            SyncEvent::Finished{ success: true } => write!(f, "Sync successfully finished"),
            SyncEvent::Finished{ success: false } => write!(f, "Sync finished with errors"),
        }
    }
}

impl Default for SyncEvent {
    fn default() -> Self {
        Self::NotStarted
    }
}


pub type FeedbackSender = watch::Sender<SyncEvent>;
pub type FeedbackReceiver = watch::Receiver<SyncEvent>;

/// Create a channel the UI can watch to follow a sync
pub fn feedback_channel() -> (FeedbackSender, FeedbackReceiver) {
    watch::channel(SyncEvent::default())
}


/// Counts the errors and the changes of a sync, and logs its steps.
///
/// Once [`Self::enter_list`] has been called, log lines are prefixed with the name of that list.
/// Warnings and errors both count as failures: a sync with any of them is not a success, and the items involved will be retried next time.
#[derive(Default)]
pub struct SyncProgress {
    n_errors: u32,
    n_changes: u32,
    current_list: Option<String>,
    feedback_channel: Option<FeedbackSender>,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_feedback_channel(channel: FeedbackSender) -> Self {
        Self { feedback_channel: Some(channel), ..Self::default() }
    }

    pub fn is_success(&self) -> bool {
        self.n_errors == 0
    }

    pub fn n_errors(&self) -> u32 {
        self.n_errors
    }

    /// How many lists or tasks have been written to either side so far
    pub fn n_changes(&self) -> u32 {
        self.n_changes
    }

    pub fn count_change(&mut self) {
        self.n_changes += 1;
    }

    /// Start handling the tasks of a list
    pub fn enter_list(&mut self, name: &str) {
        self.current_list = Some(name.to_string());
        self.step("started");
    }

    /// Publish what is happening to the current list
    pub fn step(&mut self, details: &str) {
        let list = self.current_list.clone().unwrap_or_default();
        self.feedback(SyncEvent::InProgress{ list, details: details.to_string() });
    }

    fn with_context(&self, text: &str) -> String {
        match &self.current_list {
            Some(list) => format!("[{}] {}", list, text),
            None => text.to_string(),
        }
    }

    pub fn error(&mut self, text: &str) {
        log::error!("{}", self.with_context(text));
        self.n_errors += 1;
    }

    pub fn warn(&mut self, text: &str) {
        log::warn!("{}", self.with_context(text));
        self.n_errors += 1;
    }

    pub fn info(&mut self, text: &str) {
        log::info!("{}", self.with_context(text));
    }

    pub fn debug(&mut self, text: &str) {
        log::debug!("{}", self.with_context(text));
    }

    pub fn trace(&mut self, text: &str) {
        log::trace!("{}", self.with_context(text));
    }

    /// Leave the current list and publish the outcome
    pub fn finish(&mut self) {
        self.current_list = None;
        let success = self.is_success();
        self.feedback(SyncEvent::Finished{ success });
    }

    pub fn feedback(&mut self, event: SyncEvent) {
        if let Some(sender) = self.feedback_channel.as_ref() {
            // The receiver may be gone already
            let _ = sender.send(event);
        }
    }
}
