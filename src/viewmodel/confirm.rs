use anyhow::{Context, Result};

use super::EventOutlet;
use crate::events::{ConfirmationEvent, EventReceiver};
use crate::store::TaskStore;

/// Logic behind the "delete all completed tasks?" confirmation.
#[derive(Debug)]
pub struct DeleteAllCompletedViewModel {
    store: TaskStore,
    events: EventOutlet<ConfirmationEvent>,
}

impl DeleteAllCompletedViewModel {
    pub fn new(store: TaskStore) -> Self {
        Self {
            store,
            events: EventOutlet::new(),
        }
    }

    pub fn take_events(&self) -> Option<EventReceiver<ConfirmationEvent>> {
        self.events.take()
    }

    /// Delete every completed task, then close.
    ///
    /// The delete runs as its own task, so it still completes if the caller
    /// stops waiting (the dialog being dismissed, for instance).
    pub async fn on_confirm_click(&self) -> Result<()> {
        let store = self.store.clone();
        tokio::spawn(async move { store.delete_completed_tasks().await })
            .await
            .context("Delete task was cancelled")?
            .context("Failed to delete completed tasks")?;

        self.events.send(ConfirmationEvent::NavigateBack);
        Ok(())
    }
}
