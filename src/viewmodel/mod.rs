//! Screen controllers.
//!
//! Each controller owns the state and logic of one screen and reports
//! navigation and messages through its own single-consumer event queue:
//! - `TasksViewModel`: the task list (search, filters, check, swipe, undo)
//! - `AddEditTaskViewModel`: creating or editing one task
//! - `DeleteAllCompletedViewModel`: the delete-completed confirmation

mod add_edit;
mod confirm;
mod tasks;

pub use add_edit::AddEditTaskViewModel;
pub use confirm::DeleteAllCompletedViewModel;
pub use tasks::TasksViewModel;

use parking_lot::Mutex;

use crate::events::{self, EventReceiver, EventSender};

/// Sender half plus a receiver that can be claimed exactly once.
#[derive(Debug)]
pub(crate) struct EventOutlet<E> {
    sender: EventSender<E>,
    receiver: Mutex<Option<EventReceiver<E>>>,
}

impl<E: std::fmt::Debug> EventOutlet<E> {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = events::channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    pub(crate) fn send(&self, event: E) {
        self.sender.send(event);
    }

    pub(crate) fn take(&self) -> Option<EventReceiver<E>> {
        self.receiver.lock().take()
    }
}
