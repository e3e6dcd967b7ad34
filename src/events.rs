//! One-shot screen events.
//!
//! Events travel through a single-consumer queue: each event sent is received
//! at most once, by whoever holds the one [`EventReceiver`].

use tokio::sync::mpsc;

use crate::task::Task;

/// Outcome reported by the add/edit screen when it closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditResult {
    Added,
    Edited,
}

/// Events emitted by the task list screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TasksEvent {
    NavigateToAddTask,
    NavigateToEditTask(Task),
    /// A task was deleted; offer to restore it.
    ShowUndoDeleteMessage(Task),
    ShowTaskSavedConfirmation(String),
    ShowDeleteAllCompletedConfirmation,
}

/// Events emitted by the add/edit screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTaskEvent {
    ShowInvalidInputMessage(String),
    NavigateBackWithResult(EditResult),
}

/// Events emitted by the delete-completed confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationEvent {
    NavigateBack,
}

/// Create a queue. The sender may be cloned; the receiver may not.
pub fn channel<E>() -> (EventSender<E>, EventReceiver<E>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

#[derive(Debug)]
pub struct EventSender<E> {
    tx: mpsc::UnboundedSender<E>,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E: std::fmt::Debug> EventSender<E> {
    /// Queue an event without waiting. Returns false if nobody can receive it.
    pub fn send(&self, event: E) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                tracing::debug!(?event, "event dropped: receiver closed");
                false
            }
        }
    }
}

#[derive(Debug)]
pub struct EventReceiver<E> {
    rx: mpsc::UnboundedReceiver<E>,
}

impl<E> EventReceiver<E> {
    /// Wait for the next event; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Take an already queued event, if any.
    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }
}
