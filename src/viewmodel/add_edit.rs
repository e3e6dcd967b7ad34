use anyhow::{Context, Result};

use super::EventOutlet;
use crate::events::{EditResult, EditTaskEvent, EventReceiver};
use crate::store::TaskStore;
use crate::task::{validate_task_name, Task};

/// Logic behind the add/edit screen.
///
/// Opened with `Some(task)` it edits that task; with `None` it creates one.
#[derive(Debug)]
pub struct AddEditTaskViewModel {
    store: TaskStore,
    task: Option<Task>,
    task_name: String,
    task_importance: bool,
    events: EventOutlet<EditTaskEvent>,
}

impl AddEditTaskViewModel {
    pub fn new(store: TaskStore, task: Option<Task>) -> Self {
        let task_name = task.as_ref().map(|t| t.name.clone()).unwrap_or_default();
        let task_importance = task.as_ref().map(|t| t.important).unwrap_or(false);
        Self {
            store,
            task,
            task_name,
            task_importance,
            events: EventOutlet::new(),
        }
    }

    pub fn take_events(&self) -> Option<EventReceiver<EditTaskEvent>> {
        self.events.take()
    }

    /// The task being edited, if any.
    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn set_task_name(&mut self, name: impl Into<String>) {
        self.task_name = name.into();
    }

    pub fn task_importance(&self) -> bool {
        self.task_importance
    }

    pub fn set_task_importance(&mut self, important: bool) {
        self.task_importance = important;
    }

    /// Validate, then write the task and navigate back. A blank name only
    /// produces an error message; nothing is written.
    pub async fn on_save_click(&self) -> Result<()> {
        if let Err(e) = validate_task_name(&self.task_name) {
            self.events
                .send(EditTaskEvent::ShowInvalidInputMessage(e.to_string()));
            return Ok(());
        }

        let result = match &self.task {
            Some(task) => {
                let updated = task.with_name_and_importance(self.task_name.clone(), self.task_importance);
                self.store
                    .update(updated)
                    .await
                    .with_context(|| format!("Failed to update task {}", task.id))?;
                EditResult::Edited
            }
            None => {
                let created = Task::new(self.task_name.clone()).important(self.task_importance);
                self.store
                    .insert(created)
                    .await
                    .context("Failed to create task")?;
                EditResult::Added
            }
        };

        self.events
            .send(EditTaskEvent::NavigateBackWithResult(result));
        Ok(())
    }
}
