use anyhow::{Context, Result};
use tracing::debug;

use super::EventOutlet;
use crate::events::{EditResult, EventReceiver, TasksEvent};
use crate::pipeline::{QueryPipeline, TaskListStream};
use crate::preferences::SharedPreferencesStore;
use crate::store::TaskStore;
use crate::task::{SortOrder, Task};

/// Logic behind the task list screen.
#[derive(Debug)]
pub struct TasksViewModel {
    pipeline: QueryPipeline,
    events: EventOutlet<TasksEvent>,
}

impl TasksViewModel {
    pub fn new(store: TaskStore, preferences: SharedPreferencesStore) -> Self {
        Self {
            pipeline: QueryPipeline::new(store, preferences),
            events: EventOutlet::new(),
        }
    }

    /// Claim the event queue. Only the first caller gets it.
    pub fn take_events(&self) -> Option<EventReceiver<TasksEvent>> {
        self.events.take()
    }

    /// Live task list for the current search text and preferences.
    pub fn tasks(&self) -> TaskListStream {
        self.pipeline.tasks()
    }

    pub fn search_text(&self) -> String {
        self.pipeline.search_text()
    }

    pub fn on_search_text_changed(&self, text: &str) {
        self.pipeline.set_search_text(text);
    }

    pub async fn on_sort_order_selected(&self, sort_order: SortOrder) -> Result<()> {
        self.pipeline
            .preferences()
            .update_sort_order(sort_order)
            .await
            .context("Failed to save sort order")
    }

    pub async fn on_hide_completed_selected(&self, hide_completed: bool) -> Result<()> {
        self.pipeline
            .preferences()
            .update_hide_completed(hide_completed)
            .await
            .context("Failed to save hide-completed filter")
    }

    /// Current hide-completed setting, for showing the menu check state.
    pub fn hide_completed(&self) -> Result<bool> {
        let prefs = self
            .pipeline
            .preferences()
            .current()
            .context("Failed to read preferences")?;
        Ok(prefs.hide_completed)
    }

    pub fn on_task_selected(&self, task: Task) {
        self.events.send(TasksEvent::NavigateToEditTask(task));
    }

    pub async fn on_task_checked_changed(&self, task: &Task, checked: bool) -> Result<()> {
        self.pipeline
            .store()
            .update(task.with_completed(checked))
            .await
            .with_context(|| format!("Failed to update task {}", task.id))
    }

    /// Delete the task and offer to undo.
    pub async fn on_task_swiped(&self, task: Task) -> Result<()> {
        self.pipeline
            .store()
            .delete(&task)
            .await
            .with_context(|| format!("Failed to delete task {}", task.id))?;
        self.events.send(TasksEvent::ShowUndoDeleteMessage(task));
        Ok(())
    }

    /// Put back a task removed by a swipe. The record keeps its id, so the
    /// store restores the original row rather than creating a new one.
    pub async fn on_undo_delete_click(&self, task: Task) -> Result<()> {
        let id = self
            .pipeline
            .store()
            .insert(task)
            .await
            .context("Failed to restore deleted task")?;
        debug!(%id, "restored deleted task");
        Ok(())
    }

    pub fn on_add_new_task_click(&self) {
        self.events.send(TasksEvent::NavigateToAddTask);
    }

    pub fn on_add_edit_result(&self, result: EditResult) {
        let message = match result {
            EditResult::Added => "Task Added",
            EditResult::Edited => "Task Updated",
        };
        self.events
            .send(TasksEvent::ShowTaskSavedConfirmation(message.to_string()));
    }

    pub fn on_delete_all_completed_click(&self) {
        self.events.send(TasksEvent::ShowDeleteAllCompletedConfirmation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::preferences::PreferencesStore;
    use crate::task::{TaskId, TaskQuery};
    use std::sync::Arc;
    use std::time::Duration;

    async fn view_model(dir: &tempfile::TempDir) -> TasksViewModel {
        let prefs = PreferencesStore::open(&Config::new(dir.path())).await;
        TasksViewModel::new(TaskStore::in_memory().unwrap(), Arc::new(prefs))
    }

    async fn all_tasks(vm: &TasksViewModel) -> Vec<Task> {
        vm.pipeline
            .store()
            .list(TaskQuery::new("", SortOrder::ByDate, false))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_event_queue_has_single_consumer() {
        let dir = tempfile::tempdir().unwrap();
        let vm = view_model(&dir).await;
        assert!(vm.take_events().is_some());
        assert!(vm.take_events().is_none());
    }

    #[tokio::test]
    async fn test_swipe_then_undo_restores_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let vm = view_model(&dir).await;
        let mut events = vm.take_events().unwrap();

        let id = vm.pipeline.store().insert(Task::new("Walk dog")).await.unwrap();
        let task = vm.pipeline.store().get(id).await.unwrap().unwrap();

        vm.on_task_swiped(task.clone()).await.unwrap();
        assert!(all_tasks(&vm).await.is_empty());

        let event = events.recv().await.unwrap();
        let TasksEvent::ShowUndoDeleteMessage(deleted) = event else {
            panic!("expected undo message, got {event:?}");
        };

        vm.on_undo_delete_click(deleted).await.unwrap();
        let restored = all_tasks(&vm).await;
        assert_eq!(restored, vec![task]);
        assert_eq!(restored[0].id, id);
    }

    #[tokio::test]
    async fn test_check_box_updates_completed() {
        let dir = tempfile::tempdir().unwrap();
        let vm = view_model(&dir).await;
        let id = vm.pipeline.store().insert(Task::new("Call mom")).await.unwrap();
        let task = vm.pipeline.store().get(id).await.unwrap().unwrap();

        vm.on_task_checked_changed(&task, true).await.unwrap();
        assert!(vm.pipeline.store().get(id).await.unwrap().unwrap().completed);
    }

    #[tokio::test]
    async fn test_navigation_and_message_events() {
        let dir = tempfile::tempdir().unwrap();
        let vm = view_model(&dir).await;
        let mut events = vm.take_events().unwrap();
        let task = Task::new("x").with_id(TaskId(4));

        vm.on_add_new_task_click();
        vm.on_task_selected(task.clone());
        vm.on_add_edit_result(EditResult::Added);
        vm.on_add_edit_result(EditResult::Edited);
        vm.on_delete_all_completed_click();

        assert_eq!(events.try_recv(), Some(TasksEvent::NavigateToAddTask));
        assert_eq!(events.try_recv(), Some(TasksEvent::NavigateToEditTask(task)));
        assert_eq!(
            events.try_recv(),
            Some(TasksEvent::ShowTaskSavedConfirmation("Task Added".into()))
        );
        assert_eq!(
            events.try_recv(),
            Some(TasksEvent::ShowTaskSavedConfirmation("Task Updated".into()))
        );
        assert_eq!(
            events.try_recv(),
            Some(TasksEvent::ShowDeleteAllCompletedConfirmation)
        );
        assert_eq!(events.try_recv(), None);
    }

    #[tokio::test]
    async fn test_filter_selection_drives_task_list() {
        let dir = tempfile::tempdir().unwrap();
        let vm = view_model(&dir).await;
        vm.pipeline.store().insert(Task::new("beta")).await.unwrap();
        vm.pipeline
            .store()
            .insert(Task::new("alpha").completed(true))
            .await
            .unwrap();

        assert!(vm.hide_completed().unwrap());
        let mut tasks = vm.tasks();
        let first = tokio::time::timeout(Duration::from_secs(2), tasks.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(first.tasks.len(), 1);

        vm.on_hide_completed_selected(false).await.unwrap();
        vm.on_sort_order_selected(SortOrder::ByName).await.unwrap();
        vm.on_search_text_changed("a");
        assert!(!vm.hide_completed().unwrap());
        assert_eq!(vm.search_text(), "a");

        let expected = TaskQuery::new("a", SortOrder::ByName, false);
        loop {
            let snapshot = tokio::time::timeout(Duration::from_secs(2), tasks.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if snapshot.query == expected {
                let names: Vec<_> = snapshot.tasks.iter().map(|t| t.name.as_str()).collect();
                assert_eq!(names, vec!["alpha", "beta"]);
                break;
            }
        }
    }
}
