use crate::db::{Database, GroupColumn};
use crate::errors::{AppError, AppResult};
use crate::models::{page_count, ListTasksQuery, NewTask, Task, TaskId, TaskPage, TaskPatch, TaskStats};
use std::sync::Arc;

/// Async facade over the task store.
///
/// Every call hops onto the blocking pool so SQLite work never stalls the
/// request executor.
#[derive(Debug, Clone)]
pub struct TaskService {
    db: Arc<Database>,
}

impl TaskService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn list(&self, query: ListTasksQuery) -> AppResult<TaskPage> {
        let (items, total) = self.blocking(move |db| db.list_tasks(&query)).await?;
        Ok(TaskPage {
            items,
            total,
            page: query.page,
            page_count: page_count(total, query.limit),
        })
    }

    pub async fn get(&self, id: TaskId) -> AppResult<Task> {
        self.blocking(move |db| db.get_task(id))
            .await?
            .ok_or_else(AppError::task_not_found)
    }

    pub async fn create(&self, input: NewTask) -> AppResult<Task> {
        let task = self.blocking(move |db| db.insert_task(input)).await?;
        tracing::info!(task_id = %task.id, status = task.status.as_str(), "task created");
        Ok(task)
    }

    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> AppResult<Task> {
        let task = self.blocking(move |db| db.update_task(id, patch)).await?;
        tracing::info!(task_id = %task.id, status = task.status.as_str(), "task updated");
        Ok(task)
    }

    pub async fn delete(&self, id: TaskId) -> AppResult<()> {
        self.blocking(move |db| db.delete_task(id)).await?;
        tracing::info!(task_id = %id, "task deleted");
        Ok(())
    }

    pub async fn stats(&self) -> AppResult<TaskStats> {
        self.blocking(|db| {
            Ok(TaskStats {
                by_status: db.count_tasks_by(GroupColumn::Status)?,
                by_priority: db.count_tasks_by(GroupColumn::Priority)?,
            })
        })
        .await
    }

    async fn blocking<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> AppResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || work(&db)).await?
    }
}
