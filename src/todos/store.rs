//! In-memory todo store.
//!
//! # Design Decisions
//! - One `RwLock<Vec<Todo>>`; newest records sit at the front
//! - Every mutation refreshes `updatedAt` and the `todo_records` gauge
//! - Readers get clones so no lock outlives a call

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::observability::metrics;
use crate::todos::model::{NewTodo, Priority, Status, Todo, TodoUpdate};

/// Counts reported by the todo health route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TodoCounts {
    pub total_todos: usize,
    pub completed: usize,
    pub pending: usize,
    pub in_progress: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriorityBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoStats {
    pub total: usize,
    pub completed: usize,
    pub incomplete: usize,
    pub in_progress: usize,
    pub by_priority: PriorityBreakdown,
    /// Whole percent, rounded.
    pub completion_rate: u32,
}

#[derive(Default)]
pub struct TodoStore {
    todos: RwLock<Vec<Todo>>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with a handful of demo records.
    pub fn with_samples() -> Self {
        let store = Self {
            todos: RwLock::new(sample_todos(Utc::now())),
        };
        store.publish_len();
        store
    }

    pub fn len(&self) -> usize {
        self.todos.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.read().is_empty()
    }

    pub fn list(&self) -> Vec<Todo> {
        self.todos.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Todo> {
        self.todos.read().iter().find(|t| t.id == id).cloned()
    }

    pub fn create(&self, input: NewTodo) -> Todo {
        let now = Utc::now();
        let todo = Todo {
            id: Uuid::new_v4().to_string(),
            text: input.text,
            completed: false,
            priority: input.priority,
            status: Status::Pending,
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        };
        self.todos.write().insert(0, todo.clone());
        self.publish_len();
        todo
    }

    /// Merge fields as given. No completed/status synchronization happens here.
    pub fn update(&self, id: &str, update: TodoUpdate) -> Option<Todo> {
        self.modify(id, |todo| {
            if let Some(text) = update.text {
                todo.text = text;
            }
            if let Some(completed) = update.completed {
                todo.completed = completed;
            }
            if let Some(priority) = update.priority {
                todo.priority = priority;
            }
            if let Some(status) = update.status {
                todo.status = status;
            }
            if let Some(due_date) = update.due_date {
                todo.due_date = due_date;
            }
        })
    }

    /// `completed` first sets status to completed/pending; a status given
    /// afterwards wins, and `completed` status forces `completed = true`.
    pub fn patch(&self, id: &str, completed: Option<bool>, status: Option<Status>) -> Option<Todo> {
        self.modify(id, |todo| {
            if let Some(completed) = completed {
                todo.completed = completed;
                todo.status = if completed {
                    Status::Completed
                } else {
                    Status::Pending
                };
            }
            if let Some(status) = status {
                todo.status = status;
                if status == Status::Completed {
                    todo.completed = true;
                }
            }
        })
    }

    /// Flip `completed`; status is left as it was.
    pub fn toggle(&self, id: &str) -> Option<Todo> {
        self.modify(id, |todo| todo.completed = !todo.completed)
    }

    pub fn set_status(&self, id: &str, status: Status) -> Option<Todo> {
        self.modify(id, |todo| todo.status = status)
    }

    pub fn delete(&self, id: &str) -> Option<Todo> {
        let removed = {
            let mut todos = self.todos.write();
            let index = todos.iter().position(|t| t.id == id)?;
            todos.remove(index)
        };
        self.publish_len();
        Some(removed)
    }

    /// Remove completed records last touched before `cutoff`.
    pub fn remove_completed_before(&self, cutoff: DateTime<Utc>) -> Vec<Todo> {
        let removed = {
            let mut todos = self.todos.write();
            let (gone, kept): (Vec<Todo>, Vec<Todo>) = todos
                .drain(..)
                .partition(|t| t.completed && t.updated_at < cutoff);
            *todos = kept;
            gone
        };
        self.publish_len();
        removed
    }

    pub fn counts(&self) -> TodoCounts {
        let todos = self.todos.read();
        let completed = todos.iter().filter(|t| t.completed).count();
        TodoCounts {
            total_todos: todos.len(),
            completed,
            pending: todos.len() - completed,
            in_progress: todos
                .iter()
                .filter(|t| t.status == Status::InProgress)
                .count(),
        }
    }

    pub fn stats(&self) -> TodoStats {
        let todos = self.todos.read();
        let total = todos.len();
        let completed = todos.iter().filter(|t| t.completed).count();
        let by = |p: Priority| todos.iter().filter(|t| t.priority == p).count();

        TodoStats {
            total,
            completed,
            incomplete: total - completed,
            in_progress: todos
                .iter()
                .filter(|t| t.status == Status::InProgress)
                .count(),
            by_priority: PriorityBreakdown {
                high: by(Priority::High),
                medium: by(Priority::Medium),
                low: by(Priority::Low),
            },
            completion_rate: if total == 0 {
                0
            } else {
                ((completed as f64 / total as f64) * 100.0).round() as u32
            },
        }
    }

    fn modify<F>(&self, id: &str, change: F) -> Option<Todo>
    where
        F: FnOnce(&mut Todo),
    {
        let mut todos = self.todos.write();
        let todo = todos.iter_mut().find(|t| t.id == id)?;
        change(todo);
        todo.updated_at = Utc::now();
        Some(todo.clone())
    }

    fn publish_len(&self) {
        metrics::set_todo_records(self.len());
    }
}

fn sample_todos(now: DateTime<Utc>) -> Vec<Todo> {
    let samples = [
        ("Finish setting up the React project", false, Priority::High, Status::Pending, 3, 60),
        ("Test the backend API integration", true, Priority::Medium, Status::Completed, 1, 90),
        ("Apply the UI/UX improvements", false, Priority::High, Status::InProgress, 5, 75),
        ("Test the responsive layout", false, Priority::Low, Status::Pending, 13, 100),
        ("Implement the dark mode theme", false, Priority::Medium, Status::Pending, 8, 110),
    ];

    samples
        .into_iter()
        .map(|(text, completed, priority, status, due_days, age_minutes)| {
            let created_at = now - Duration::minutes(age_minutes);
            Todo {
                id: Uuid::new_v4().to_string(),
                text: text.to_string(),
                completed,
                priority,
                status,
                due_date: Some(now + Duration::days(due_days)),
                created_at,
                updated_at: created_at,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_todo(text: &str, priority: Priority) -> NewTodo {
        NewTodo {
            text: text.to_string(),
            priority,
            due_date: None,
        }
    }

    #[test]
    fn create_inserts_at_front() {
        let store = TodoStore::new();
        let first = store.create(new_todo("first", Priority::Low));
        let second = store.create(new_todo("second", Priority::High));

        let list = store.list();
        assert_eq!(list[0].id, second.id);
        assert_eq!(list[1].id, first.id);
        assert!(!second.completed);
        assert_eq!(second.status, Status::Pending);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn patch_syncs_completed_and_status() {
        let store = TodoStore::new();
        let todo = store.create(new_todo("buy milk", Priority::High));

        let done = store.patch(&todo.id, Some(true), None).unwrap();
        assert!(done.completed);
        assert_eq!(done.status, Status::Completed);

        let undone = store.patch(&todo.id, Some(false), None).unwrap();
        assert_eq!(undone.status, Status::Pending);

        let forced = store.patch(&todo.id, None, Some(Status::Completed)).unwrap();
        assert!(forced.completed);

        // Status given after completed wins.
        let mixed = store
            .patch(&todo.id, Some(false), Some(Status::InProgress))
            .unwrap();
        assert!(!mixed.completed);
        assert_eq!(mixed.status, Status::InProgress);
    }

    #[test]
    fn update_does_not_sync_status() {
        let store = TodoStore::new();
        let todo = store.create(new_todo("x", Priority::Medium));
        let updated = store
            .update(
                &todo.id,
                TodoUpdate {
                    completed: Some(true),
                    ..TodoUpdate::default()
                },
            )
            .unwrap();
        assert!(updated.completed);
        assert_eq!(updated.status, Status::Pending);
        assert!(updated.updated_at >= todo.updated_at);
    }

    #[test]
    fn toggle_leaves_status() {
        let store = TodoStore::new();
        let todo = store.create(new_todo("x", Priority::Medium));
        let toggled = store.toggle(&todo.id).unwrap();
        assert!(toggled.completed);
        assert_eq!(toggled.status, Status::Pending);
    }

    #[test]
    fn delete_then_get_is_none() {
        let store = TodoStore::new();
        let todo = store.create(new_todo("x", Priority::Medium));
        assert_eq!(store.delete(&todo.id).unwrap().id, todo.id);
        assert!(store.get(&todo.id).is_none());
        assert!(store.delete(&todo.id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn cleanup_removes_only_old_completed() {
        let store = TodoStore::new();
        let old_done = store.create(new_todo("old done", Priority::Low));
        let fresh_done = store.create(new_todo("fresh done", Priority::Low));
        let open = store.create(new_todo("open", Priority::Low));
        store.patch(&old_done.id, Some(true), None);
        store.patch(&fresh_done.id, Some(true), None);
        store.todos.write()[2].updated_at = Utc::now() - Duration::days(40);

        let removed = store.remove_completed_before(Utc::now() - Duration::days(30));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, old_done.id);
        assert!(store.get(&open.id).is_some());
        assert!(store.get(&fresh_done.id).is_some());
    }

    #[test]
    fn samples_and_stats() {
        let store = TodoStore::with_samples();
        assert_eq!(store.len(), 5);

        let counts = store.counts();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.pending, 4);
        assert_eq!(counts.in_progress, 1);

        let stats = store.stats();
        assert_eq!(stats.by_priority.high, 2);
        assert_eq!(stats.completion_rate, 20);
    }
}
