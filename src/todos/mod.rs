//! Todo records and the `/api/todos` routes.
//!
//! # Data Flow
//! ```text
//! handlers.rs (validate body/query → ApiError 400)
//!     → store.rs (RwLock<Vec<Todo>>)
//!     → query.rs (filter → stable sort → page)
//!     → ApiResponse envelope
//! ```

pub mod handlers;
pub mod model;
pub mod query;
pub mod store;

use axum::{
    routing::{delete, get, patch},
    Router,
};

use crate::http::server::AppState;
use self::handlers::*;

pub use model::{NewTodo, Priority, Status, Todo};
pub use store::TodoStore;

/// Routes relative to `/api/todos`. Static segments take precedence over `{id}`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_todos).post(create_todo))
        .route("/health", get(todo_health))
        .route("/stats/overview", get(todo_stats))
        .route("/search/{query}", get(search_todos))
        .route("/priority/{priority}", get(todos_by_priority))
        .route("/cleanup/old", delete(cleanup_old))
        .route(
            "/{id}",
            get(get_todo)
                .put(update_todo)
                .patch(patch_todo)
                .delete(delete_todo),
        )
        .route("/{id}/toggle", patch(toggle_todo))
        .route("/{id}/status", patch(set_todo_status))
}
