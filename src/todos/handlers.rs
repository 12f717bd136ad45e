//! `/api/todos` handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::response::{ApiError, ApiResponse};
use crate::http::server::AppState;
use crate::observability::logging;
use crate::security::cors::X_TOTAL_COUNT;
use crate::todos::model::{
    parse_priority, parse_status, CreateTodoBody, PatchTodoBody, StatusBody, Todo, UpdateTodoBody,
    VALID_STATUSES,
};
use crate::todos::query::{self, Filter, ListParams, Pagination, SortBy};

const NOT_FOUND: &str = "Todo not found";

#[derive(Serialize)]
pub struct TodoPage {
    pub todos: Vec<Todo>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct SearchResult {
    pub todos: Vec<Todo>,
    pub query: String,
    pub count: usize,
}

#[derive(Serialize)]
pub struct PriorityResult {
    pub todos: Vec<Todo>,
    pub priority: String,
    pub count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub deleted_count: usize,
    pub days: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub filter: Option<String>,
    pub sort_by: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupParams {
    pub days: Option<String>,
}

pub async fn list_todos(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let page = query::positive_param("page", params.page.as_deref(), query::DEFAULT_PAGE)?;
    let limit = query::positive_param("limit", params.limit.as_deref(), query::DEFAULT_LIMIT)?;

    let timer = state.performance.start_timer("todos.list", json!({ "page": page, "limit": limit }));
    let ordered = query::filter_and_sort(
        state.todos.list(),
        Filter::parse(params.filter.as_deref()),
        SortBy::parse(params.sort_by.as_deref()),
    );
    let (todos, pagination) = query::paginate(ordered, page, limit);
    state
        .performance
        .end_timer(&timer, json!({ "returned": todos.len() }));

    Ok((
        [(X_TOTAL_COUNT, pagination.total.to_string())],
        ApiResponse::ok(TodoPage { todos, pagination }, "Todos retrieved successfully"),
    ))
}

pub async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<CreateTodoBody>, JsonRejection>,
) -> Result<ApiResponse<Todo>, ApiError> {
    let Json(body) = payload?;
    let todo = state.todos.create(body.validate()?);

    logging::business(
        "todo_created",
        &json!({ "id": todo.id, "priority": todo.priority, "hasDueDate": todo.due_date.is_some() }),
    );
    Ok(ApiResponse::created(todo, "Todo created successfully"))
}

pub async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Todo>, ApiError> {
    let todo = state
        .todos
        .get(&id)
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ApiResponse::ok(todo, "Todo retrieved successfully"))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTodoBody>, JsonRejection>,
) -> Result<ApiResponse<Todo>, ApiError> {
    let Json(body) = payload?;
    let update = body.validate()?;
    let todo = state
        .todos
        .update(&id, update)
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    logging::business("todo_updated", &json!({ "id": todo.id }));
    Ok(ApiResponse::ok(todo, "Todo updated successfully"))
}

pub async fn patch_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PatchTodoBody>, JsonRejection>,
) -> Result<ApiResponse<Todo>, ApiError> {
    let Json(body) = payload?;
    let (completed, status) = body.validate()?;
    let todo = state
        .todos
        .patch(&id, completed, status)
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    logging::business(
        "todo_toggled",
        &json!({ "id": todo.id, "completed": todo.completed, "status": todo.status }),
    );
    Ok(ApiResponse::ok(todo, "Todo toggled successfully"))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Todo>, ApiError> {
    let todo = state
        .todos
        .delete(&id)
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    logging::business("todo_deleted", &json!({ "id": todo.id }));
    Ok(ApiResponse::ok(todo, "Todo deleted successfully"))
}

pub async fn toggle_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Todo>, ApiError> {
    let todo = state
        .todos
        .toggle(&id)
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    logging::business(
        "todo_toggled",
        &json!({ "id": todo.id, "completed": todo.completed }),
    );
    Ok(ApiResponse::ok(todo, "Todo toggled successfully"))
}

pub async fn set_todo_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> Result<ApiResponse<Todo>, ApiError> {
    let Json(body) = payload?;
    let raw = body.status.filter(|s| !s.is_empty()).ok_or_else(|| {
        ApiError::bad_request("Status is required")
            .with_field("validStatuses", json!(VALID_STATUSES))
    })?;
    let status = parse_status(&raw)?;

    let todo = state
        .todos
        .set_status(&id, status)
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    logging::business(
        "todo_status_changed",
        &json!({ "id": todo.id, "status": todo.status }),
    );
    Ok(ApiResponse::ok(todo, "Todo status updated successfully"))
}

pub async fn search_todos(
    State(state): State<AppState>,
    Path(raw_query): Path<String>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<ApiResponse<SearchResult>, ApiError> {
    let Query(params) = params?;
    let term = state.guard.inspector().sanitize_str(&raw_query).trim().to_string();
    if term.is_empty() {
        return Err(ApiError::bad_request("Search query is required"));
    }
    let limit = query::positive_param(
        "limit",
        params.limit.as_deref(),
        query::DEFAULT_SEARCH_LIMIT,
    )?;

    let timer = state.performance.start_timer("todos.search", json!({ "query": term }));
    let mut todos = query::filter_and_sort(
        query::search(state.todos.list(), &term),
        Filter::parse(params.filter.as_deref()),
        SortBy::parse(params.sort_by.as_deref()),
    );
    todos.truncate(limit);
    state
        .performance
        .end_timer(&timer, json!({ "matches": todos.len() }));

    let count = todos.len();
    Ok(ApiResponse::ok(
        SearchResult {
            todos,
            query: term,
            count,
        },
        "Search completed successfully",
    ))
}

pub async fn todos_by_priority(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<ApiResponse<PriorityResult>, ApiError> {
    let Query(params) = params?;
    let priority = parse_priority(&raw)?;

    let todos: Vec<Todo> = query::filter_and_sort(
        state.todos.list(),
        Filter::parse(params.filter.as_deref()),
        SortBy::Created,
    )
    .into_iter()
    .filter(|t| t.priority == priority)
    .collect();

    let count = todos.len();
    Ok(ApiResponse::ok(
        PriorityResult {
            todos,
            priority: priority.to_string(),
            count,
        },
        "Todos retrieved successfully",
    ))
}

pub async fn todo_stats(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::ok(state.todos.stats(), "Todo statistics retrieved successfully")
}

pub async fn cleanup_old(
    State(state): State<AppState>,
    params: Result<Query<CleanupParams>, QueryRejection>,
) -> Result<ApiResponse<CleanupResult>, ApiError> {
    let Query(params) = params?;
    let days = match params.days.as_deref() {
        None => 30,
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
            ApiError::bad_request("Days parameter must be a valid number")
        })?,
    };

    let cutoff = Utc::now() - Duration::days(i64::from(days));
    let removed = state.todos.remove_completed_before(cutoff);

    logging::business(
        "todos_cleaned_up",
        &json!({ "deletedCount": removed.len(), "days": days }),
    );
    Ok(ApiResponse::ok(
        CleanupResult {
            deleted_count: removed.len(),
            days,
        },
        format!("Cleaned up todos older than {} days", days),
    ))
}

/// Route-level health: record counts, outside the usual envelope.
pub async fn todo_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "message": "Todo API is running",
        "data": state.todos.counts(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
