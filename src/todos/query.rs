//! Filtering, sorting, search and pagination over todo lists.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::http::response::ApiError;
use crate::todos::model::Todo;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    /// Unknown values fall back to `All`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("active") => Filter::Active,
            Some("completed") => Filter::Completed,
            _ => Filter::All,
        }
    }

    fn keeps(self, todo: &Todo) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !todo.completed,
            Filter::Completed => todo.completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Created,
    DueDate,
    Priority,
    Text,
}

impl SortBy {
    /// Unknown values fall back to `Created`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("dueDate") => SortBy::DueDate,
            Some("priority") => SortBy::Priority,
            Some("text") => SortBy::Text,
            _ => SortBy::Created,
        }
    }

    fn compare(self, a: &Todo, b: &Todo) -> Ordering {
        match self {
            SortBy::Created => b.created_at.cmp(&a.created_at),
            SortBy::DueDate => match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => b.created_at.cmp(&a.created_at),
            },
            SortBy::Priority => b.priority.rank().cmp(&a.priority.rank()),
            SortBy::Text => a
                .text
                .to_lowercase()
                .cmp(&b.text.to_lowercase())
                .then_with(|| a.text.cmp(&b.text)),
        }
    }
}

/// Raw list query string. Everything is optional and validated on use.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub filter: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

/// Keep records passing `filter`, then stable-sort by `sort`.
pub fn filter_and_sort(todos: Vec<Todo>, filter: Filter, sort: SortBy) -> Vec<Todo> {
    let mut kept: Vec<Todo> = todos.into_iter().filter(|t| filter.keeps(t)).collect();
    kept.sort_by(|a, b| sort.compare(a, b));
    kept
}

/// Case-insensitive substring match on text. `term` is trimmed first.
pub fn search(todos: Vec<Todo>, term: &str) -> Vec<Todo> {
    let needle = term.trim().to_lowercase();
    todos
        .into_iter()
        .filter(|t| t.text.to_lowercase().contains(&needle))
        .collect()
}

/// Slice one page out of an already ordered list.
pub fn paginate(todos: Vec<Todo>, page: usize, limit: usize) -> (Vec<Todo>, Pagination) {
    let total = todos.len();
    let start = (page - 1).saturating_mul(limit);
    let items = todos.into_iter().skip(start).take(limit).collect();
    (
        items,
        Pagination {
            page,
            limit,
            total,
            pages: total.div_ceil(limit),
        },
    )
}

/// Parse a positive integer parameter, or use `default` when absent.
pub fn positive_param(name: &str, raw: Option<&str>, default: usize) -> Result<usize, ApiError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ApiError::bad_request(format!("Invalid {} parameter", name))
                    .with_message(format!("{} must be a positive integer", name))
            }),
    }
}
