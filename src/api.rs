//! Task HTTP handlers.
//!
//! Thin orchestration over task.rs (validation/transitions), calendar.rs
//! (view windows), and store.rs (persistence). Every single-item operation
//! goes through fetch_owned, which is the one place the ownership check
//! lives.

use crate::auth::SharedState;
use crate::calendar::{self, Nav, ViewMode};
use crate::store::{StoreError, TaskFilter, User};
use crate::task::{Category, Priority, Task, TaskError, TaskPatch};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

const LIST_LIMIT_MAX: usize = 100;

// ── DTOs ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub date: String,
    pub due_time: Option<String>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub due_time: Option<NaiveTime>,
    pub category: Category,
    pub priority: Priority,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        TaskResponse {
            id: task.id,
            user_id: task.user_id,
            title: task.title,
            description: task.description,
            date: task.date,
            due_time: task.due_time,
            category: task.category,
            priority: task.priority,
            completed: task.completed,
            completed_at: task.completed_at,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub completed: Option<bool>,
    pub category: Option<Category>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub date: Option<String>,
    #[serde(default)]
    pub view: ViewMode,
    pub nav: Option<Nav>,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub view: ViewMode,
    pub reference: NaiveDate,
    pub dates: Vec<NaiveDate>,
    pub tasks: BTreeMap<NaiveDate, Vec<TaskResponse>>,
}

/// Serialize an optional due time as "HH:MM" (the wire format the Aurora
/// frontend expects), null when absent.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_some(&t.format("%H:%M").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => NaiveTime::parse_from_str(&raw, "%H:%M")
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

// ── Error mapping ──────────────────────────────────────────────

fn task_err(e: TaskError) -> (StatusCode, String) {
    let status = match e {
        TaskError::Validation(_) => StatusCode::BAD_REQUEST,
        TaskError::NotFound => StatusCode::NOT_FOUND,
        TaskError::Forbidden => StatusCode::FORBIDDEN,
    };
    (status, e.to_string())
}

fn store_err(e: StoreError) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// ── Ownership guard ────────────────────────────────────────────

/// The single ownership check every get/update/delete/complete goes through.
fn authorize_owner(task: &Task, user_id: Uuid) -> Result<(), TaskError> {
    if task.user_id != user_id {
        return Err(TaskError::Forbidden);
    }
    Ok(())
}

/// Load a task by id and verify the acting user owns it. 404 when the row
/// doesn't exist, 403 when it belongs to someone else.
fn fetch_owned(
    state: &SharedState,
    id: Uuid,
    user_id: Uuid,
) -> Result<Task, (StatusCode, String)> {
    let task = state
        .store
        .get_task(id)
        .map_err(store_err)?
        .ok_or_else(|| task_err(TaskError::NotFound))?;
    authorize_owner(&task, user_id).map_err(task_err)?;
    Ok(task)
}

// ── Handlers ───────────────────────────────────────────────────

// POST /api/tasks
pub async fn create_task(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), (StatusCode, String)> {
    let task = Task::create(
        user.id,
        &payload.title,
        payload.description.as_deref(),
        &payload.date,
        payload.due_time.as_deref(),
        payload.category,
        payload.priority,
    )
    .map_err(task_err)?;

    state.store.save_task(&task).map_err(store_err)?;
    tracing::info!(task_id = %task.id, user = %user.username, "task created");
    Ok((StatusCode::CREATED, Json(task.into())))
}

// GET /api/tasks
pub async fn list_tasks(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListQuery>,
) -> Result<Json<TaskListResponse>, (StatusCode, String)> {
    let filter = TaskFilter {
        limit: query.limit.unwrap_or(50).clamp(1, LIST_LIMIT_MAX),
        offset: query.offset.unwrap_or(0),
        completed: query.completed,
        category: query.category,
    };

    let tasks = state.store.find_by_user(user.id, &filter).map_err(store_err)?;
    let total = state.store.count_by_user(user.id, &filter).map_err(store_err)?;

    Ok(Json(TaskListResponse {
        tasks: tasks.into_iter().map(TaskResponse::from).collect(),
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

// GET /api/tasks/calendar?start=YYYY-MM-DD&end=YYYY-MM-DD
pub async fn calendar_tasks(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Vec<TaskResponse>>, (StatusCode, String)> {
    let (start, end) =
        calendar::parse_range(query.start.as_deref(), query.end.as_deref()).map_err(task_err)?;

    let tasks = state
        .store
        .find_by_date_range(user.id, start, end)
        .map_err(store_err)?;

    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

// GET /api/tasks/view?date=YYYY-MM-DD&view=day|week|month[&nav=prev|next|today]
pub async fn view_tasks(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<ViewResponse>, (StatusCode, String)> {
    let mut reference = match query.date.as_deref() {
        Some(raw) => crate::task::parse_day(raw).map_err(task_err)?,
        None => Local::now().date_naive(),
    };
    if let Some(nav) = query.nav {
        reference = calendar::navigate(reference, query.view, nav);
    }

    let dates = calendar::view_window(reference, query.view);

    // One range query covers the whole window; the window dates are
    // contiguous and ascending.
    let start = dates[0];
    let end = *dates.last().unwrap();
    let in_range = state
        .store
        .find_by_date_range(user.id, start, end)
        .map_err(store_err)?;

    let mut tasks: BTreeMap<NaiveDate, Vec<TaskResponse>> =
        dates.iter().map(|d| (*d, Vec::new())).collect();
    for task in in_range {
        tasks.entry(task.date).or_default().push(task.into());
    }

    Ok(Json(ViewResponse {
        view: query.view,
        reference,
        dates,
        tasks,
    }))
}

// GET /api/tasks/:id
pub async fn get_task(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    let task = fetch_owned(&state, id, user.id)?;
    Ok(Json(task.into()))
}

// PUT /api/tasks/:id
pub async fn update_task(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    let mut task = fetch_owned(&state, id, user.id)?;

    let changed = task.update(patch).map_err(task_err)?;
    if changed {
        state.store.update_task(&task).map_err(store_err)?;
    }

    Ok(Json(task.into()))
}

// DELETE /api/tasks/:id
pub async fn delete_task(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    fetch_owned(&state, id, user.id)?;

    if !state.store.delete_task(id).map_err(store_err)? {
        return Err(task_err(TaskError::NotFound));
    }
    tracing::info!(task_id = %id, user = %user.username, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

// PATCH /api/tasks/:id/complete
pub async fn complete_task(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    let mut task = fetch_owned(&state, id, user.id)?;
    task.complete();
    state.store.update_task(&task).map_err(store_err)?;
    Ok(Json(task.into()))
}

// PATCH /api/tasks/:id/uncomplete
pub async fn uncomplete_task(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    let mut task = fetch_owned(&state, id, user.id)?;
    task.uncomplete();
    state.store.update_task(&task).map_err(store_err)?;
    Ok(Json(task.into()))
}

// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "planning",
        "timestamp": Utc::now(),
    }))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::store::TaskStore;
    use std::fs;
    use std::sync::Arc;

    fn temp_state(name: &str) -> (SharedState, String, User) {
        let path = format!("/tmp/aurora_api_{name}_{}.redb", std::process::id());
        let _ = fs::remove_file(&path);
        let store = TaskStore::open(&path).unwrap();
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            password_hash: String::new(),
        };
        store.create_user(&user).unwrap();
        let state = Arc::new(crate::auth::AppState {
            store,
            settings: Settings::default(),
        });
        (state, path, user)
    }

    fn cleanup(path: &str) {
        let _ = fs::remove_file(path);
    }

    fn seed_task(state: &SharedState, owner: Uuid, title: &str, date: &str) -> Task {
        let task = Task::create(
            owner,
            title,
            None,
            date,
            None,
            Category::Todo,
            Priority::Medium,
        )
        .unwrap();
        state.store.save_task(&task).unwrap();
        task
    }

    #[test]
    fn owner_guard_accepts_owner_rejects_others() {
        let owner = Uuid::new_v4();
        let task = Task::create(
            owner,
            "Mine",
            None,
            "2024-03-06",
            None,
            Category::Todo,
            Priority::Medium,
        )
        .unwrap();

        assert!(authorize_owner(&task, owner).is_ok());
        assert_eq!(
            authorize_owner(&task, Uuid::new_v4()).unwrap_err(),
            TaskError::Forbidden
        );
    }

    #[test]
    fn fetch_owned_maps_missing_and_foreign_tasks() {
        let (state, path, user) = temp_state("fetch_owned");
        let task = seed_task(&state, user.id, "Mine", "2024-03-06");

        assert_eq!(fetch_owned(&state, task.id, user.id).unwrap().id, task.id);

        let (status, _) = fetch_owned(&state, Uuid::new_v4(), user.id).unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = fetch_owned(&state, task.id, Uuid::new_v4()).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);

        cleanup(&path);
    }

    #[tokio::test]
    async fn foreign_user_mutations_leave_the_row_unmodified() {
        let (state, path, _owner_user) = temp_state("foreign");
        let owner = Uuid::new_v4();
        let task = seed_task(&state, owner, "Not yours", "2024-03-06");

        let intruder = User {
            id: Uuid::new_v4(),
            username: "mallory".to_string(),
            password_hash: String::new(),
        };

        let (status, _) = update_task(
            State(state.clone()),
            Extension(intruder.clone()),
            Path(task.id),
            Json(TaskPatch {
                title: Some("Stolen".into()),
                ..TaskPatch::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = complete_task(
            State(state.clone()),
            Extension(intruder.clone()),
            Path(task.id),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = delete_task(
            State(state.clone()),
            Extension(intruder),
            Path(task.id),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);

        // The stored row is byte-for-byte what the owner created.
        let stored = state.store.get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.title, "Not yours");
        assert!(!stored.completed);
        assert_eq!(stored.updated_at, task.updated_at);

        cleanup(&path);
    }

    #[tokio::test]
    async fn complete_endpoint_is_idempotent() {
        let (state, path, user) = temp_state("complete");
        let task = seed_task(&state, user.id, "Finish report", "2024-03-06");

        let first = complete_task(
            State(state.clone()),
            Extension(user.clone()),
            Path(task.id),
        )
        .await
        .unwrap();
        let completed_at = first.0.completed_at;
        assert!(first.0.completed);
        assert!(completed_at.is_some());

        let second = complete_task(State(state.clone()), Extension(user), Path(task.id))
            .await
            .unwrap();
        assert_eq!(second.0.completed_at, completed_at);

        cleanup(&path);
    }

    #[tokio::test]
    async fn calendar_rejects_inverted_range() {
        let (state, path, user) = temp_state("inverted");

        let (status, message) = calendar_tasks(
            State(state.clone()),
            Extension(user),
            Query(CalendarQuery {
                start: Some("2024-03-01".into()),
                end: Some("2024-02-01".into()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "End date must be after start date");

        cleanup(&path);
    }

    #[tokio::test]
    async fn week_view_groups_tasks_by_day() {
        let (state, path, user) = temp_state("week_view");
        seed_task(&state, user.id, "Wednesday errand", "2024-03-06");
        seed_task(&state, user.id, "Sunday brunch", "2024-03-03");
        seed_task(&state, user.id, "Out of window", "2024-03-10");

        let Json(view) = view_tasks(
            State(state.clone()),
            Extension(user),
            Query(ViewQuery {
                date: Some("2024-03-06".into()),
                view: ViewMode::Week,
                nav: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(view.dates.len(), 7);
        assert_eq!(view.dates[0], NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(view.dates[6], NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        // Every window day is present, even empty ones.
        assert_eq!(view.tasks.len(), 7);

        let sunday = &view.tasks[&NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()];
        assert_eq!(sunday.len(), 1);
        assert_eq!(sunday[0].title, "Sunday brunch");

        let wednesday = &view.tasks[&NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()];
        assert_eq!(wednesday[0].title, "Wednesday errand");

        // The 03-10 task is outside the window and must not appear anywhere.
        let all: usize = view.tasks.values().map(Vec::len).sum();
        assert_eq!(all, 2);

        cleanup(&path);
    }

    #[tokio::test]
    async fn view_nav_shifts_the_reference() {
        let (state, path, user) = temp_state("view_nav");

        let Json(view) = view_tasks(
            State(state.clone()),
            Extension(user),
            Query(ViewQuery {
                date: Some("2024-01-31".into()),
                view: ViewMode::Month,
                nav: Some(Nav::Next),
            }),
        )
        .await
        .unwrap();

        assert_eq!(view.reference, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(view.dates.len(), 29);

        cleanup(&path);
    }

    #[test]
    fn create_request_defaults_category_and_priority() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"title": "x", "date": "2024-03-06"}"#).unwrap();
        assert_eq!(req.category, Category::Todo);
        assert_eq!(req.priority, Priority::Medium);
        assert_eq!(req.due_time, None);
    }

    #[test]
    fn task_response_wire_format() {
        let task = Task::create(
            Uuid::nil(),
            "Standup",
            None,
            "2024-03-06",
            Some("09:30"),
            Category::Event,
            Priority::High,
        )
        .unwrap();

        let json = serde_json::to_value(TaskResponse::from(task)).unwrap();
        assert_eq!(json["date"], "2024-03-06");
        assert_eq!(json["dueTime"], "09:30");
        assert_eq!(json["category"], "event");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["completedAt"], serde_json::Value::Null);
        assert!(json["userId"].is_string());
    }
}
