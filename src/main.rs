mod api;
mod auth;
mod calendar;
mod settings;
mod store;
mod task;

use auth::{AppState, SharedState};
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use settings::Settings;
use std::net::SocketAddr;
use std::sync::Arc;
use store::TaskStore;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // ── Boot ───────────────────────────────────────────────────
    let settings = Settings::load();

    let store = TaskStore::open(&settings.database_path)
        .expect("Failed to open task store");

    if store.ensure_default_user()
        .expect("Failed to seed user")
    {
        tracing::info!("Created default admin user (admin / admin)");
    }

    let addr = SocketAddr::new(
        settings.bind_address.parse().expect("Invalid bind address"),
        settings.port,
    );

    // ── Shared state ───────────────────────────────────────────
    let state: SharedState = Arc::new(AppState { store, settings });

    // ── Router ─────────────────────────────────────────────────
    let app = Router::new()
        // Task operations — all behind the bearer-token middleware
        .route("/api/tasks", post(api::create_task).get(api::list_tasks))
        .route("/api/tasks/calendar", get(api::calendar_tasks))
        .route("/api/tasks/view", get(api::view_tasks))
        .route(
            "/api/tasks/:id",
            get(api::get_task)
                .put(api::update_task)
                .delete(api::delete_task),
        )
        .route("/api/tasks/:id/complete", patch(api::complete_task))
        .route("/api/tasks/:id/uncomplete", patch(api::uncomplete_task))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        // Auth (JSON, once per session) and liveness — public
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/health", get(api::health))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // ── Start ──────────────────────────────────────────────────
    tracing::info!("Planning service running on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .await
        .expect("Server error");
}
