pub mod chat;
pub mod error;
pub mod routes;
pub mod rpc;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use ops_core::{Config, Store};
use ops_llm::LlmProcessor;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(routes::chat::health))
        .route("/api/health", get(routes::chat::api_health))
        // JSON-RPC
        .route("/rpc", post(rpc::rpc_endpoint))
        // Chat
        .route("/ws/{user_id}", get(routes::chat::ws_chat))
        .route("/api/command", post(routes::chat::api_command))
        // Tenants
        .route(
            "/tenants",
            get(routes::records::list_tenants).post(routes::records::create_tenant),
        )
        .route("/tenants/{id}", get(routes::records::get_tenant))
        // Tags
        .route(
            "/tags",
            get(routes::records::list_tags).post(routes::records::create_tag),
        )
        .route(
            "/tags/{id}",
            get(routes::records::get_tag).delete(routes::records::delete_tag),
        )
        // Task queue mappings
        .route(
            "/task-queue-mapping",
            get(routes::records::list_mappings).post(routes::records::create_mapping),
        )
        .route(
            "/task-queue-mapping/{id}",
            get(routes::records::get_mapping).delete(routes::records::delete_mapping),
        )
        // User tasks / history
        .route(
            "/user-tasks",
            get(routes::records::list_user_tasks).post(routes::records::create_user_task),
        )
        .route(
            "/history-tasks",
            get(routes::records::list_history).post(routes::records::create_history),
        )
        .route(
            "/history-tasks/task/{task_id}",
            get(routes::records::list_history_for_task),
        )
        // Agents
        .route("/agents", get(routes::agents::list_agents))
        .route("/agents/count", get(routes::agents::agent_count))
        .route("/agents/{name}", get(routes::agents::get_agent))
        .route(
            "/agents/{name}/assign-task",
            post(routes::agents::assign_task),
        )
        .route("/agents/{name}/tasks", get(routes::agents::agent_tasks))
        .route(
            "/performance/agents/completed",
            get(routes::agents::completed_by_agent),
        )
        // Workbenches and roles
        .route(
            "/workbenches",
            get(routes::workbenches::list_workbenches).post(routes::workbenches::create_workbench),
        )
        .route("/workbenches/coverage", get(routes::workbenches::coverage))
        .route(
            "/workbenches/suggestions",
            get(routes::workbenches::suggestions),
        )
        .route(
            "/workbenches/{id}/roles",
            get(routes::workbenches::workbench_roles),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Open the database, probe LLM providers, and build the shared state.
pub async fn app_state(config: &Config) -> anyhow::Result<AppState> {
    let store = Store::from_database_url(&config.database_url)?;
    tracing::info!(path = %store.path().display(), "database ready");
    let llm = LlmProcessor::connect(&config.llm).await;
    Ok(AppState::new(store, Some(llm)))
}

/// Start the OPS Center server on `config.host:config.port`.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    serve_on(config, listener).await
}

/// Start the server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(config: Config, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(app_state(&config).await?);

    tracing::info!("OPS Center listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
