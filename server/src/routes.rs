use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::auth::accounts;
use crate::auth::middleware::JwtSecret;
use crate::messages;
use crate::reports;
use crate::state::AppState;
use crate::tasks::{checklist, crud as task_crud, dashboard};
use crate::uploads;
use crate::users;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor
/// can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 5 requests per minute per IP on credential endpoints.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>.
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let auth_routes = Router::new()
        .route("/api/auth/register", axum::routing::post(accounts::register))
        .route("/api/auth/login", axum::routing::post(accounts::login))
        .layer(GovernorLayer {
            config: governor_config,
        });

    let profile_routes = Router::new()
        .route(
            "/api/auth/profile",
            axum::routing::get(accounts::get_profile).put(accounts::update_profile),
        )
        .route("/api/auth/logout", axum::routing::post(accounts::logout))
        .route(
            "/api/auth/upload-image",
            axum::routing::post(uploads::upload_image)
                // Image cap is enforced per field; leave header/form headroom
                .layer(DefaultBodyLimit::max(uploads::MAX_IMAGE_BYTES + 64 * 1024)),
        );

    let user_routes = Router::new()
        .route("/api/users", axum::routing::get(users::list_members))
        .route(
            "/api/users/{id}",
            axum::routing::get(users::get_user).delete(users::delete_user),
        )
        .route("/api/users/{id}/role", axum::routing::put(users::update_role));

    // Static segments (dashboard-data) are matched before the {id} capture.
    let task_routes = Router::new()
        .route(
            "/api/tasks/dashboard-data",
            axum::routing::get(dashboard::admin_dashboard),
        )
        .route(
            "/api/tasks/user-dashboard-data",
            axum::routing::get(dashboard::user_dashboard),
        )
        .route(
            "/api/tasks",
            axum::routing::get(task_crud::list_tasks).post(task_crud::create_task),
        )
        .route(
            "/api/tasks/{id}",
            axum::routing::get(task_crud::get_task)
                .put(task_crud::update_task)
                .delete(task_crud::delete_task),
        )
        .route(
            "/api/tasks/{id}/status",
            axum::routing::put(checklist::update_status),
        )
        .route(
            "/api/tasks/{id}/todo",
            axum::routing::put(checklist::update_checklist),
        );

    let report_routes = Router::new()
        .route(
            "/api/reports/export/tasks",
            axum::routing::get(reports::export_tasks),
        )
        .route(
            "/api/reports/export/users",
            axum::routing::get(reports::export_users),
        );

    let message_routes = Router::new()
        .route(
            "/api/messages/users",
            axum::routing::get(messages::list_chat_users),
        )
        .route(
            "/api/messages/unseen-count/{id}",
            axum::routing::get(messages::unseen_count),
        )
        .route(
            "/api/messages/send/{id}",
            axum::routing::post(messages::send_message),
        )
        .route(
            "/api/messages/{id}",
            axum::routing::get(messages::get_conversation).delete(messages::delete_message),
        );

    // WebSocket endpoint (auth via query param, not JWT header)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    let upload_routes =
        Router::new().route("/uploads/{file}", axum::routing::get(uploads::serve_upload));

    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(profile_routes)
        .merge(user_routes)
        .merge(task_routes)
        .merge(report_routes)
        .merge(message_routes)
        .merge(ws_routes)
        .merge(upload_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
