use axum::{
    extract::Request,
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use log::{info, warn};
use tower_http::cors::{Any, CorsLayer};
use unveil_shared::auth::auth_middleware;

use crate::handlers::{
    cron_handlers::{process_messages, process_scheduled},
    event_handlers::{add_guest, list_guests, list_media, update_rsvp},
    message_handlers::{create_message, list_messages, schedule_message},
    sms_handlers::{send_announcement, send_reminder},
    webhook_handlers::twilio_status,
};
use crate::state::AppState;

/// Builds the full API router around the given state
pub fn create_router_with_state(state: AppState) -> Router {
    info!("Setting up API routes");

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Logging middleware to trace all requests
    async fn logging_middleware(
        req: Request,
        next: axum::middleware::Next,
    ) -> impl axum::response::IntoResponse {
        info!(
            "Router received request: method={}, uri={}",
            req.method(),
            req.uri()
        );
        next.run(req).await
    }

    // Routes that act on behalf of a signed-in user
    let user_routes = Router::new()
        .route("/api/sms/send-announcement", post(send_announcement))
        .route("/api/sms/send-reminder", post(send_reminder))
        .route("/api/events/:id/guests", get(list_guests).post(add_guest))
        .route("/api/events/:id/rsvp", patch(update_rsvp))
        .route(
            "/api/events/:id/messages",
            get(list_messages).post(create_message),
        )
        .route("/api/events/:id/media", get(list_media))
        .route(
            "/api/events/:id/scheduled-messages",
            post(schedule_message),
        )
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ));

    // Cron routes check CRON_SECRET themselves; the webhook is called by Twilio
    let system_routes = Router::new()
        .route("/health", get(health))
        .route(
            "/api/cron/process-messages",
            get(process_messages).post(process_messages),
        )
        .route("/api/messages/process-scheduled", post(process_scheduled))
        .route("/api/webhooks/twilio", post(twilio_status));

    let router = user_routes
        .merge(system_routes)
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(logging_middleware));

    info!("Router configured with all routes and middleware");

    // Add a fallback handler for 404s
    router.fallback(|req: Request| async move {
        warn!("No route matched for: {} {}", req.method(), req.uri());
        (
            axum::http::StatusCode::NOT_FOUND,
            "The requested resource was not found".to_string(),
        )
    })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
