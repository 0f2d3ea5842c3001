//! Department site backend.
//!
//! Keeps per-entity sync hooks over a row store with a change feed, and serves
//! their cached collections plus the admin mutations over a JSON API.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod models;
pub mod store;
pub mod sync;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use auth::SessionRegistry;
use config::Config;
use models::{Event, Faculty, News, Program, StudyMaterial};
use store::PUBLIC_OBJECT_PATH;
use sync::{SiteSync, MAX_IMAGE_BYTES};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub site: Arc<SiteSync>,
    pub sessions: Arc<SessionRegistry>,
    pub config: Arc<Config>,
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let sessions = state.sessions.clone();

    let public_routes = Router::new()
        .route("/faculty", get(api::list_faculty))
        .route("/faculty/featured", get(api::featured_faculty))
        .route("/faculty/specializations", get(api::faculty_specializations))
        .route("/events", get(api::list_events))
        .route("/events/overview", get(api::events_overview))
        .route("/news", get(api::list::<News>))
        .route("/news/published", get(api::published_news))
        .route("/news/{id}/view", post(api::view_news))
        .route("/programs", get(api::list::<Program>))
        .route("/materials", get(api::list_materials))
        .route("/materials/semesters", get(api::material_semesters))
        .route("/materials/{id}/download", post(api::download_material))
        .route("/gallery/albums", get(api::published_albums))
        .route("/gallery/photos", get(api::published_photos))
        .route("/coordinator-message", get(api::coordinator_message))
        .route("/auth/login", post(api::login));

    let admin_routes = Router::new()
        .route("/auth/logout", post(api::logout))
        .route("/auth/me", get(api::current_user))
        .route("/admin/stats", get(api::dashboard_stats))
        // Faculty
        .route("/admin/faculty", post(api::create::<Faculty>))
        .route("/admin/faculty/{id}", put(api::update::<Faculty>))
        .route("/admin/faculty/{id}", delete(api::remove::<Faculty>))
        // Events
        .route("/admin/events", post(api::create::<Event>))
        .route("/admin/events/{id}", put(api::update::<Event>))
        .route("/admin/events/{id}", delete(api::remove::<Event>))
        .route("/admin/events/{id}/register", post(api::register_for_event))
        // News
        .route("/admin/news", post(api::create::<News>))
        .route("/admin/news/{id}", put(api::update::<News>))
        .route("/admin/news/{id}", delete(api::remove::<News>))
        // Programs
        .route("/admin/programs", post(api::create::<Program>))
        .route("/admin/programs/{id}", put(api::update::<Program>))
        .route("/admin/programs/{id}", delete(api::remove::<Program>))
        // Study materials
        .route("/admin/materials", post(api::create::<StudyMaterial>))
        .route("/admin/materials/{id}", put(api::update::<StudyMaterial>))
        .route("/admin/materials/{id}", delete(api::remove::<StudyMaterial>))
        // Coordinator's message
        .route(
            "/admin/coordinator-message",
            post(api::create_coordinator_message),
        )
        .route(
            "/admin/coordinator-message/{id}",
            put(api::update_coordinator_message),
        )
        // Gallery
        .route("/admin/gallery/albums", get(api::list_albums))
        .route("/admin/gallery/albums", post(api::create_album))
        .route("/admin/gallery/albums/{id}", put(api::update_album))
        .route("/admin/gallery/albums/{id}", delete(api::delete_album))
        .route("/admin/gallery/photos", post(api::add_photo))
        .route("/admin/gallery/photos/{id}", delete(api::delete_photo))
        // Images
        .route(
            "/admin/uploads",
            post(api::upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES * 2)),
        )
        .route("/admin/uploads", delete(api::delete_image))
        // Apply session auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::session_auth_layer(sessions.clone(), req, next)
        }));

    // Uploaded objects, laid out as {bucket}/{key} under the storage dir
    let blob_files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=3600"),
        ))
        .service(ServeDir::new(&state.config.storage_dir));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", public_routes.merge(admin_routes))
        .nest_service(PUBLIC_OBJECT_PATH, blob_files)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod test_support;
