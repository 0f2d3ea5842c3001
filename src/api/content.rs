//! Faculty, events, news, programs, study materials and the coordinator's message.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;

use super::{success, ApiResult};
use crate::catalog::{self, EventFilter, FacultyFilter, MaterialFilter};
use crate::models::{
    CoordinatorMessage, CreateCoordinatorMessageRequest, Entity, Event, Faculty, News, Program,
    StudyMaterial, UpdateCoordinatorMessageRequest,
};
use crate::sync::{DashboardStats, EntitySync};
use crate::AppState;

/// Maps an entity to the hook that serves it.
pub trait HookFor<T: Entity> {
    fn hook(&self) -> &EntitySync<T>;
}

impl HookFor<Faculty> for AppState {
    fn hook(&self) -> &EntitySync<Faculty> {
        &self.site.faculty
    }
}

impl HookFor<Event> for AppState {
    fn hook(&self) -> &EntitySync<Event> {
        &self.site.events
    }
}

impl HookFor<News> for AppState {
    fn hook(&self) -> &EntitySync<News> {
        &self.site.news
    }
}

impl HookFor<Program> for AppState {
    fn hook(&self) -> &EntitySync<Program> {
        &self.site.programs
    }
}

impl HookFor<StudyMaterial> for AppState {
    fn hook(&self) -> &EntitySync<StudyMaterial> {
        &self.site.materials
    }
}

/// GET - Every cached record.
pub async fn list<T>(State(state): State<AppState>) -> ApiResult<Vec<T>>
where
    T: Entity,
    AppState: HookFor<T>,
{
    success(state.hook().items().await)
}

/// POST - Create a record.
pub async fn create<T>(
    State(state): State<AppState>,
    Json(request): Json<T::Create>,
) -> ApiResult<T>
where
    T: Entity,
    AppState: HookFor<T>,
{
    success(state.hook().create(&request).await?)
}

/// PUT /{id} - Partially update a record.
pub async fn update<T>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<T::Update>,
) -> ApiResult<T>
where
    T: Entity,
    AppState: HookFor<T>,
{
    success(state.hook().update(&id, &request).await?)
}

/// DELETE /{id} - Delete a record.
pub async fn remove<T>(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()>
where
    T: Entity,
    AppState: HookFor<T>,
{
    state.hook().remove(&id).await?;
    success(())
}

/// GET /api/faculty - Faculty directory with search, specialization filter and sort.
pub async fn list_faculty(
    State(state): State<AppState>,
    Query(filter): Query<FacultyFilter>,
) -> ApiResult<Vec<Faculty>> {
    let faculty = state.site.faculty.items().await;
    success(catalog::filter_faculty(&faculty, &filter))
}

/// GET /api/faculty/featured
pub async fn featured_faculty(State(state): State<AppState>) -> ApiResult<Vec<Faculty>> {
    success(state.site.featured_faculty.items().await)
}

/// GET /api/faculty/specializations
pub async fn faculty_specializations(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let faculty = state.site.faculty.items().await;
    success(catalog::specializations(&faculty))
}

/// GET /api/events - Events by date with search and category filter.
pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> ApiResult<Vec<Event>> {
    let events = state.site.events.items().await;
    success(catalog::filter_events(&events, &filter))
}

/// Events page sections.
#[derive(Debug, Serialize)]
pub struct EventOverview {
    pub upcoming: Vec<Event>,
    pub featured: Vec<Event>,
    pub categories: Vec<String>,
}

/// GET /api/events/overview
pub async fn events_overview(State(state): State<AppState>) -> ApiResult<EventOverview> {
    let events = state.site.events.items().await;
    success(EventOverview {
        upcoming: catalog::upcoming_events(&events),
        featured: catalog::featured_events(&events),
        categories: catalog::event_categories(&events),
    })
}

/// GET /api/news/published
pub async fn published_news(State(state): State<AppState>) -> ApiResult<Vec<News>> {
    success(state.site.published_news.items().await)
}

/// POST /api/news/{id}/view - Count one read of a news item.
pub async fn view_news(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<News> {
    success(state.site.news.increment_views(&id).await?)
}

/// GET /api/materials - Study materials with search, course, type and semester filters.
pub async fn list_materials(
    State(state): State<AppState>,
    Query(filter): Query<MaterialFilter>,
) -> ApiResult<Vec<StudyMaterial>> {
    let materials = state.site.materials.items().await;
    success(catalog::filter_materials(&materials, &filter))
}

/// GET /api/materials/semesters
pub async fn material_semesters(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let materials = state.site.materials.items().await;
    success(catalog::semesters(&materials))
}

/// POST /api/materials/{id}/download - Count a download and return the material.
pub async fn download_material(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StudyMaterial> {
    success(state.site.materials.increment_downloads(&id).await?)
}

/// POST /api/admin/events/{id}/register - Register one attendee.
pub async fn register_for_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Event> {
    success(state.site.events.increment_registrations(&id).await?)
}

/// GET /api/coordinator-message - The active message, or null.
pub async fn coordinator_message(
    State(state): State<AppState>,
) -> ApiResult<Option<CoordinatorMessage>> {
    success(state.site.coordinator.message().await)
}

/// POST /api/admin/coordinator-message - Replace the active message.
pub async fn create_coordinator_message(
    State(state): State<AppState>,
    Json(request): Json<CreateCoordinatorMessageRequest>,
) -> ApiResult<CoordinatorMessage> {
    success(state.site.coordinator.create(&request).await?)
}

/// PUT /api/admin/coordinator-message/{id}
pub async fn update_coordinator_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateCoordinatorMessageRequest>,
) -> ApiResult<CoordinatorMessage> {
    success(state.site.coordinator.update(&id, &request).await?)
}

/// GET /api/admin/stats - Fresh dashboard counts.
pub async fn dashboard_stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    success(state.site.dashboard.load().await?)
}
