use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use folio_shared::errors::{ApiError, ApiResult, ErrorCode};
use folio_shared::types::auth::AuthUser;
use folio_shared::types::feed::{ChangeEvent, FeedTable};

use crate::models::{NewPortfolioProject, PortfolioProject};
use crate::services::project_service;
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub technologies: Option<Vec<String>>,
    #[serde(default)]
    pub live_url: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub featured: Option<bool>,
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct ProjectList {
    pub projects: Vec<PortfolioProject>,
}

#[derive(Debug, Serialize)]
pub struct ProjectEnvelope {
    pub project: PortfolioProject,
}

// --- Handlers ---

/// GET /portfolio-projects
/// Public listing in display order (order_index asc, created_at desc).
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<ProjectList>> {
    let projects = project_service::list(&state.db)?;
    Ok(Json(ProjectList { projects }))
}

/// POST /portfolio-projects
/// Create a project owned by the caller.
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Json<ProjectEnvelope>> {
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ApiError::new(ErrorCode::Validation, "title and description are required")
        })?;
    let description = req
        .description
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ApiError::new(ErrorCode::Validation, "title and description are required")
        })?;

    let new_project = NewPortfolioProject {
        user_id: auth_user.id,
        title: title.to_string(),
        description: description.to_string(),
        image_url: req.image_url.clone().filter(|s| !s.trim().is_empty()),
        technologies: req.technologies.clone().unwrap_or_default(),
        live_url: req.live_url.clone().filter(|s| !s.trim().is_empty()),
        github_url: req.github_url.clone().filter(|s| !s.trim().is_empty()),
        featured: req.featured.unwrap_or(false),
        order_index: 0,
    };

    let project = project_service::create(&state.db, new_project)?;

    // Table-wide feed: project listings are public content, so the event
    // carries no owner filter.
    let receivers = state.feed.emit(ChangeEvent::inserted(
        FeedTable::PortfolioProjects,
        project.id,
        None,
        serde_json::to_value(&project).unwrap_or_default(),
    ));
    tracing::trace!(receivers, "project change fanned out");

    Ok(Json(ProjectEnvelope { project }))
}
