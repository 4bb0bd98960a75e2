use diesel::prelude::*;

use folio_shared::errors::{ApiError, ApiResult};

use crate::models::{NewPortfolioProject, PortfolioProject};
use crate::schema::portfolio_projects;
use crate::DbPool;

/// List all projects in display order: `order_index` ascending, then
/// `created_at` descending. Public data, no owner filter.
pub fn list(pool: &DbPool) -> ApiResult<Vec<PortfolioProject>> {
    let mut conn = pool.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        ApiError::store("Failed to fetch projects")
    })?;

    let items = portfolio_projects::table
        .order((
            portfolio_projects::order_index.asc(),
            portfolio_projects::created_at.desc(),
        ))
        .load::<PortfolioProject>(&mut conn)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to fetch projects");
            ApiError::store("Failed to fetch projects")
        })?;

    Ok(items)
}

pub fn create(pool: &DbPool, new_project: NewPortfolioProject) -> ApiResult<PortfolioProject> {
    let mut conn = pool.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        ApiError::store("Failed to create project")
    })?;

    let project = diesel::insert_into(portfolio_projects::table)
        .values(&new_project)
        .get_result::<PortfolioProject>(&mut conn)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to insert project");
            ApiError::store("Failed to create project")
        })?;

    tracing::debug!(project_id = %project.id, title = %project.title, "project created");

    Ok(project)
}
