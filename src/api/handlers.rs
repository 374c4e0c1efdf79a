use super::models::{
    Activity, CreateActivityRequest, EmployeeDto, EmployeeRequest, Organization,
    OrganizationRequest,
};
use super::repository::Repository;
use crate::error::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

pub async fn list_organizations(State(repo): State<Repository>) -> Json<Vec<Organization>> {
    Json(repo.list_organizations().await)
}

pub async fn get_organization(
    State(repo): State<Repository>,
    Path(id): Path<u64>,
) -> Result<Json<Organization>> {
    Ok(Json(repo.get_organization(id).await?))
}

pub async fn create_organization(
    State(repo): State<Repository>,
    Json(req): Json<OrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>)> {
    let organization = repo.create_organization(req).await?;
    Ok((StatusCode::CREATED, Json(organization)))
}

pub async fn list_employees(State(repo): State<Repository>) -> Json<Vec<EmployeeDto>> {
    Json(repo.list_employees().await)
}

pub async fn get_employee(
    State(repo): State<Repository>,
    Path(id): Path<u64>,
) -> Result<Json<EmployeeDto>> {
    Ok(Json(repo.get_employee(id).await?))
}

pub async fn create_employee(
    State(repo): State<Repository>,
    Json(req): Json<EmployeeRequest>,
) -> Result<(StatusCode, Json<EmployeeDto>)> {
    let employee = repo.create_employee(req).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

pub async fn update_employee(
    State(repo): State<Repository>,
    Path(id): Path<u64>,
    Json(req): Json<EmployeeRequest>,
) -> Result<Json<EmployeeDto>> {
    Ok(Json(repo.update_employee(id, req).await?))
}

pub async fn delete_employee(
    State(repo): State<Repository>,
    Path(id): Path<u64>,
) -> Result<StatusCode> {
    repo.delete_employee(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn award_employee(
    State(repo): State<Repository>,
    Path(id): Path<u64>,
) -> Result<Json<EmployeeDto>> {
    Ok(Json(repo.award_employee(id).await?))
}

pub async fn award_organization(
    State(repo): State<Repository>,
    Path(organization_id): Path<u64>,
) -> Result<Json<Vec<EmployeeDto>>> {
    Ok(Json(repo.award_organization(organization_id).await?))
}

pub async fn remove_award(
    State(repo): State<Repository>,
    Path(id): Path<u64>,
) -> Result<Json<EmployeeDto>> {
    Ok(Json(repo.remove_award(id).await?))
}

pub async fn list_activities(State(repo): State<Repository>) -> Json<Vec<Activity>> {
    Json(repo.list_activities().await)
}

pub async fn get_activity(
    State(repo): State<Repository>,
    Path(id): Path<u64>,
) -> Result<Json<Activity>> {
    Ok(Json(repo.get_activity(id).await?))
}

pub async fn create_activity(
    State(repo): State<Repository>,
    Json(req): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<Activity>)> {
    let activity = repo.create_activity(req).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn delete_activity(
    State(repo): State<Repository>,
    Path(id): Path<u64>,
) -> Result<StatusCode> {
    repo.delete_activity(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
