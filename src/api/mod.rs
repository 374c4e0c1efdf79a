//! Organizations, employees and their award activity
//!
//! Plain CRUD over an in-memory repository. Every write route here sits under
//! `/api/` and is therefore subject to write-path admission control.

pub mod handlers;
pub mod models;
pub mod repository;

pub use repository::Repository;

use axum::{
    routing::{get, post},
    Router,
};

/// Build the API router
pub fn router(repo: Repository) -> Router {
    Router::new()
        .route(
            "/api/organizations",
            get(handlers::list_organizations).post(handlers::create_organization),
        )
        .route("/api/organizations/:id", get(handlers::get_organization))
        .route(
            "/api/organizations/:id/awards",
            post(handlers::award_organization),
        )
        .route(
            "/api/employees",
            get(handlers::list_employees).post(handlers::create_employee),
        )
        .route(
            "/api/employees/:id",
            get(handlers::get_employee)
                .put(handlers::update_employee)
                .delete(handlers::delete_employee),
        )
        .route(
            "/api/employees/organization/:id/awards",
            post(handlers::award_organization),
        )
        .route(
            "/api/employees/:id/awards",
            post(handlers::award_employee).delete(handlers::remove_award),
        )
        .route(
            "/api/activities",
            get(handlers::list_activities).post(handlers::create_activity),
        )
        .route(
            "/api/activities/:id",
            get(handlers::get_activity).delete(handlers::delete_activity),
        )
        .with_state(repo)
}
