//! services/api/src/web/classroom.rs
//!
//! Teacher dashboard endpoints: the class roster and assignments set for it.
//! The signed-in account acts as the teacher.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use lumina_core::{Assignment, NewAssignment, RosterEntry, Subject, User};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::{reject, Rejection};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct StudentRequest {
    pub name: String,
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    #[schema(value_type = String, example = "Mathematics")]
    pub subject: Subject,
    pub title: String,
    pub description: String,
    /// Free-form date as picked in the form, e.g. `2026-11-02`.
    pub due_date: String,
}

#[utoipa::path(
    get,
    path = "/classroom/roster",
    responses((status = 200, description = "The teacher's class list"))
)]
pub async fn roster_handler(
    State(state): State<Arc<AppState>>,
    Extension(teacher): Extension<User>,
) -> Result<Json<Vec<RosterEntry>>, Rejection> {
    let roster = state.classroom.roster(&teacher.id).await.map_err(reject)?;
    Ok(Json(roster))
}

#[utoipa::path(
    post,
    path = "/classroom/roster",
    request_body = StudentRequest,
    responses(
        (status = 201, description = "Student added; the updated class list"),
        (status = 400, description = "Name or email missing")
    )
)]
pub async fn add_student_handler(
    State(state): State<Arc<AppState>>,
    Extension(teacher): Extension<User>,
    Json(req): Json<StudentRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let roster = state
        .classroom
        .add_student(
            &teacher.id,
            RosterEntry {
                name: req.name,
                email: req.email,
            },
        )
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(roster)))
}

#[utoipa::path(
    delete,
    path = "/classroom/roster/{email}",
    params(("email" = String, Path, description = "The student's email")),
    responses((status = 200, description = "The updated class list"))
)]
pub async fn remove_student_handler(
    State(state): State<Arc<AppState>>,
    Extension(teacher): Extension<User>,
    Path(email): Path<String>,
) -> Result<Json<Vec<RosterEntry>>, Rejection> {
    let roster = state
        .classroom
        .remove_student(&teacher.id, &email)
        .await
        .map_err(reject)?;
    Ok(Json(roster))
}

#[utoipa::path(
    get,
    path = "/classroom/assignments",
    responses((status = 200, description = "Assignments set by the teacher, newest first"))
)]
pub async fn list_assignments_handler(
    State(state): State<Arc<AppState>>,
    Extension(teacher): Extension<User>,
) -> Result<Json<Vec<Assignment>>, Rejection> {
    let assignments = state
        .classroom
        .assignments_for(&teacher.id)
        .await
        .map_err(reject)?;
    Ok(Json(assignments))
}

#[utoipa::path(
    post,
    path = "/classroom/assignments",
    request_body = AssignmentRequest,
    responses(
        (status = 201, description = "Assignment set for everyone on the roster"),
        (status = 400, description = "Title, description or due date missing")
    )
)]
pub async fn create_assignment_handler(
    State(state): State<Arc<AppState>>,
    Extension(teacher): Extension<User>,
    Json(req): Json<AssignmentRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let assignment = state
        .classroom
        .create_assignment(
            &teacher,
            NewAssignment {
                subject: req.subject,
                title: req.title,
                description: req.description,
                due_date: req.due_date,
            },
        )
        .await
        .map_err(reject)?;
    info!(
        "{} set '{}' for {} students.",
        teacher.name,
        assignment.title,
        assignment.student_emails.len()
    );
    Ok((StatusCode::CREATED, Json(assignment)))
}
