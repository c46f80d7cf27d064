//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: sign-up, login, logout and session restore.
//! There is one current-session slot, so no cookie is issued.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use lumina_core::progress::level;
use lumina_core::{SignupProfile, User};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::{reject, Rejection};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub secret_code: String,
    pub year_group: String,
    pub target_grade: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub name: String,
    pub secret_code: String,
}

#[derive(Deserialize, ToSchema)]
pub struct MasteryUpdate {
    pub subject: String,
    pub percent: u8,
}

/// A student as shown to the client. The secret code never leaves the server.
#[derive(Serialize, ToSchema, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub year_group: String,
    pub target_grade: String,
    pub avatar: String,
    pub join_date: DateTime<Utc>,
    pub xp: u64,
    pub level: u64,
    pub syllabus_mastery: BTreeMap<String, u8>,
}

impl From<User> for StudentProfile {
    fn from(user: User) -> Self {
        Self {
            level: level(user.xp),
            id: user.id,
            name: user.name,
            email: user.email,
            year_group: user.year_group,
            target_grade: user.target_grade,
            avatar: user.avatar,
            join_date: user.join_date,
            xp: user.xp,
            syllabus_mastery: user.syllabus_mastery,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new student account and sign in
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Student created and signed in", body = StudentProfile),
        (status = 400, description = "Missing name or secret code too short"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let user = state
        .sessions
        .signup(SignupProfile {
            name: req.name,
            secret_code: req.secret_code,
            year_group: req.year_group,
            target_grade: req.target_grade,
        })
        .await
        .map_err(reject)?;
    info!("New student signed up: {}", user.name);
    Ok((StatusCode::CREATED, Json(StudentProfile::from(user))))
}

/// POST /auth/login - Sign in with name and secret code
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = StudentProfile),
        (status = 401, description = "No student matches that name and secret code")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<StudentProfile>, Rejection> {
    let user = state
        .sessions
        .login(&req.name, &req.secret_code)
        .await
        .map_err(reject)?;
    Ok(Json(user.into()))
}

/// POST /auth/logout - Clear the current session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Signed out"))
)]
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> Result<StatusCode, Rejection> {
    state.sessions.logout().await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/session - The student restored from the current-session slot, if any
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "The signed-in student", body = StudentProfile),
        (status = 204, description = "Nobody is signed in")
    )
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
) -> Result<axum::response::Response, Rejection> {
    let current = state.sessions.restore_session().await.map_err(reject)?;
    Ok(match current {
        Some(user) => Json(StudentProfile::from(user)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// PUT /profile/mastery - Set the mastery percentage of one subject
#[utoipa::path(
    put,
    path = "/profile/mastery",
    request_body = MasteryUpdate,
    responses(
        (status = 200, description = "Updated student", body = StudentProfile),
        (status = 401, description = "Nobody is signed in")
    )
)]
pub async fn mastery_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Json(req): Json<MasteryUpdate>,
) -> Result<Json<StudentProfile>, Rejection> {
    let user = state
        .sessions
        .set_mastery(&req.subject, req.percent)
        .await
        .map_err(reject)?;
    Ok(Json(user.into()))
}
