//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the progress hub and learning log endpoints,
//! and the master definition for the OpenAPI specification.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Local;
use lumina_core::domain::OFFERED_DURATIONS;
use lumina_core::generation::SUGGESTED_DIAGRAMS;
use lumina_core::{Mood, NewLearningLog, ProgressSummary, Subject, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{OpenApi, ToSchema};

use crate::error::{reject, Rejection};
use crate::web::state::AppState;
use crate::web::{auth, classroom, study};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::session_handler,
        auth::mastery_handler,
        options_handler,
        dashboard_handler,
        list_logs_handler,
        create_log_handler,
        delete_log_handler,
        study::homework_handler,
        study::start_quiz_handler,
        study::answer_quiz_handler,
        study::next_question_handler,
        study::worksheet_handler,
        study::diagram_handler,
        study::start_video_handler,
        study::video_status_handler,
        study::video_content_handler,
        classroom::roster_handler,
        classroom::add_student_handler,
        classroom::remove_student_handler,
        classroom::list_assignments_handler,
        classroom::create_assignment_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::MasteryUpdate,
            auth::StudentProfile,
            LogRequest,
            FormOptions,
            study::HomeworkRequest,
            study::TopicRequest,
            study::AnswerRequest,
            study::QuizView,
            study::WorksheetResponse,
            study::DiagramRequest,
            study::DiagramResponse,
            study::VideoRequest,
            classroom::StudentRequest,
            classroom::AssignmentRequest,
        )
    ),
    tags(
        (name = "Lumina Study Buddy API", description = "Endpoints for the student study companion.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

/// A study session as entered on the learning log form.
#[derive(Deserialize, ToSchema)]
pub struct LogRequest {
    pub summary: String,
    #[schema(value_type = String, example = "Science")]
    pub subject: Subject,
    #[schema(value_type = String, example = "🎯 Focused")]
    pub mood: Mood,
    /// Minutes spent.
    pub duration: u32,
}

/// The fixed choices the study forms offer.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormOptions {
    #[schema(value_type = Vec<String>)]
    pub subjects: Vec<Subject>,
    #[schema(value_type = Vec<String>)]
    pub moods: Vec<Mood>,
    /// Minutes.
    pub durations: Vec<u32>,
    pub suggested_diagrams: Vec<String>,
}

impl FormOptions {
    fn current() -> Self {
        Self {
            subjects: Subject::ALL.to_vec(),
            moods: Mood::ALL.to_vec(),
            durations: OFFERED_DURATIONS.to_vec(),
            suggested_diagrams: SUGGESTED_DIAGRAMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/options",
    responses((status = 200, description = "Subjects, moods, durations and diagram ideas", body = FormOptions))
)]
pub async fn options_handler() -> Json<FormOptions> {
    Json(FormOptions::current())
}

//=========================================================================================
// Progress Hub
//=========================================================================================

/// Level, streak, weekly chart and recent sessions for the signed-in student.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Progress summary"),
        (status = 401, description = "Nobody is signed in")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<ProgressSummary>, Rejection> {
    let logs = state.logs.recorded_for(&user.id).await.map_err(reject)?;
    let today = Local::now().date_naive();
    Ok(Json(ProgressSummary::compute(&user, &logs, today, &Local)))
}

//=========================================================================================
// Learning Log
//=========================================================================================

/// The signed-in student's study sessions, newest first.
#[utoipa::path(
    get,
    path = "/logs",
    responses((status = 200, description = "Learning logs, newest first"))
)]
pub async fn list_logs_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, Rejection> {
    let logs = state.logs.list_for(&user.id).await.map_err(reject)?;
    Ok(Json(logs))
}

#[utoipa::path(
    post,
    path = "/logs",
    request_body = LogRequest,
    responses(
        (status = 201, description = "Log recorded"),
        (status = 400, description = "Summary is empty")
    )
)]
pub async fn create_log_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<LogRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let log = state
        .logs
        .add(
            &user.id,
            NewLearningLog {
                summary: req.summary,
                subject: req.subject,
                mood: req.mood,
                duration: req.duration,
            },
        )
        .await
        .map_err(reject)?;
    info!("{} logged {} minutes of {}.", user.name, log.duration, log.subject);
    Ok((StatusCode::CREATED, Json(log)))
}

/// Deletes a log. Unknown ids are ignored.
#[utoipa::path(
    delete,
    path = "/logs/{id}",
    params(("id" = String, Path, description = "The log id")),
    responses((status = 204, description = "Log removed"))
)]
pub async fn delete_log_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Path(id): Path<String>,
) -> Result<StatusCode, Rejection> {
    state.logs.remove(&id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}
