//! services/api/src/web/study.rs
//!
//! Handlers for the generative study screens: Homework Hero, the Practice Zone,
//! the Visual Lab and the Video Lab.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use lumina_core::generation::{diagram_prompt, wait_for_video};
use lumina_core::practice::AnswerFeedback;
use lumina_core::{
    AspectRatio, HomeworkAnswer, QuizSession, Ticket, User, ValidationError, VideoHandle,
    VideoStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::{reject, Rejection};
use crate::web::state::AppState;

/// Upper bound on status checks when a client asks the server to wait for a video.
const VIDEO_MAX_POLLS: u32 = 60;

//=========================================================================================
// API Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct HomeworkRequest {
    pub question: String,
}

#[derive(Deserialize, ToSchema)]
pub struct TopicRequest {
    pub topic: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AnswerRequest {
    pub option: String,
}

/// The quiz as the student sees it; answers stay on the server until checked.
#[derive(Serialize, ToSchema, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub question_number: usize,
    pub total_questions: usize,
    pub question: Option<String>,
    pub options: Vec<String>,
    pub score: u32,
    pub xp_gained: u64,
    pub complete: bool,
}

impl From<&QuizSession> for QuizView {
    fn from(quiz: &QuizSession) -> Self {
        let current = quiz.current_question();
        Self {
            question_number: quiz.current_index() + 1,
            total_questions: quiz.len(),
            question: current.map(|q| q.question.clone()),
            options: current.map(|q| q.options.clone()).unwrap_or_default(),
            score: quiz.score(),
            xp_gained: quiz.xp_gained(),
            complete: quiz.is_complete(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub feedback: AnswerFeedback,
    pub quiz: QuizView,
}

#[derive(Serialize, ToSchema)]
pub struct WorksheetResponse {
    pub markdown: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRequest {
    pub prompt: String,
    #[serde(default)]
    #[schema(value_type = String, example = "16:9")]
    pub aspect_ratio: AspectRatio,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagramResponse {
    pub image_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VideoRequest {
    pub prompt: String,
}

#[derive(Deserialize, Default)]
pub struct VideoStatusQuery {
    /// Keep polling on the server until the video is ready.
    #[serde(default)]
    pub wait: bool,
}

/// Replied when a newer request on the same screen replaced this one.
fn superseded() -> Rejection {
    (
        StatusCode::CONFLICT,
        "a newer request replaced this one".to_string(),
    )
}

fn accept<T>(requests: &lumina_core::LatestRequest, ticket: Ticket, result: T) -> Result<T, Rejection> {
    requests.accept(ticket, result).ok_or_else(|| {
        debug!("Discarding a stale result for ticket {:?}.", ticket);
        superseded()
    })
}

//=========================================================================================
// Homework Hero
//=========================================================================================

#[utoipa::path(
    post,
    path = "/homework",
    request_body = HomeworkRequest,
    responses(
        (status = 200, description = "A hint-first answer with its sources"),
        (status = 409, description = "A newer question replaced this one"),
        (status = 502, description = "The tutor model could not be reached")
    )
)]
pub async fn homework_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Json(req): Json<HomeworkRequest>,
) -> Result<Json<HomeworkAnswer>, Rejection> {
    ValidationError::require("question", &req.question).map_err(reject)?;
    let requests = &state.screens.homework_requests;
    let ticket = requests.begin();
    let answer = state.homework.ask(req.question.trim()).await.map_err(reject)?;
    Ok(Json(accept(requests, ticket, answer)?))
}

//=========================================================================================
// Practice Zone
//=========================================================================================

#[utoipa::path(
    post,
    path = "/practice/quiz",
    request_body = TopicRequest,
    responses(
        (status = 200, description = "A new quiz, first question showing", body = QuizView),
        (status = 409, description = "A newer quiz request replaced this one"),
        (status = 502, description = "The quiz could not be generated")
    )
)]
pub async fn start_quiz_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<TopicRequest>,
) -> Result<Json<QuizView>, Rejection> {
    ValidationError::require("topic", &req.topic).map_err(reject)?;
    let requests = &state.screens.quiz_requests;
    let ticket = requests.begin();
    let questions = state
        .practice
        .generate_quiz(req.topic.trim(), &user.year_group)
        .await
        .map_err(reject)?;
    let questions = accept(requests, ticket, questions)?;

    let quiz = QuizSession::new(questions).map_err(reject)?;
    let view = QuizView::from(&quiz);
    *state.screens.quiz.lock().await = Some(quiz);
    info!("{} started a quiz on '{}'.", user.name, req.topic.trim());
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/practice/quiz/answer",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Whether the answer was right, with the explanation"),
        (status = 404, description = "No quiz in progress"),
        (status = 409, description = "Already checked or quiz complete")
    )
)]
pub async fn answer_quiz_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, Rejection> {
    let mut slot = state.screens.quiz.lock().await;
    let quiz = slot.as_mut().ok_or_else(no_quiz)?;
    let (checked, feedback) = check_answer(quiz, &req.option)?;
    // The quiz only moves on once the XP is stored.
    if feedback.xp_awarded > 0 {
        state.sessions.award_xp(feedback.xp_awarded).await.map_err(reject)?;
    }
    *quiz = checked;
    Ok(Json(AnswerResponse {
        quiz: QuizView::from(&*quiz),
        feedback,
    }))
}

/// Checks `option` against a copy of `quiz`, leaving the original as it was.
fn check_answer(quiz: &QuizSession, option: &str) -> Result<(QuizSession, AnswerFeedback), Rejection> {
    let mut attempt = quiz.clone();
    attempt.select(option);
    let feedback = attempt.check().map_err(reject)?;
    Ok((attempt, feedback))
}

#[utoipa::path(
    post,
    path = "/practice/quiz/next",
    responses(
        (status = 200, description = "The next question, or the final score", body = QuizView),
        (status = 404, description = "No quiz in progress")
    )
)]
pub async fn next_question_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
) -> Result<Json<QuizView>, Rejection> {
    let mut slot = state.screens.quiz.lock().await;
    let quiz = slot.as_mut().ok_or_else(no_quiz)?;
    quiz.advance();
    Ok(Json(QuizView::from(&*quiz)))
}

fn no_quiz() -> Rejection {
    (StatusCode::NOT_FOUND, "no quiz in progress".to_string())
}

#[utoipa::path(
    post,
    path = "/practice/worksheet",
    request_body = TopicRequest,
    responses(
        (status = 200, description = "A printable markdown worksheet", body = WorksheetResponse),
        (status = 502, description = "The worksheet could not be generated")
    )
)]
pub async fn worksheet_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<TopicRequest>,
) -> Result<Json<WorksheetResponse>, Rejection> {
    ValidationError::require("topic", &req.topic).map_err(reject)?;
    let requests = &state.screens.worksheet_requests;
    let ticket = requests.begin();
    let markdown = state
        .practice
        .generate_worksheet(req.topic.trim(), &user.year_group)
        .await
        .map_err(reject)?;
    let markdown = accept(requests, ticket, markdown)?;
    Ok(Json(WorksheetResponse { markdown }))
}

//=========================================================================================
// Visual Lab and Video Lab
//=========================================================================================

#[utoipa::path(
    post,
    path = "/diagrams",
    request_body = DiagramRequest,
    responses(
        (status = 200, description = "The diagram as a data URL", body = DiagramResponse),
        (status = 502, description = "The image could not be generated")
    )
)]
pub async fn diagram_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Json(req): Json<DiagramRequest>,
) -> Result<Json<DiagramResponse>, Rejection> {
    ValidationError::require("prompt", &req.prompt).map_err(reject)?;
    let requests = &state.screens.diagram_requests;
    let ticket = requests.begin();
    let image_url = state
        .diagrams
        .generate_image(&diagram_prompt(&req.prompt), req.aspect_ratio)
        .await
        .map_err(reject)?;
    let image_url = accept(requests, ticket, image_url)?;
    Ok(Json(DiagramResponse { image_url }))
}

#[utoipa::path(
    post,
    path = "/videos",
    request_body = VideoRequest,
    responses(
        (status = 202, description = "Rendering started; poll /videos/{id}"),
        (status = 502, description = "The job could not be started")
    )
)]
pub async fn start_video_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Json(req): Json<VideoRequest>,
) -> Result<impl IntoResponse, Rejection> {
    ValidationError::require("prompt", &req.prompt).map_err(reject)?;
    let handle = state.videos.start(req.prompt.trim()).await.map_err(reject)?;
    Ok((StatusCode::ACCEPTED, Json(handle)))
}

/// Checks a video job once, or with `?wait=true` keeps checking until it is done.
#[utoipa::path(
    get,
    path = "/videos/{id}",
    params(
        ("id" = String, Path, description = "The video job id"),
        ("wait" = Option<bool>, Query, description = "Poll on the server until done")
    ),
    responses(
        (status = 200, description = "Whether the video is ready and where to fetch it"),
        (status = 502, description = "The status could not be fetched")
    )
)]
pub async fn video_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Path(id): Path<String>,
    Query(query): Query<VideoStatusQuery>,
) -> Result<Json<VideoStatus>, Rejection> {
    let handle = VideoHandle { id };
    let polled = if query.wait {
        wait_for_video(
            state.videos.as_ref(),
            &handle,
            state.config.video_poll_interval,
            VIDEO_MAX_POLLS,
        )
        .await
    } else {
        state.videos.status(&handle).await
    };
    Ok(Json(polled.map_err(reject)?))
}

#[utoipa::path(
    get,
    path = "/videos/{id}/content",
    params(("id" = String, Path, description = "The video job id")),
    responses(
        (status = 200, description = "The rendered MP4", content_type = "video/mp4"),
        (status = 404, description = "No such video")
    )
)]
pub async fn video_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Rejection> {
    let bytes = state
        .videos
        .download(&VideoHandle { id })
        .await
        .map_err(reject)?;
    Ok(([(header::CONTENT_TYPE, "video/mp4")], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_core::QuizQuestion;

    fn quiz() -> QuizSession {
        let questions = (1..=2)
            .map(|n| QuizQuestion {
                question: format!("Q{}", n),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer: "a".into(),
                explanation: "a is right".into(),
            })
            .collect();
        QuizSession::new(questions).unwrap()
    }

    #[test]
    fn quiz_view_hides_answers_and_tracks_progress() {
        let mut session = quiz();
        let view = QuizView::from(&session);
        assert_eq!(view.question_number, 1);
        assert_eq!(view.total_questions, 2);
        assert_eq!(view.question.as_deref(), Some("Q1"));
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("correctAnswer"));

        session.select("a");
        session.check().unwrap();
        session.advance();
        session.advance();
        let done = QuizView::from(&session);
        assert!(done.complete);
        assert_eq!(done.score, 1);
        assert_eq!(done.question, None);
        assert!(done.options.is_empty());
    }

    #[test]
    fn checking_works_on_a_copy_until_committed() {
        let session = quiz();
        let (checked, feedback) = check_answer(&session, "a").unwrap();
        assert!(feedback.correct);
        assert_eq!(feedback.xp_awarded, 25);
        assert_eq!(checked.score(), 1);
        assert_eq!(session.score(), 0);

        // An uncommitted check can be retried.
        let (_, again) = check_answer(&session, "b").unwrap();
        assert!(!again.correct);
        assert_eq!(check_answer(&checked, "a").unwrap_err().0, StatusCode::CONFLICT);
    }

    #[test]
    fn stale_results_are_rejected() {
        let requests = lumina_core::LatestRequest::new();
        let first = requests.begin();
        let second = requests.begin();
        assert_eq!(accept(&requests, first, 1).unwrap_err().0, StatusCode::CONFLICT);
        assert_eq!(accept(&requests, second, 2).unwrap(), 2);
    }
}
