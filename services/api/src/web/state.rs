//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use lumina_core::ports::{
    DiagramService, HomeworkHelpService, PracticeGenerationService, RealtimeConnector,
    VideoGenerationService,
};
use lumina_core::{ClassroomStore, LatestRequest, LearningLogStore, QuizSession, SessionManager};
use std::sync::Arc;
use tokio::sync::Mutex;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// The host serves a single browser tab, so there is exactly one current-user
/// slot, one quiz in progress and one request sequence per screen.
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionManager,
    pub logs: LearningLogStore,
    pub classroom: ClassroomStore,
    pub homework: Arc<dyn HomeworkHelpService>,
    pub practice: Arc<dyn PracticeGenerationService>,
    pub diagrams: Arc<dyn DiagramService>,
    pub videos: Arc<dyn VideoGenerationService>,
    pub realtime: Arc<dyn RealtimeConnector>,
    pub screens: ScreenState,
}

/// Per-screen state the browser build kept in component memory.
#[derive(Default)]
pub struct ScreenState {
    pub quiz: Mutex<Option<QuizSession>>,
    pub homework_requests: LatestRequest,
    pub quiz_requests: LatestRequest,
    pub worksheet_requests: LatestRequest,
    pub diagram_requests: LatestRequest,
}
