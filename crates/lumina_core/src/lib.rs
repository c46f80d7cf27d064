pub mod audio;
pub mod classroom;
pub mod domain;
pub mod error;
pub mod generation;
pub mod learning_log;
pub mod ports;
pub mod practice;
pub mod progress;
pub mod sequencing;
pub mod session;
pub mod store;

pub use classroom::ClassroomStore;
pub use domain::{
    AspectRatio, Assignment, GroundingSource, HomeworkAnswer, LearningLog, Mood, NewAssignment,
    NewLearningLog, QuizQuestion, RosterEntry, SignupProfile, Subject, User, VideoHandle, VideoStatus,
};
pub use error::{AuthError, CoreError, CoreResult, ValidationError};
pub use learning_log::LearningLogStore;
pub use ports::{
    Clock, DiagramService, HomeworkHelpService, KeyValueStore, PortError, PortResult,
    PracticeGenerationService, SystemClock, VideoGenerationService,
};
pub use practice::{AnswerFeedback, QuizError, QuizSession};
pub use progress::ProgressSummary;
pub use sequencing::{LatestRequest, Ticket};
pub use session::SessionManager;
pub use store::{CollectionStore, MemoryStore};
