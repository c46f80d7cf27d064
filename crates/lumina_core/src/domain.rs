//! crates/lumina_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! Field names serialize in camelCase so the stored JSON keeps the shape the
//! browser build of the app wrote into local storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Subjects seeded into every new student's mastery map.
pub const STARTER_SUBJECTS: [Subject; 4] = [
    Subject::Mathematics,
    Subject::Science,
    Subject::EnglishLit,
    Subject::History,
];

/// Durations (in minutes) offered when logging a study session.
pub const OFFERED_DURATIONS: [u32; 6] = [15, 30, 45, 60, 90, 120];

/// A student account: identity, profile and progress counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Plaintext shared secret, the only credential. Early records may lack one.
    #[serde(default)]
    pub secret_code: String,
    pub year_group: String,
    pub target_grade: String,
    pub avatar: String,
    pub join_date: DateTime<Utc>,
    // Older records predate XP.
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub syllabus_mastery: BTreeMap<String, u8>,
}

impl User {
    /// Mastery percentage for a subject, 0 when the subject was never tracked.
    pub fn mastery(&self, subject: &str) -> u8 {
        self.syllabus_mastery.get(subject).copied().unwrap_or(0)
    }
}

/// The fields a student fills in on the sign-up form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupProfile {
    pub name: String,
    pub secret_code: String,
    pub year_group: String,
    pub target_grade: String,
}

/// School subjects a study session can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    Mathematics,
    Science,
    #[serde(rename = "English Lit")]
    EnglishLit,
    History,
    Geography,
    Languages,
}

impl Subject {
    pub const ALL: [Subject; 6] = [
        Subject::Mathematics,
        Subject::Science,
        Subject::EnglishLit,
        Subject::History,
        Subject::Geography,
        Subject::Languages,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Subject::Mathematics => "Mathematics",
            Subject::Science => "Science",
            Subject::EnglishLit => "English Lit",
            Subject::History => "History",
            Subject::Geography => "Geography",
            Subject::Languages => "Languages",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the student felt about a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mood {
    #[serde(rename = "💡 Inspired")]
    Inspired,
    #[serde(rename = "💪 Productive")]
    Productive,
    #[serde(rename = "😴 Tired")]
    Tired,
    #[serde(rename = "🤯 Challenged")]
    Challenged,
    #[serde(rename = "🎯 Focused")]
    Focused,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::Inspired,
        Mood::Productive,
        Mood::Tired,
        Mood::Challenged,
        Mood::Focused,
    ];
}

/// One recorded study session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningLog {
    pub id: String,
    pub user_id: String,
    pub date: DateTime<Utc>,
    pub summary: String,
    pub subject: Subject,
    pub mood: Mood,
    /// Minutes spent.
    pub duration: u32,
}

/// A learning log as entered by the student, before it is stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLearningLog {
    pub summary: String,
    pub subject: Subject,
    pub mood: Mood,
    pub duration: u32,
}

/// A web page the homework helper consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// An answer from the homework helper along with the pages it cited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeworkAnswer {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// A multiple-choice practice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

/// A student on a teacher's class list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub email: String,
}

/// Homework set by a teacher for everyone on their roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub teacher_id: String,
    pub teacher_name: String,
    pub subject: Subject,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub student_emails: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Homework details as entered by the teacher.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub subject: Subject,
    pub title: String,
    pub description: String,
    pub due_date: String,
}

/// Output shapes the image model can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

/// An in-flight video generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoHandle {
    pub id: String,
}

/// Progress of a video generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStatus {
    pub done: bool,
    pub result_uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_user_without_xp_loads_with_zero() {
        let json = r#"{
            "id": "abc123",
            "name": "Charlie",
            "secretCode": "choc",
            "yearGroup": "Year 7",
            "targetGrade": "Grade 9 / A*",
            "avatar": "https://api.dicebear.com/7.x/bottts/svg?seed=Charlie",
            "joinDate": "2024-01-01T09:00:00Z"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.xp, 0);
        assert!(user.syllabus_mastery.is_empty());
        assert_eq!(user.mastery("Science"), 0);
    }

    #[test]
    fn subject_and_mood_use_display_labels_on_the_wire() {
        assert_eq!(serde_json::to_string(&Subject::EnglishLit).unwrap(), "\"English Lit\"");
        assert_eq!(serde_json::to_string(&Mood::Focused).unwrap(), "\"🎯 Focused\"");
        let mood: Mood = serde_json::from_str("\"😴 Tired\"").unwrap();
        assert_eq!(mood, Mood::Tired);
    }

    #[test]
    fn quiz_question_reads_camel_case() {
        let json = r#"{"question":"2+2?","options":["1","2","3","4"],"correctAnswer":"4","explanation":"Add."}"#;
        let q: QuizQuestion = serde_json::from_str(json).unwrap();
        assert_eq!(q.correct_answer, "4");
    }
}
