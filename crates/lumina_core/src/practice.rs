//! crates/lumina_core/src/practice.rs
//!
//! Practice Zone quiz state: one generated quiz worked through question by question.

use serde::Serialize;

use crate::domain::QuizQuestion;
use crate::ports::{PortError, PortResult};
use crate::progress::XP_PER_CORRECT_ANSWER;

/// Questions asked for per generated quiz.
pub const QUIZ_LENGTH: usize = 10;

/// Fewest options a generated question may offer.
pub const MIN_OPTIONS: usize = 4;

/// Rejects generated quizzes that do not match the expected shape.
pub fn validate_quiz(questions: &[QuizQuestion]) -> PortResult<()> {
    if questions.is_empty() {
        return Err(PortError::Unexpected("quiz came back with no questions".to_string()));
    }
    for (i, q) in questions.iter().enumerate() {
        if q.question.trim().is_empty() || q.correct_answer.trim().is_empty() {
            return Err(PortError::Unexpected(format!("question {} is incomplete", i + 1)));
        }
        if q.options.len() < MIN_OPTIONS {
            return Err(PortError::Unexpected(format!(
                "question {} has {} options, expected at least {}",
                i + 1,
                q.options.len(),
                MIN_OPTIONS
            )));
        }
        if !q.options.contains(&q.correct_answer) {
            return Err(PortError::Unexpected(format!(
                "question {} has an answer that is not one of its options",
                i + 1
            )));
        }
    }
    Ok(())
}

/// Result of checking the selected answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub correct_answer: String,
    pub explanation: String,
    /// XP to credit the student for this answer.
    pub xp_awarded: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    #[error("no answer has been selected")]
    NothingSelected,
    #[error("this question has already been checked")]
    AlreadyChecked,
    #[error("the quiz is complete")]
    Complete,
}

/// A quiz in progress.
#[derive(Debug, Clone, Serialize)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    current: usize,
    selected: Option<String>,
    checked: bool,
    score: u32,
    xp_gained: u64,
    complete: bool,
}

impl QuizSession {
    pub fn new(questions: Vec<QuizQuestion>) -> PortResult<Self> {
        validate_quiz(&questions)?;
        Ok(Self {
            questions,
            current: 0,
            selected: None,
            checked: false,
            score: 0,
            xp_gained: 0,
            complete: false,
        })
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        if self.complete {
            None
        } else {
            self.questions.get(self.current)
        }
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn xp_gained(&self) -> u64 {
        self.xp_gained
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Picks an option. Ignored once the answer has been checked.
    pub fn select(&mut self, option: &str) {
        if !self.checked && !self.complete {
            self.selected = Some(option.to_string());
        }
    }

    /// Marks the selected option and reports the XP it earned.
    pub fn check(&mut self) -> Result<AnswerFeedback, QuizError> {
        if self.complete {
            return Err(QuizError::Complete);
        }
        if self.checked {
            return Err(QuizError::AlreadyChecked);
        }
        let selected = self.selected.as_deref().ok_or(QuizError::NothingSelected)?;
        let question = &self.questions[self.current];
        let correct = selected == question.correct_answer;

        let xp_awarded = if correct { XP_PER_CORRECT_ANSWER } else { 0 };
        let feedback = AnswerFeedback {
            correct,
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
            xp_awarded,
        };

        self.checked = true;
        if correct {
            self.score += 1;
            self.xp_gained += xp_awarded;
        }
        Ok(feedback)
    }

    /// Moves on to the next question, or completes the quiz after the last one.
    pub fn advance(&mut self) {
        if self.current + 1 < self.questions.len() {
            self.current += 1;
            self.selected = None;
            self.checked = false;
        } else {
            self.complete = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str, answer: &str) -> QuizQuestion {
        QuizQuestion {
            question: text.to_string(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            correct_answer: answer.to_string(),
            explanation: "Count them up.".to_string(),
        }
    }

    #[test]
    fn correct_answers_earn_xp() {
        let mut quiz = QuizSession::new(vec![question("2+2", "4"), question("2+3", "5")]).unwrap();

        quiz.select("4");
        let first = quiz.check().unwrap();
        assert!(first.correct);
        assert_eq!(first.xp_awarded, 25);

        quiz.advance();
        quiz.select("6");
        let second = quiz.check().unwrap();
        assert!(!second.correct);
        assert_eq!(second.correct_answer, "5");
        assert_eq!(second.xp_awarded, 0);

        quiz.advance();
        assert!(quiz.is_complete());
        assert_eq!(quiz.score(), 1);
        assert_eq!(quiz.xp_gained(), 25);
        assert!(quiz.current_question().is_none());
    }

    #[test]
    fn answer_cannot_be_changed_or_rechecked() {
        let mut quiz = QuizSession::new(vec![question("2+2", "4")]).unwrap();
        assert_eq!(quiz.check().unwrap_err(), QuizError::NothingSelected);

        quiz.select("3");
        quiz.check().unwrap();
        quiz.select("4");
        assert_eq!(quiz.check().unwrap_err(), QuizError::AlreadyChecked);
        assert_eq!(quiz.score(), 0);
    }

    #[test]
    fn malformed_quizzes_are_rejected() {
        assert!(QuizSession::new(Vec::new()).is_err());

        let mut short = question("2+2", "4");
        short.options.truncate(3);
        assert!(validate_quiz(&[short]).is_err());

        let blank = question(" ", "4");
        assert!(validate_quiz(&[blank]).is_err());

        let unanswerable = question("2+2", "four");
        assert!(validate_quiz(&[question("2+2", "4"), unanswerable]).is_err());
    }
}
