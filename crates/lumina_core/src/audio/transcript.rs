//! Rolling transcript of a tutoring conversation.

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Entries kept before the oldest is dropped.
pub const TRANSCRIPT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Student,
    Tutor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = match self.speaker {
            Speaker::Student => "Student",
            Speaker::Tutor => "Tutor",
        };
        write!(f, "{}: {}", who, self.text)
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptLog {
    entries: VecDeque<TranscriptEntry>,
    capacity: usize,
}

impl Default for TranscriptLog {
    fn default() -> Self {
        Self::with_capacity(TRANSCRIPT_CAPACITY)
    }
}

impl TranscriptLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) -> TranscriptEntry {
        let entry = TranscriptEntry {
            speaker,
            text: text.into(),
        };
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        entry
    }

    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
