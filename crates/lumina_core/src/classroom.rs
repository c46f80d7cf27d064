//! crates/lumina_core/src/classroom.rs
//!
//! Teacher-side records: a class roster per teacher and the homework they set.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Assignment, NewAssignment, RosterEntry, User};
use crate::error::{CoreResult, ValidationError};
use crate::ports::Clock;
use crate::store::{keys, CollectionStore};

pub struct ClassroomStore {
    store: CollectionStore,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl ClassroomStore {
    pub fn new(store: CollectionStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn roster(&self, teacher_id: &str) -> CoreResult<Vec<RosterEntry>> {
        Ok(self.store.load_collection(&keys::roster(teacher_id)).await?)
    }

    pub async fn add_student(&self, teacher_id: &str, student: RosterEntry) -> CoreResult<Vec<RosterEntry>> {
        ValidationError::require("name", &student.name)?;
        ValidationError::require("email", &student.email)?;

        let key = keys::roster(teacher_id);
        let _guard = self.write_lock.lock().await;
        let mut roster: Vec<RosterEntry> = self.store.load_collection(&key).await?;
        roster.push(student);
        self.store.save_collection(&key, &roster).await?;
        Ok(roster)
    }

    /// Drops every roster entry with `email`. Unknown emails are ignored.
    pub async fn remove_student(&self, teacher_id: &str, email: &str) -> CoreResult<Vec<RosterEntry>> {
        let key = keys::roster(teacher_id);
        let _guard = self.write_lock.lock().await;
        let roster: Vec<RosterEntry> = self.store.load_collection(&key).await?;
        let kept: Vec<RosterEntry> = roster.into_iter().filter(|s| s.email != email).collect();
        self.store.save_collection(&key, &kept).await?;
        Ok(kept)
    }

    /// Sets homework for everyone currently on the teacher's roster.
    pub async fn create_assignment(&self, teacher: &User, details: NewAssignment) -> CoreResult<Assignment> {
        ValidationError::require("title", &details.title)?;
        ValidationError::require("description", &details.description)?;
        ValidationError::require("dueDate", &details.due_date)?;

        let _guard = self.write_lock.lock().await;
        let roster: Vec<RosterEntry> = self.store.load_collection(&keys::roster(&teacher.id)).await?;

        let assignment = Assignment {
            id: Uuid::new_v4().to_string(),
            teacher_id: teacher.id.clone(),
            teacher_name: teacher.name.clone(),
            subject: details.subject,
            title: details.title,
            description: details.description,
            due_date: details.due_date,
            student_emails: roster.into_iter().map(|s| s.email).collect(),
            created_at: self.clock.now(),
        };

        let mut all: Vec<Assignment> = self.store.load_collection(keys::ASSIGNMENTS).await?;
        all.push(assignment.clone());
        self.store.save_collection(keys::ASSIGNMENTS, &all).await?;
        info!(
            "Teacher {} assigned '{}' to {} students.",
            teacher.id,
            assignment.title,
            assignment.student_emails.len()
        );
        Ok(assignment)
    }

    /// Homework set by `teacher_id`, newest first.
    pub async fn assignments_for(&self, teacher_id: &str) -> CoreResult<Vec<Assignment>> {
        let all: Vec<Assignment> = self.store.load_collection(keys::ASSIGNMENTS).await?;
        let mut mine: Vec<Assignment> = all.into_iter().filter(|a| a.teacher_id == teacher_id).collect();
        mine.reverse();
        Ok(mine)
    }
}
