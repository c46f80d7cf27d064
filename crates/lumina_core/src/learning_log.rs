//! crates/lumina_core/src/learning_log.rs
//!
//! Append/delete store for study session records, scoped by user id.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::domain::{LearningLog, NewLearningLog};
use crate::error::{CoreResult, ValidationError};
use crate::ports::Clock;
use crate::store::{keys, CollectionStore};

pub struct LearningLogStore {
    store: CollectionStore,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl LearningLogStore {
    pub fn new(store: CollectionStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Records a study session for `user_id` and returns the stored entry.
    pub async fn add(&self, user_id: &str, entry: NewLearningLog) -> CoreResult<LearningLog> {
        ValidationError::require("summary", &entry.summary)?;

        let log = LearningLog {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            date: self.clock.now(),
            summary: entry.summary,
            subject: entry.subject,
            mood: entry.mood,
            duration: entry.duration,
        };

        let _guard = self.write_lock.lock().await;
        let mut logs: Vec<LearningLog> = self.store.load_collection(keys::LOGS).await?;
        logs.push(log.clone());
        self.store.save_collection(keys::LOGS, &logs).await?;
        info!("Saved {} minute {} log for user {}.", log.duration, log.subject, user_id);
        Ok(log)
    }

    /// The user's logs, newest first.
    pub async fn list_for(&self, user_id: &str) -> CoreResult<Vec<LearningLog>> {
        let mut logs = self.recorded_for(user_id).await?;
        logs.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(logs)
    }

    /// The user's logs in the order they were recorded.
    pub async fn recorded_for(&self, user_id: &str) -> CoreResult<Vec<LearningLog>> {
        let logs: Vec<LearningLog> = self.store.load_collection(keys::LOGS).await?;
        Ok(logs.into_iter().filter(|l| l.user_id == user_id).collect())
    }

    /// Deletes a log by id. Unknown ids are ignored.
    pub async fn remove(&self, id: &str) -> CoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let logs: Vec<LearningLog> = self.store.load_collection(keys::LOGS).await?;
        let kept: Vec<LearningLog> = logs.into_iter().filter(|l| l.id != id).collect();
        self.store.save_collection(keys::LOGS, &kept).await?;
        Ok(())
    }
}
