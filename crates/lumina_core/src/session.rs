//! crates/lumina_core/src/session.rs
//!
//! The session manager owns the single logged-in student for this host.
//!
//! The current user lives in two places: the `current_user` slot and its record
//! inside the `users` collection. Every mutation goes through one locked
//! read-modify-write that updates both, so the copies cannot drift apart.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{SignupProfile, User, STARTER_SUBJECTS};
use crate::error::{AuthError, CoreError, CoreResult, ValidationError};
use crate::ports::Clock;
use crate::store::{keys, CollectionStore};

/// Shortest secret code accepted at sign-up.
pub const MIN_SECRET_CODE_LEN: usize = 3;

pub struct SessionManager {
    store: CollectionStore,
    clock: Arc<dyn Clock>,
    /// Serializes every read-modify-write of `users` and `current_user`.
    write_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: CollectionStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the logged-in student, if any.
    pub async fn restore_session(&self) -> CoreResult<Option<User>> {
        Ok(self.store.load_slot(keys::CURRENT_USER).await?)
    }

    pub async fn login(&self, name: &str, secret_code: &str) -> CoreResult<User> {
        let _guard = self.write_lock.lock().await;
        let wanted = name.trim().to_lowercase();

        let users: Vec<User> = self.store.load_collection(keys::USERS).await?;
        let user = users
            .into_iter()
            .find(|u| {
                !u.secret_code.is_empty()
                    && u.name.to_lowercase() == wanted
                    && u.secret_code == secret_code
            })
            .ok_or(AuthError::NotFound)?;

        self.store.save_slot(keys::CURRENT_USER, &user).await?;
        info!("Student '{}' logged in.", user.name);
        Ok(user)
    }

    pub async fn signup(&self, profile: SignupProfile) -> CoreResult<User> {
        let name = profile.name.trim().to_string();
        ValidationError::require("name", &name)?;

        let _guard = self.write_lock.lock().await;
        let mut users: Vec<User> = self.store.load_collection(keys::USERS).await?;

        let lowered = name.to_lowercase();
        if users.iter().any(|u| u.name.to_lowercase() == lowered) {
            return Err(AuthError::NameTaken.into());
        }
        if profile.secret_code.chars().count() < MIN_SECRET_CODE_LEN {
            return Err(AuthError::WeakCode.into());
        }

        let syllabus_mastery: BTreeMap<String, u8> = STARTER_SUBJECTS
            .iter()
            .map(|s| (s.label().to_string(), 0))
            .collect();

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: student_email(&name),
            avatar: avatar_url(&name),
            name,
            secret_code: profile.secret_code,
            year_group: profile.year_group,
            target_grade: profile.target_grade,
            join_date: self.clock.now(),
            xp: 0,
            syllabus_mastery,
        };

        users.push(user.clone());
        self.store.save_collection(keys::USERS, &users).await?;
        self.store.save_slot(keys::CURRENT_USER, &user).await?;
        info!("Signed up new student '{}' ({}).", user.name, user.id);
        Ok(user)
    }

    /// Writes `updated` to the current slot and to its record in `users`.
    ///
    /// If no stored record shares its id the collection is left untouched; the
    /// slot is still overwritten.
    pub async fn update_user(&self, updated: User) -> CoreResult<User> {
        let _guard = self.write_lock.lock().await;
        self.write_both(&updated).await?;
        Ok(updated)
    }

    /// Applies `change` to the current user and persists the result.
    pub async fn modify_current<F>(&self, change: F) -> CoreResult<User>
    where
        F: FnOnce(&mut User),
    {
        let _guard = self.write_lock.lock().await;
        let mut user: User = self
            .store
            .load_slot(keys::CURRENT_USER)
            .await?
            .ok_or(AuthError::NotFound)?;
        change(&mut user);
        self.write_both(&user).await?;
        Ok(user)
    }

    pub async fn award_xp(&self, amount: u64) -> CoreResult<User> {
        let user = self
            .modify_current(|u| u.xp = u.xp.saturating_add(amount))
            .await?;
        debug!("Awarded {} XP to '{}', now {}.", amount, user.name, user.xp);
        Ok(user)
    }

    /// Sets a subject's mastery percentage, clamped to 100.
    pub async fn set_mastery(&self, subject: &str, percent: u8) -> CoreResult<User> {
        let subject = subject.trim().to_string();
        ValidationError::require("subject", &subject)?;
        self.modify_current(|u| {
            u.syllabus_mastery.insert(subject, percent.min(100));
        })
        .await
    }

    /// Clears the current slot. The stored roster of users is not touched.
    pub async fn logout(&self) -> CoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.clear_slot(keys::CURRENT_USER).await?;
        info!("Student logged out.");
        Ok(())
    }

    async fn write_both(&self, user: &User) -> Result<(), CoreError> {
        let mut users: Vec<User> = self.store.load_collection(keys::USERS).await?;
        if let Some(existing) = users.iter_mut().find(|u| u.id == user.id) {
            *existing = user.clone();
            self.store.save_collection(keys::USERS, &users).await?;
        }
        self.store.save_slot(keys::CURRENT_USER, user).await?;
        Ok(())
    }
}

/// Placeholder address so every student has one for class rosters.
fn student_email(name: &str) -> String {
    let local = name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(".");
    format!("{}@lumina.student", local)
}

fn avatar_url(name: &str) -> String {
    format!(
        "https://api.dicebear.com/7.x/bottts/svg?seed={}",
        name.replace(' ', "%20")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::KeyValueStore;
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn manager() -> (CollectionStore, SessionManager) {
        let store = CollectionStore::new(Arc::new(MemoryStore::new()));
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()));
        (store.clone(), SessionManager::new(store, clock))
    }

    fn profile(name: &str, code: &str) -> SignupProfile {
        SignupProfile {
            name: name.to_string(),
            secret_code: code.to_string(),
            year_group: "Year 7".to_string(),
            target_grade: "Expected Standard".to_string(),
        }
    }

    #[tokio::test]
    async fn signup_then_login_any_case_returns_same_user() {
        let (_, sessions) = manager();
        let created = sessions.signup(profile("  Charlie Bucket ", "golden")).await.unwrap();
        assert_eq!(created.name, "Charlie Bucket");
        assert_eq!(created.email, "charlie.bucket@lumina.student");
        assert_eq!(created.xp, 0);
        assert_eq!(created.syllabus_mastery.len(), 4);
        assert_eq!(created.mastery("English Lit"), 0);

        sessions.logout().await.unwrap();
        let logged_in = sessions.login("CHARLIE bucket", "golden").await.unwrap();
        assert_eq!(logged_in.id, created.id);
        assert_eq!(sessions.restore_session().await.unwrap(), Some(logged_in));
    }

    #[tokio::test]
    async fn login_requires_exact_secret() {
        let (_, sessions) = manager();
        sessions.signup(profile("Violet", "gum123")).await.unwrap();
        let err = sessions.login("violet", "GUM123").await.unwrap_err();
        assert_eq!(err, CoreError::Auth(AuthError::NotFound));
        let err = sessions.login("Veruca", "gum123").await.unwrap_err();
        assert_eq!(err, CoreError::Auth(AuthError::NotFound));
    }

    #[tokio::test]
    async fn signup_rejects_case_insensitive_duplicate() {
        let (_, sessions) = manager();
        sessions.signup(profile("Mike", "tv1")).await.unwrap();
        let err = sessions.signup(profile("mIKE", "other")).await.unwrap_err();
        assert_eq!(err, CoreError::Auth(AuthError::NameTaken));
    }

    #[tokio::test]
    async fn signup_secret_length_boundary() {
        let (_, sessions) = manager();
        let err = sessions.signup(profile("Augustus", "ab")).await.unwrap_err();
        assert_eq!(err, CoreError::Auth(AuthError::WeakCode));
        assert!(sessions.signup(profile("Augustus", "abc")).await.is_ok());
    }

    #[tokio::test]
    async fn signup_rejects_blank_name() {
        let (_, sessions) = manager();
        let err = sessions.signup(profile("   ", "abc")).await.unwrap_err();
        assert_eq!(err, CoreError::Validation(ValidationError::new("name")));
    }

    #[tokio::test]
    async fn update_user_writes_slot_and_collection() {
        let (store, sessions) = manager();
        let mut user = sessions.signup(profile("Grandpa Joe", "bed")).await.unwrap();
        user.xp = 1_250;
        user.syllabus_mastery.insert("Science".to_string(), 40);

        sessions.update_user(user.clone()).await.unwrap();

        assert_eq!(sessions.restore_session().await.unwrap(), Some(user.clone()));
        let users: Vec<User> = store.load_collection(keys::USERS).await.unwrap();
        assert_eq!(users, vec![user]);
    }

    #[tokio::test]
    async fn update_of_unknown_user_only_touches_slot() {
        let (store, sessions) = manager();
        let known = sessions.signup(profile("Wonka", "choc")).await.unwrap();
        let mut stranger = known.clone();
        stranger.id = "not-stored".to_string();

        sessions.update_user(stranger.clone()).await.unwrap();

        assert_eq!(sessions.restore_session().await.unwrap(), Some(stranger));
        let users: Vec<User> = store.load_collection(keys::USERS).await.unwrap();
        assert_eq!(users, vec![known]);
    }

    #[tokio::test]
    async fn concurrent_xp_awards_are_not_lost() {
        let (store, sessions) = manager();
        let sessions = Arc::new(sessions);
        sessions.signup(profile("Oompa", "loompa")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sessions = sessions.clone();
            handles.push(tokio::spawn(async move { sessions.award_xp(25).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let current = sessions.restore_session().await.unwrap().unwrap();
        assert_eq!(current.xp, 200);
        let users: Vec<User> = store.load_collection(keys::USERS).await.unwrap();
        assert_eq!(users[0].xp, 200);
    }

    #[tokio::test]
    async fn mastery_is_clamped_and_requires_login() {
        let (_, sessions) = manager();
        let err = sessions.set_mastery("Science", 50).await.unwrap_err();
        assert_eq!(err, CoreError::Auth(AuthError::NotFound));

        sessions.signup(profile("Charlie", "abc")).await.unwrap();
        let user = sessions.set_mastery("Science", 180).await.unwrap();
        assert_eq!(user.mastery("Science"), 100);
    }

    #[tokio::test]
    async fn odd_user_records_survive_signup() {
        let backend = MemoryStore::new();
        let store = CollectionStore::new(Arc::new(backend.clone()));
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()));
        let sessions = SessionManager::new(store, clock);
        let record = |id: &str, name: &str, extra: &str| {
            format!(
                r#"{{"id":"{id}","name":"{name}","yearGroup":"Year 8","targetGrade":"A",
                "avatar":"x","joinDate":"2024-01-01T00:00:00Z"{extra}}}"#
            )
        };
        let seeded = format!(
            "[{},{},{}]",
            record("a", "Alice", r#","secretCode":"abc""#),
            record("b", "Bob", ""),
            record("d", "Dora", r#","secretCode":"xyz","syllabusMastery":{"Science":300}"#),
        );
        backend.set(keys::USERS, &seeded).await.unwrap();

        assert_eq!(sessions.login("alice", "abc").await.unwrap().id, "a");
        // A record without a secret loads but can never be logged into.
        let err = sessions.login("bob", "").await.unwrap_err();
        assert_eq!(err, CoreError::Auth(AuthError::NotFound));

        sessions.signup(profile("Carol", "def")).await.unwrap();
        let raw = backend.raw(keys::USERS).unwrap();
        for name in ["Alice", "Bob", "Carol", "Dora"] {
            assert!(raw.contains(name), "{} missing from {}", name, raw);
        }
    }

    #[tokio::test]
    async fn logout_keeps_user_collection() {
        let (store, sessions) = manager();
        sessions.signup(profile("Charlie", "abc")).await.unwrap();
        sessions.logout().await.unwrap();
        assert!(sessions.restore_session().await.unwrap().is_none());
        let users: Vec<User> = store.load_collection(keys::USERS).await.unwrap();
        assert_eq!(users.len(), 1);
    }
}
