//! Repository abstraction for avatars, minds, trajectories and sessions.
//!
//! Request handlers never touch a backend directly; they go through the
//! [`Store`] trait object held by [`crate::chat::ChatService`].
//!
//! Trajectory writes use optimistic concurrency: read a [`PsvsRecord`],
//! compute the next trajectory, then [`Store::compare_and_swap_psvs`] with
//! the version that was read. A `false` result means another writer got
//! there first and the caller must re-read.

pub mod memory;
pub mod models;
pub mod sqlite;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::psvs::PsvsTrajectory;

pub use memory::MemoryStore;
pub use models::{
    AiMind, Avatar, ConversationMessage, ConversationSession, FeedbackEmotion, PsvsRecord,
    SessionFeedback,
};
pub use sqlite::SqliteStore;

/// Errors from a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage backend. Every method is atomic with respect to the others.
pub trait Store: Send + Sync {
    fn put_avatar(&self, avatar: &Avatar) -> StoreResult<()>;
    fn get_avatar(&self, id: &str) -> StoreResult<Option<Avatar>>;
    /// Oldest first.
    fn list_avatars_by_pro(&self, pro_user_id: &str) -> StoreResult<Vec<Avatar>>;

    fn put_mind(&self, mind: &AiMind) -> StoreResult<()>;
    fn get_mind(&self, id: &str) -> StoreResult<Option<AiMind>>;
    /// Oldest first.
    fn list_minds_by_avatar(&self, avatar_id: &str) -> StoreResult<Vec<AiMind>>;

    /// Insert the seed trajectory at version 1. Fails with `AlreadyExists`
    /// if the mind already has one.
    fn create_psvs(&self, mind_id: &str, trajectory: &PsvsTrajectory) -> StoreResult<PsvsRecord>;
    fn get_psvs(&self, mind_id: &str) -> StoreResult<Option<PsvsRecord>>;
    /// Replace the trajectory only if the stored version still equals
    /// `expected_version`, bumping the version. Returns whether it was
    /// written.
    fn compare_and_swap_psvs(
        &self,
        mind_id: &str,
        expected_version: u64,
        trajectory: &PsvsTrajectory,
    ) -> StoreResult<bool>;

    fn put_session(&self, session: &ConversationSession) -> StoreResult<()>;
    fn get_session(&self, id: &str) -> StoreResult<Option<ConversationSession>>;
    /// Oldest first.
    fn list_sessions_by_mind(&self, mind_id: &str) -> StoreResult<Vec<ConversationSession>>;
    /// Atomically add `by` to the session's message counter; returns the new
    /// count.
    fn increment_message_count(&self, session_id: &str, by: u64) -> StoreResult<u64>;
    /// Atomically mark a session ended, touching only `is_active` and
    /// `ended_at`. An already ended session keeps its first `ended_at`.
    fn end_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> StoreResult<ConversationSession>;

    fn append_message(&self, message: &ConversationMessage) -> StoreResult<()>;
    /// Insertion order.
    fn list_messages(&self, session_id: &str) -> StoreResult<Vec<ConversationMessage>>;

    fn append_feedback(&self, feedback: &SessionFeedback) -> StoreResult<()>;
    /// Oldest first.
    fn list_feedback_by_user(&self, user_id: &str) -> StoreResult<Vec<SessionFeedback>>;
}

// ============================================================================
// Shared conformance checks
// ============================================================================

/// Behaviour every backend must share; run by each backend's test module.
#[cfg(test)]
pub(crate) mod conformance {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::llms::Role;
    use crate::psvs::{PersonalityProfile, PsvsPosition};

    fn avatar(id: &str, pro: &str, offset_secs: i64) -> Avatar {
        Avatar {
            id: id.into(),
            pro_user_id: pro.into(),
            name: format!("Avatar {}", id),
            specialty: "Anxiety".into(),
            therapeutic_approaches: vec!["CBT".into()],
            about: String::new(),
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    fn mind(id: &str, avatar_id: &str) -> AiMind {
        let now = Utc::now();
        AiMind {
            id: id.into(),
            user_id: "client-1".into(),
            avatar_id: avatar_id.into(),
            pro_user_id: "pro-1".into(),
            name: "Sam".into(),
            goals: "Sleep better".into(),
            therapy_principles: String::new(),
            profile: PersonalityProfile::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn trajectory(stress: f64) -> PsvsTrajectory {
        PsvsTrajectory::seed(PsvsPosition::new(-0.5, 0.5, stress, Utc::now()))
    }

    fn session(id: &str, mind_id: &str) -> ConversationSession {
        ConversationSession {
            id: id.into(),
            mind_id: mind_id.into(),
            avatar_id: "a1".into(),
            user_id: "client-1".into(),
            message_count: 0,
            is_active: true,
            created_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn avatars_round_trip(store: &dyn Store) {
        store.put_avatar(&avatar("a2", "pro-1", 10)).unwrap();
        store.put_avatar(&avatar("a1", "pro-1", 0)).unwrap();
        store.put_avatar(&avatar("a3", "pro-2", 0)).unwrap();

        assert_eq!(store.get_avatar("a1").unwrap().unwrap().name, "Avatar a1");
        assert!(store.get_avatar("missing").unwrap().is_none());

        let ids: Vec<String> = store
            .list_avatars_by_pro("pro-1")
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    pub fn minds_round_trip(store: &dyn Store) {
        store.put_mind(&mind("m1", "a1")).unwrap();
        store.put_mind(&mind("m2", "a2")).unwrap();

        let mut edited = store.get_mind("m1").unwrap().unwrap();
        edited.goals = "Fewer panic attacks".into();
        store.put_mind(&edited).unwrap();

        assert_eq!(store.get_mind("m1").unwrap().unwrap().goals, "Fewer panic attacks");
        assert_eq!(store.list_minds_by_avatar("a1").unwrap().len(), 1);
    }

    pub fn psvs_compare_and_swap(store: &dyn Store) {
        let created = store.create_psvs("m1", &trajectory(2.0)).unwrap();
        assert_eq!(created.version, 1);
        assert!(matches!(
            store.create_psvs("m1", &trajectory(2.0)),
            Err(StoreError::AlreadyExists { .. })
        ));

        assert!(store.compare_and_swap_psvs("m1", 1, &trajectory(5.0)).unwrap());
        // Stale version loses.
        assert!(!store.compare_and_swap_psvs("m1", 1, &trajectory(9.0)).unwrap());

        let record = store.get_psvs("m1").unwrap().unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.trajectory.current().stress_level(), 5.0);

        assert!(matches!(
            store.compare_and_swap_psvs("nope", 1, &trajectory(1.0)),
            Err(StoreError::NotFound { .. })
        ));
    }

    pub fn sessions_and_messages(store: &dyn Store) {
        store.put_session(&session("s1", "m1")).unwrap();
        store.put_session(&session("s2", "m1")).unwrap();
        assert_eq!(store.list_sessions_by_mind("m1").unwrap().len(), 2);

        assert_eq!(store.increment_message_count("s1", 2).unwrap(), 2);
        assert_eq!(store.increment_message_count("s1", 2).unwrap(), 4);
        assert_eq!(store.get_session("s1").unwrap().unwrap().message_count, 4);
        assert!(matches!(
            store.increment_message_count("nope", 1),
            Err(StoreError::NotFound { .. })
        ));

        for (i, role) in [Role::User, Role::Assistant, Role::User].into_iter().enumerate() {
            store
                .append_message(&ConversationMessage {
                    id: format!("msg-{}", i),
                    session_id: "s1".into(),
                    role,
                    content: format!("content {}", i),
                    psvs_snapshot: None,
                    created_at: Utc::now(),
                })
                .unwrap();
        }
        let messages = store.list_messages("s1").unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["content 0", "content 1", "content 2"]);
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(store.list_messages("s2").unwrap().is_empty());
    }

    pub fn end_session_keeps_counter(store: &dyn Store) {
        store.put_session(&session("s1", "m1")).unwrap();
        assert_eq!(store.increment_message_count("s1", 2).unwrap(), 2);

        let first_end = Utc::now();
        let ended = store.end_session("s1", first_end).unwrap();
        assert!(!ended.is_active);
        assert_eq!(ended.message_count, 2);
        assert_eq!(ended.ended_at, Some(first_end));

        // A turn that was already in flight still lands on the counter.
        assert_eq!(store.increment_message_count("s1", 2).unwrap(), 4);

        let again = store
            .end_session("s1", first_end + Duration::seconds(30))
            .unwrap();
        assert_eq!(again.ended_at, Some(first_end));
        assert_eq!(again.message_count, 4);

        let stored = store.get_session("s1").unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.message_count, 4);

        assert!(matches!(
            store.end_session("nope", first_end),
            Err(StoreError::NotFound { .. })
        ));
    }

    fn feedback(id: &str, user_id: &str, rating: f64) -> SessionFeedback {
        SessionFeedback {
            id: id.into(),
            user_id: user_id.into(),
            session_id: "s1".into(),
            being_energy_level: 6.0,
            being_physical_comfort: 7.0,
            being_description: None,
            feeling_primary_emotion: FeedbackEmotion::Anxiety,
            feeling_intensity: 4.5,
            feeling_description: Some("Calmer at the end".into()),
            knowing_clarity: 8.0,
            knowing_insights: vec!["Sleep affects mood".into()],
            knowing_description: None,
            overall_rating: rating,
            created_at: Utc::now(),
        }
    }

    pub fn feedback_by_user(store: &dyn Store) {
        store.append_feedback(&feedback("f1", "client-1", 7.0)).unwrap();
        store.append_feedback(&feedback("f2", "client-2", 3.0)).unwrap();
        store.append_feedback(&feedback("f3", "client-1", 9.0)).unwrap();

        let history = store.list_feedback_by_user("client-1").unwrap();
        let ids: Vec<&str> = history.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f3"]);
        assert_eq!(history[0].knowing_insights, vec!["Sleep affects mood"]);
        assert_eq!(history[1].feeling_primary_emotion, FeedbackEmotion::Anxiety);
        assert!(store.list_feedback_by_user("nobody").unwrap().is_empty());
    }
}
