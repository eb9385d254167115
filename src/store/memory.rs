//! In-process store backed by concurrent hash maps.
//!
//! Suitable for tests and single-instance deployments; nothing survives a
//! restart.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{
    AiMind, Avatar, ConversationMessage, ConversationSession, PsvsRecord, SessionFeedback, Store,
    StoreError, StoreResult,
};
use crate::psvs::PsvsTrajectory;

#[derive(Debug, Default)]
pub struct MemoryStore {
    avatars: DashMap<String, Avatar>,
    minds: DashMap<String, AiMind>,
    psvs: DashMap<String, PsvsRecord>,
    sessions: DashMap<String, ConversationSession>,
    messages: DashMap<String, Vec<ConversationMessage>>,
    /// Keyed by user id.
    feedback: DashMap<String, Vec<SessionFeedback>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn collect_sorted<T: Clone, K: Ord>(
    map: &DashMap<String, T>,
    keep: impl Fn(&T) -> bool,
    key: impl Fn(&T) -> K,
) -> Vec<T> {
    let mut out: Vec<T> = map
        .iter()
        .filter(|e| keep(e.value()))
        .map(|e| e.value().clone())
        .collect();
    out.sort_by_key(|v| key(v));
    out
}

impl Store for MemoryStore {
    fn put_avatar(&self, avatar: &Avatar) -> StoreResult<()> {
        self.avatars.insert(avatar.id.clone(), avatar.clone());
        Ok(())
    }

    fn get_avatar(&self, id: &str) -> StoreResult<Option<Avatar>> {
        Ok(self.avatars.get(id).map(|a| a.clone()))
    }

    fn list_avatars_by_pro(&self, pro_user_id: &str) -> StoreResult<Vec<Avatar>> {
        Ok(collect_sorted(
            &self.avatars,
            |a| a.pro_user_id == pro_user_id,
            |a| (a.created_at, a.id.clone()),
        ))
    }

    fn put_mind(&self, mind: &AiMind) -> StoreResult<()> {
        self.minds.insert(mind.id.clone(), mind.clone());
        Ok(())
    }

    fn get_mind(&self, id: &str) -> StoreResult<Option<AiMind>> {
        Ok(self.minds.get(id).map(|m| m.clone()))
    }

    fn list_minds_by_avatar(&self, avatar_id: &str) -> StoreResult<Vec<AiMind>> {
        Ok(collect_sorted(
            &self.minds,
            |m| m.avatar_id == avatar_id,
            |m| (m.created_at, m.id.clone()),
        ))
    }

    fn create_psvs(&self, mind_id: &str, trajectory: &PsvsTrajectory) -> StoreResult<PsvsRecord> {
        match self.psvs.entry(mind_id.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                kind: "psvs",
                id: mind_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                let record = PsvsRecord {
                    mind_id: mind_id.to_string(),
                    trajectory: trajectory.clone(),
                    version: 1,
                };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    fn get_psvs(&self, mind_id: &str) -> StoreResult<Option<PsvsRecord>> {
        Ok(self.psvs.get(mind_id).map(|r| r.clone()))
    }

    fn compare_and_swap_psvs(
        &self,
        mind_id: &str,
        expected_version: u64,
        trajectory: &PsvsTrajectory,
    ) -> StoreResult<bool> {
        // The shard write lock held by `get_mut` makes check-and-set atomic.
        let mut record = self.psvs.get_mut(mind_id).ok_or_else(|| StoreError::NotFound {
            kind: "psvs",
            id: mind_id.to_string(),
        })?;

        if record.version != expected_version {
            return Ok(false);
        }
        record.trajectory = trajectory.clone();
        record.version += 1;
        Ok(true)
    }

    fn put_session(&self, session: &ConversationSession) -> StoreResult<()> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn get_session(&self, id: &str) -> StoreResult<Option<ConversationSession>> {
        Ok(self.sessions.get(id).map(|s| s.clone()))
    }

    fn list_sessions_by_mind(&self, mind_id: &str) -> StoreResult<Vec<ConversationSession>> {
        Ok(collect_sorted(
            &self.sessions,
            |s| s.mind_id == mind_id,
            |s| (s.created_at, s.id.clone()),
        ))
    }

    fn increment_message_count(&self, session_id: &str, by: u64) -> StoreResult<u64> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "session",
                id: session_id.to_string(),
            })?;
        session.message_count += by;
        Ok(session.message_count)
    }

    fn end_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> StoreResult<ConversationSession> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "session",
                id: session_id.to_string(),
            })?;
        if session.is_active {
            session.is_active = false;
            session.ended_at = Some(ended_at);
        }
        Ok(session.clone())
    }

    fn append_message(&self, message: &ConversationMessage) -> StoreResult<()> {
        self.messages
            .entry(message.session_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    fn list_messages(&self, session_id: &str) -> StoreResult<Vec<ConversationMessage>> {
        Ok(self
            .messages
            .get(session_id)
            .map(|m| m.clone())
            .unwrap_or_default())
    }

    fn append_feedback(&self, feedback: &SessionFeedback) -> StoreResult<()> {
        self.feedback
            .entry(feedback.user_id.clone())
            .or_default()
            .push(feedback.clone());
        Ok(())
    }

    fn list_feedback_by_user(&self, user_id: &str) -> StoreResult<Vec<SessionFeedback>> {
        Ok(self
            .feedback
            .get(user_id)
            .map(|f| f.clone())
            .unwrap_or_default())
    }
}
