//! [`ChatService`]: the operations behind every HTTP route.
//!
//! Store calls are synchronous and may block (SQLite), so the async entry
//! points run them on the blocking pool via [`blocking`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::{
    AvatarUpdate, ChatError, ChatSettings, ChatTurnResult, MindUpdate, NewAvatar, NewFeedback,
    NewMind, DEFAULT_COMPLETION_TIMEOUT_SECS,
};
use crate::llms::{ChatTurn, CompletionService, Role, FALLBACK_REPLY};
use crate::prompt::compose;
use crate::psvs::{self, IndicatorScores, PsvsPosition, PsvsTrajectory};
use crate::store::models::new_id;
use crate::store::{
    AiMind, Avatar, ConversationMessage, ConversationSession, PsvsRecord, SessionFeedback, Store,
};

const MAX_SCORE: f64 = 10.0;

/// Run a synchronous service call on tokio's blocking pool.
pub async fn blocking<T, F>(f: F) -> Result<T, ChatError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ChatError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ChatError::Internal(format!("blocking task failed: {}", e)))?
}

/// Orchestrates the PSVS engine, the store and the completion service.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn Store>,
    completion: Arc<dyn CompletionService>,
    settings: ChatSettings,
}

/// Everything the completion call needs, gathered before it starts.
struct PreparedTurn {
    session_id: String,
    system_prompt: String,
    history: Vec<ChatTurn>,
    position: PsvsPosition,
    indicators: Option<IndicatorScores>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn Store>,
        completion: Arc<dyn CompletionService>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            store,
            completion,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Avatars
    // ------------------------------------------------------------------

    pub fn create_avatar(&self, req: NewAvatar) -> Result<Avatar, ChatError> {
        require("pro_user_id", &req.pro_user_id)?;
        require("name", &req.name)?;

        let avatar = Avatar {
            id: new_id(),
            pro_user_id: req.pro_user_id,
            name: req.name.trim().to_string(),
            specialty: req.specialty,
            therapeutic_approaches: req.therapeutic_approaches,
            about: req.about,
            created_at: Utc::now(),
        };
        self.store.put_avatar(&avatar)?;
        log::info!("Created avatar {} for pro {}", avatar.id, avatar.pro_user_id);
        Ok(avatar)
    }

    pub fn get_avatar(&self, id: &str) -> Result<Avatar, ChatError> {
        self.store
            .get_avatar(id)?
            .ok_or_else(|| ChatError::not_found("avatar", id))
    }

    pub fn list_avatars(&self, pro_user_id: &str) -> Result<Vec<Avatar>, ChatError> {
        Ok(self.store.list_avatars_by_pro(pro_user_id)?)
    }

    /// Owner-only edit of an avatar's profile.
    pub fn update_avatar(
        &self,
        avatar_id: &str,
        pro_user_id: &str,
        update: AvatarUpdate,
    ) -> Result<Avatar, ChatError> {
        let mut avatar = self.get_avatar(avatar_id)?;
        if avatar.pro_user_id != pro_user_id {
            return Err(ChatError::Forbidden(format!(
                "only the owning pro may edit avatar {}",
                avatar_id
            )));
        }

        if let Some(name) = update.name {
            require("name", &name)?;
            avatar.name = name.trim().to_string();
        }
        if let Some(specialty) = update.specialty {
            avatar.specialty = specialty;
        }
        if let Some(approaches) = update.therapeutic_approaches {
            avatar.therapeutic_approaches = approaches;
        }
        if let Some(about) = update.about {
            avatar.about = about;
        }

        self.store.put_avatar(&avatar)?;
        Ok(avatar)
    }

    // ------------------------------------------------------------------
    // Minds
    // ------------------------------------------------------------------

    /// Persist a new mind and seed its trajectory from the profile.
    ///
    /// The trajectory is written first, so a mind is never visible without
    /// one. A failed mind write leaves an unreachable trajectory behind.
    pub fn create_mind(&self, req: NewMind) -> Result<(AiMind, PsvsPosition), ChatError> {
        require("pro_user_id", &req.pro_user_id)?;
        require("name", &req.name)?;

        let avatar = self.get_avatar(&req.avatar_id)?;
        if avatar.pro_user_id != req.pro_user_id {
            return Err(ChatError::Forbidden(format!(
                "avatar {} belongs to another pro",
                avatar.id
            )));
        }

        let now = Utc::now();
        let mind = AiMind {
            id: new_id(),
            user_id: req.user_id,
            avatar_id: avatar.id,
            pro_user_id: req.pro_user_id,
            name: req.name.trim().to_string(),
            goals: req.goals,
            therapy_principles: req.therapy_principles,
            profile: req.profile,
            created_at: now,
            updated_at: now,
        };

        let position = psvs::estimator::estimate_at(&mind.profile, now);
        self.store
            .create_psvs(&mind.id, &PsvsTrajectory::seed(position.clone()))?;
        self.store.put_mind(&mind)?;

        log::info!(
            "Created mind {}: quadrant={} energy={} stress={:.2}",
            mind.id,
            position.quadrant(),
            position.energy_state(),
            position.stress_level()
        );
        Ok((mind, position))
    }

    pub fn get_mind(&self, id: &str) -> Result<AiMind, ChatError> {
        self.store
            .get_mind(id)?
            .ok_or_else(|| ChatError::not_found("mind", id))
    }

    pub fn list_minds(&self, avatar_id: &str) -> Result<Vec<AiMind>, ChatError> {
        Ok(self.store.list_minds_by_avatar(avatar_id)?)
    }

    /// Owner-only edit. The trajectory is left as it is; it reflects the
    /// conversation so far, not the intake data.
    pub fn update_mind(
        &self,
        mind_id: &str,
        pro_user_id: &str,
        update: MindUpdate,
    ) -> Result<AiMind, ChatError> {
        let mut mind = self.get_mind(mind_id)?;
        if mind.pro_user_id != pro_user_id {
            return Err(ChatError::Forbidden(format!(
                "only the authoring pro may edit mind {}",
                mind_id
            )));
        }

        if let Some(name) = update.name {
            require("name", &name)?;
            mind.name = name.trim().to_string();
        }
        if let Some(goals) = update.goals {
            mind.goals = goals;
        }
        if let Some(principles) = update.therapy_principles {
            mind.therapy_principles = principles;
        }
        if let Some(profile) = update.profile {
            mind.profile = profile;
        }
        mind.updated_at = Utc::now();

        self.store.put_mind(&mind)?;
        Ok(mind)
    }

    pub fn get_psvs(&self, mind_id: &str) -> Result<PsvsRecord, ChatError> {
        self.store
            .get_psvs(mind_id)?
            .ok_or_else(|| ChatError::not_found("psvs", mind_id))
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub fn start_session(&self, mind_id: &str) -> Result<ConversationSession, ChatError> {
        let mind = self.get_mind(mind_id)?;
        let session = ConversationSession {
            id: new_id(),
            mind_id: mind.id,
            avatar_id: mind.avatar_id,
            user_id: mind.user_id,
            message_count: 0,
            is_active: true,
            created_at: Utc::now(),
            ended_at: None,
        };
        self.store.put_session(&session)?;
        log::info!("Started session {} for mind {}", session.id, session.mind_id);
        Ok(session)
    }

    pub fn get_session(&self, id: &str) -> Result<ConversationSession, ChatError> {
        self.store
            .get_session(id)?
            .ok_or_else(|| ChatError::not_found("session", id))
    }

    /// Mark a session ended. Ending an ended session is a no-op.
    pub fn end_session(&self, id: &str) -> Result<ConversationSession, ChatError> {
        let before = self.get_session(id)?;
        let session = self.store.end_session(id, Utc::now())?;
        if before.is_active {
            log::info!(
                "Ended session {} after {} messages",
                session.id,
                session.message_count
            );
        }
        Ok(session)
    }

    pub fn list_sessions(&self, mind_id: &str) -> Result<Vec<ConversationSession>, ChatError> {
        self.get_mind(mind_id)?;
        Ok(self.store.list_sessions_by_mind(mind_id)?)
    }

    pub fn list_messages(&self, session_id: &str) -> Result<Vec<ConversationMessage>, ChatError> {
        self.get_session(session_id)?;
        Ok(self.store.list_messages(session_id)?)
    }

    // ------------------------------------------------------------------
    // Feedback
    // ------------------------------------------------------------------

    /// Record a client's post-session self-report.
    pub fn submit_feedback(&self, req: NewFeedback) -> Result<SessionFeedback, ChatError> {
        require("user_id", &req.user_id)?;
        let session = self.get_session(&req.session_id)?;
        if !session.user_id.is_empty() && session.user_id != req.user_id {
            return Err(ChatError::Forbidden(format!(
                "session {} belongs to another client",
                session.id
            )));
        }

        for (field, score) in [
            ("being_energy_level", req.being_energy_level),
            ("being_physical_comfort", req.being_physical_comfort),
            ("feeling_intensity", req.feeling_intensity),
            ("knowing_clarity", req.knowing_clarity),
            ("overall_rating", req.overall_rating),
        ] {
            if !(0.0..=MAX_SCORE).contains(&score) {
                return Err(ChatError::Validation(format!(
                    "{} must be between 0 and {}",
                    field, MAX_SCORE
                )));
            }
        }

        let feedback = SessionFeedback {
            id: new_id(),
            user_id: req.user_id,
            session_id: session.id,
            being_energy_level: req.being_energy_level,
            being_physical_comfort: req.being_physical_comfort,
            being_description: req.being_description,
            feeling_primary_emotion: req.feeling_primary_emotion,
            feeling_intensity: req.feeling_intensity,
            feeling_description: req.feeling_description,
            knowing_clarity: req.knowing_clarity,
            knowing_insights: req.knowing_insights,
            knowing_description: req.knowing_description,
            overall_rating: req.overall_rating,
            created_at: Utc::now(),
        };
        self.store.append_feedback(&feedback)?;
        log::info!(
            "Recorded feedback {} for session {} (rating {:.1})",
            feedback.id,
            feedback.session_id,
            feedback.overall_rating
        );
        Ok(feedback)
    }

    pub fn list_feedback(&self, user_id: &str) -> Result<Vec<SessionFeedback>, ChatError> {
        Ok(self.store.list_feedback_by_user(user_id)?)
    }

    // ------------------------------------------------------------------
    // Chat turn
    // ------------------------------------------------------------------

    /// Process one user message and produce the therapist reply.
    ///
    /// Always returns a position and some reply text once validation has
    /// passed; completion failures degrade to [`FALLBACK_REPLY`].
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<ChatTurnResult, ChatError> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ChatError::Validation("message must not be empty".into()));
        }

        let turn = {
            let service = self.clone();
            let session_id = session_id.to_string();
            let text = text.clone();
            blocking(move || service.prepare_turn(&session_id, &text)).await?
        };

        let (reply, fallback_used) = self
            .complete(&turn.system_prompt, &text, &turn.history)
            .await;

        let message_count = {
            let service = self.clone();
            let session_id = turn.session_id.clone();
            let reply = reply.clone();
            blocking(move || service.record_reply(&session_id, &reply)).await?
        };

        Ok(ChatTurnResult {
            session_id: turn.session_id,
            reply,
            position: turn.position,
            psvs_updated: turn.indicators.is_some(),
            indicators: turn.indicators,
            fallback_used,
            message_count,
        })
    }

    /// Validate, move the trajectory, store the user message and build the
    /// prompt.
    fn prepare_turn(&self, session_id: &str, text: &str) -> Result<PreparedTurn, ChatError> {
        let session = self.get_session(session_id)?;
        if !session.is_active {
            return Err(ChatError::SessionEnded(session.id));
        }
        let mind = self.get_mind(&session.mind_id)?;
        let avatar = self.get_avatar(&session.avatar_id)?;

        // Loaded before this turn is stored, so history excludes `text`.
        let history = self.recent_history(&session.id)?;

        let (position, indicators) = if psvs::should_skip_psvs_update(text) {
            log::debug!("Skipping PSVS update for short message in session {}", session.id);
            (self.get_psvs(&mind.id)?.trajectory.current().clone(), None)
        } else {
            let indicators = psvs::extract(text);
            let position = self.advance_trajectory(&mind.id, &indicators)?;
            (position, Some(indicators))
        };

        self.store.append_message(&ConversationMessage {
            id: new_id(),
            session_id: session.id.clone(),
            role: Role::User,
            content: text.to_string(),
            psvs_snapshot: Some(position.clone()),
            created_at: Utc::now(),
        })?;

        Ok(PreparedTurn {
            session_id: session.id,
            system_prompt: compose(&avatar.info(), &mind.info(), &position),
            history,
            position,
            indicators,
        })
    }

    /// Store the assistant message and bump the counter for both turns.
    fn record_reply(&self, session_id: &str, reply: &str) -> Result<u64, ChatError> {
        self.store.append_message(&ConversationMessage {
            id: new_id(),
            session_id: session_id.to_string(),
            role: Role::Assistant,
            content: reply.to_string(),
            psvs_snapshot: None,
            created_at: Utc::now(),
        })?;
        Ok(self.store.increment_message_count(session_id, 2)?)
    }

    fn recent_history(&self, session_id: &str) -> Result<Vec<ChatTurn>, ChatError> {
        let messages = self.store.list_messages(session_id)?;
        let skip = messages.len().saturating_sub(self.settings.history_window);
        Ok(messages
            .into_iter()
            .skip(skip)
            .map(|m| ChatTurn {
                role: m.role,
                content: m.content,
            })
            .collect())
    }

    /// Read, advance and compare-and-swap the trajectory, re-reading on
    /// conflict.
    fn advance_trajectory(
        &self,
        mind_id: &str,
        indicators: &IndicatorScores,
    ) -> Result<PsvsPosition, ChatError> {
        let attempts = self.settings.max_update_retries.max(1);

        for attempt in 1..=attempts {
            let record = self.get_psvs(mind_id)?;
            let mut trajectory = record.trajectory;
            let before = trajectory.current().stress_level();
            let position = trajectory.advance(indicators, Utc::now()).clone();

            if self
                .store
                .compare_and_swap_psvs(mind_id, record.version, &trajectory)?
            {
                log::debug!(
                    "PSVS update for mind {}: stress {:.2} -> {:.2} ({})",
                    mind_id,
                    before,
                    position.stress_level(),
                    position.energy_state()
                );
                return Ok(position);
            }
            log::debug!(
                "PSVS version conflict on mind {} (attempt {}/{})",
                mind_id,
                attempt,
                attempts
            );
        }

        log::warn!("PSVS update for mind {} gave up after {} attempts", mind_id, attempts);
        Err(ChatError::Conflict {
            mind_id: mind_id.to_string(),
            attempts,
        })
    }

    /// Configured completion limit, or the default when it cannot be
    /// represented as a non-zero [`Duration`].
    fn completion_limit(&self) -> Duration {
        let secs = self.settings.completion_timeout_secs;
        match Duration::try_from_secs_f64(secs) {
            Ok(limit) if !limit.is_zero() => limit,
            _ => {
                log::warn!(
                    "Invalid completion timeout {}s, using {}s",
                    secs,
                    DEFAULT_COMPLETION_TIMEOUT_SECS
                );
                Duration::from_secs_f64(DEFAULT_COMPLETION_TIMEOUT_SECS)
            }
        }
    }

    /// Completion under the configured timeout. Returns `(reply, fallback_used)`.
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[ChatTurn],
    ) -> (String, bool) {
        let limit = self.completion_limit();
        let call = self.completion.complete(system_prompt, user_message, history);

        match tokio::time::timeout(limit, call).await {
            Ok(Ok(reply)) if !reply.trim().is_empty() => (reply, false),
            Ok(Ok(_)) => {
                log::warn!("{} returned an empty reply, using fallback", self.completion.provider());
                (FALLBACK_REPLY.to_string(), true)
            }
            Ok(Err(e)) => {
                log::warn!("{} completion failed: {}", self.completion.provider(), e);
                (FALLBACK_REPLY.to_string(), true)
            }
            Err(_) => {
                log::warn!(
                    "{} completion timed out after {:?}",
                    self.completion.provider(),
                    limit
                );
                (FALLBACK_REPLY.to_string(), true)
            }
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), ChatError> {
    if value.trim().is_empty() {
        return Err(ChatError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::llms::LlmError;
    use crate::psvs::{
        AttachmentStyle, CognitionBeliefs, EmotionPattern, EnergyState, PersonalityCharacteristics,
        PersonalityProfile, Quadrant, RelationshipPattern,
    };
    use crate::store::{FeedbackEmotion, MemoryStore, StoreError, StoreResult};

    /// Completion stub that replays scripted results and records each call.
    #[derive(Default)]
    pub(crate) struct ScriptedCompletion {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        pub calls: Mutex<Vec<(String, String, Vec<ChatTurn>)>>,
    }

    impl ScriptedCompletion {
        pub fn replying(replies: &[&str]) -> Self {
            let s = Self::default();
            s.replies
                .lock()
                .extend(replies.iter().map(|r| Ok(r.to_string())));
            s
        }

        pub fn failing() -> Self {
            let s = Self::default();
            s.replies.lock().push_back(Err(LlmError::Empty));
            s
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn complete(
            &self,
            system_prompt: &str,
            user_message: &str,
            history: &[ChatTurn],
        ) -> Result<String, LlmError> {
            self.calls.lock().push((
                system_prompt.to_string(),
                user_message.to_string(),
                history.to_vec(),
            ));
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok("Tell me more.".to_string()))
        }

        fn provider(&self) -> &str {
            "scripted"
        }
    }

    /// Never answers within any reasonable timeout.
    struct StalledCompletion;

    #[async_trait]
    impl CompletionService for StalledCompletion {
        async fn complete(&self, _: &str, _: &str, _: &[ChatTurn]) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".into())
        }

        fn provider(&self) -> &str {
            "stalled"
        }
    }

    /// Store that can lose a set number of compare-and-swaps or refuse
    /// trajectory inserts. Everything else goes to a [`MemoryStore`].
    struct FaultyStore {
        inner: MemoryStore,
        /// Remaining CAS calls to lose.
        lost_cas: Mutex<u32>,
        cas_calls: Mutex<u32>,
        fail_create_psvs: bool,
    }

    impl FaultyStore {
        fn losing_cas(times: u32) -> Self {
            Self {
                inner: MemoryStore::new(),
                lost_cas: Mutex::new(times),
                cas_calls: Mutex::new(0),
                fail_create_psvs: false,
            }
        }

        fn refusing_trajectories() -> Self {
            Self {
                fail_create_psvs: true,
                ..Self::losing_cas(0)
            }
        }
    }

    impl Store for FaultyStore {
        fn put_avatar(&self, a: &Avatar) -> StoreResult<()> {
            self.inner.put_avatar(a)
        }
        fn get_avatar(&self, id: &str) -> StoreResult<Option<Avatar>> {
            self.inner.get_avatar(id)
        }
        fn list_avatars_by_pro(&self, pro: &str) -> StoreResult<Vec<Avatar>> {
            self.inner.list_avatars_by_pro(pro)
        }
        fn put_mind(&self, m: &AiMind) -> StoreResult<()> {
            self.inner.put_mind(m)
        }
        fn get_mind(&self, id: &str) -> StoreResult<Option<AiMind>> {
            self.inner.get_mind(id)
        }
        fn list_minds_by_avatar(&self, avatar_id: &str) -> StoreResult<Vec<AiMind>> {
            self.inner.list_minds_by_avatar(avatar_id)
        }
        fn create_psvs(&self, mind_id: &str, t: &PsvsTrajectory) -> StoreResult<PsvsRecord> {
            if self.fail_create_psvs {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.inner.create_psvs(mind_id, t)
        }
        fn get_psvs(&self, mind_id: &str) -> StoreResult<Option<PsvsRecord>> {
            self.inner.get_psvs(mind_id)
        }
        fn compare_and_swap_psvs(
            &self,
            mind_id: &str,
            expected_version: u64,
            t: &PsvsTrajectory,
        ) -> StoreResult<bool> {
            *self.cas_calls.lock() += 1;
            {
                let mut lost = self.lost_cas.lock();
                if *lost > 0 {
                    *lost -= 1;
                    return Ok(false);
                }
            }
            self.inner.compare_and_swap_psvs(mind_id, expected_version, t)
        }
        fn put_session(&self, s: &ConversationSession) -> StoreResult<()> {
            self.inner.put_session(s)
        }
        fn get_session(&self, id: &str) -> StoreResult<Option<ConversationSession>> {
            self.inner.get_session(id)
        }
        fn list_sessions_by_mind(&self, mind_id: &str) -> StoreResult<Vec<ConversationSession>> {
            self.inner.list_sessions_by_mind(mind_id)
        }
        fn increment_message_count(&self, session_id: &str, by: u64) -> StoreResult<u64> {
            self.inner.increment_message_count(session_id, by)
        }
        fn end_session(
            &self,
            session_id: &str,
            ended_at: chrono::DateTime<Utc>,
        ) -> StoreResult<ConversationSession> {
            self.inner.end_session(session_id, ended_at)
        }
        fn append_message(&self, m: &ConversationMessage) -> StoreResult<()> {
            self.inner.append_message(m)
        }
        fn list_messages(&self, session_id: &str) -> StoreResult<Vec<ConversationMessage>> {
            self.inner.list_messages(session_id)
        }
        fn append_feedback(&self, f: &SessionFeedback) -> StoreResult<()> {
            self.inner.append_feedback(f)
        }
        fn list_feedback_by_user(&self, user_id: &str) -> StoreResult<Vec<SessionFeedback>> {
            self.inner.list_feedback_by_user(user_id)
        }
    }

    fn service_with(completion: Arc<dyn CompletionService>) -> ChatService {
        ChatService::new(
            Arc::new(MemoryStore::new()),
            completion,
            ChatSettings::default(),
        )
    }

    pub(crate) fn expert_profile() -> PersonalityProfile {
        PersonalityProfile {
            personality: Some(PersonalityCharacteristics {
                primary_traits: vec!["introvert".into(), "analytical".into()],
                description: String::new(),
            }),
            ..Default::default()
        }
    }

    /// Avatar + mind + session; returns `(mind, session)`.
    fn setup(service: &ChatService, profile: PersonalityProfile) -> (AiMind, ConversationSession) {
        let avatar = service
            .create_avatar(NewAvatar {
                pro_user_id: "pro-1".into(),
                name: "Dr. Lin".into(),
                specialty: "Anxiety".into(),
                therapeutic_approaches: vec!["CBT".into()],
                about: String::new(),
            })
            .unwrap();
        let (mind, _) = service
            .create_mind(NewMind {
                pro_user_id: "pro-1".into(),
                avatar_id: avatar.id,
                user_id: "client-1".into(),
                name: "Sam".into(),
                goals: "Sleep better".into(),
                therapy_principles: String::new(),
                profile,
            })
            .unwrap();
        let session = service.start_session(&mind.id).unwrap();
        (mind, session)
    }

    #[test]
    fn test_create_mind_seeds_trajectory() {
        let service = service_with(Arc::new(ScriptedCompletion::default()));
        let (mind, _) = setup(&service, expert_profile());

        let record = service.get_psvs(&mind.id).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.trajectory.history().len(), 1);
        assert_eq!(record.trajectory.current().quadrant(), Quadrant::Expert);
        assert_eq!(record.trajectory.current().stress_level(), 1.5);
    }

    #[test]
    fn test_create_mind_requires_known_avatar_owned_by_pro() {
        let service = service_with(Arc::new(ScriptedCompletion::default()));
        let err = service
            .create_mind(NewMind {
                pro_user_id: "pro-1".into(),
                avatar_id: "missing".into(),
                user_id: String::new(),
                name: "Sam".into(),
                goals: String::new(),
                therapy_principles: String::new(),
                profile: PersonalityProfile::default(),
            })
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound { kind: "avatar", .. }));

        let (mind, _) = setup(&service, PersonalityProfile::default());
        let err = service
            .create_mind(NewMind {
                pro_user_id: "pro-2".into(),
                avatar_id: mind.avatar_id,
                user_id: String::new(),
                name: "Kim".into(),
                goals: String::new(),
                therapy_principles: String::new(),
                profile: PersonalityProfile::default(),
            })
            .unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));
    }

    #[test]
    fn test_update_mind_owner_only_and_no_reseed() {
        let service = service_with(Arc::new(ScriptedCompletion::default()));
        let (mind, _) = setup(&service, expert_profile());

        let err = service
            .update_mind(&mind.id, "pro-2", MindUpdate::default())
            .unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));

        let crisis = PersonalityProfile {
            emotion_pattern: Some(EmotionPattern {
                dominant_emotions: vec!["anger".into(), "fear".into()],
                emotional_stability: Some(0.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let updated = service
            .update_mind(
                &mind.id,
                "pro-1",
                MindUpdate {
                    goals: Some("Manage anger".into()),
                    profile: Some(crisis),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.goals, "Manage anger");
        assert!(updated.updated_at >= mind.updated_at);

        let record = service.get_psvs(&mind.id).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.trajectory.current().stress_level(), 1.5);
    }

    #[tokio::test]
    async fn test_agency_message_lowers_stress_and_appends_once() {
        let completion = Arc::new(ScriptedCompletion::replying(&["That sounds like a plan."]));
        let service = service_with(completion.clone());
        let profile = PersonalityProfile {
            relationship: Some(RelationshipPattern {
                attachment_style: AttachmentStyle::Anxious,
                trust_level: Some(0.0),
                ..Default::default()
            }),
            ..expert_profile()
        };
        let (mind, session) = setup(&service, profile);
        // 1.5 + 1.5 + 1.5
        let before = service.get_psvs(&mind.id).unwrap().trajectory.current().stress_level();
        assert!((before - 4.5).abs() < 1e-9);

        let result = service
            .send_message(&session.id, "I will take responsibility and handle this step by step")
            .await
            .unwrap();

        assert!(result.psvs_updated);
        assert!(!result.fallback_used);
        assert_eq!(result.reply, "That sounds like a plan.");
        assert_eq!(result.message_count, 2);
        assert!(result.position.stress_level() < before);
        assert_eq!(result.position.energy_state(), EnergyState::Positive);

        let record = service.get_psvs(&mind.id).unwrap();
        assert_eq!(record.trajectory.history().len(), 2);
        assert_eq!(record.version, 2);

        let calls = completion.calls.lock();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("You are **Dr. Lin**"));
        assert!(calls[0].2.is_empty());
    }

    #[tokio::test]
    async fn test_short_message_skips_update() {
        let service = service_with(Arc::new(ScriptedCompletion::default()));
        let (mind, session) = setup(&service, expert_profile());

        let result = service.send_message(&session.id, "ok").await.unwrap();
        assert!(!result.psvs_updated);
        assert!(result.indicators.is_none());
        assert_eq!(service.get_psvs(&mind.id).unwrap().version, 1);
        assert_eq!(result.message_count, 2);
    }

    #[tokio::test]
    async fn test_completion_failure_uses_fallback_but_keeps_update() {
        let service = service_with(Arc::new(ScriptedCompletion::failing()));
        let (mind, session) = setup(&service, expert_profile());

        let result = service
            .send_message(&session.id, "Shut up, everyone always lets me down")
            .await
            .unwrap();
        assert!(result.fallback_used);
        assert_eq!(result.reply, FALLBACK_REPLY);
        assert!(result.psvs_updated);
        assert!(result.position.stress_level() > 1.5);
        assert_eq!(service.get_psvs(&mind.id).unwrap().version, 2);

        let messages = service.list_messages(&session.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, FALLBACK_REPLY);
        assert!(messages[0].psvs_snapshot.is_some());
    }

    #[tokio::test]
    async fn test_completion_timeout_uses_fallback() {
        let service = ChatService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StalledCompletion),
            ChatSettings {
                completion_timeout_secs: 0.05,
                ..Default::default()
            },
        );
        let (mind, session) = setup(&service, expert_profile());

        let result = service
            .send_message(&session.id, "I feel like nothing ever works out")
            .await
            .unwrap();
        assert!(result.fallback_used);
        assert_eq!(result.reply, FALLBACK_REPLY);
        assert_eq!(service.get_psvs(&mind.id).unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_validation_failures_leave_trajectory_untouched() {
        let service = service_with(Arc::new(ScriptedCompletion::default()));
        let (mind, session) = setup(&service, expert_profile());

        let err = service.send_message(&session.id, "   ").await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));

        let err = service.send_message("missing", "hello there").await.unwrap_err();
        assert!(matches!(err, ChatError::NotFound { kind: "session", .. }));

        let ended = service.end_session(&session.id).unwrap();
        assert!(!ended.is_active);
        assert!(ended.ended_at.is_some());
        let err = service
            .send_message(&session.id, "I hate this, whatever")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::SessionEnded(_)));

        assert_eq!(service.get_psvs(&mind.id).unwrap().version, 1);
        assert!(service.list_messages(&session.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_passed_to_completion() {
        let completion = Arc::new(ScriptedCompletion::replying(&["First reply.", "Second reply."]));
        let service = service_with(completion.clone());
        let (_, session) = setup(&service, expert_profile());

        service.send_message(&session.id, "I can't sleep at night").await.unwrap();
        service.send_message(&session.id, "It started last month").await.unwrap();

        let calls = completion.calls.lock();
        let history = &calls[1].2;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatTurn::user("I can't sleep at night"));
        assert_eq!(history[1], ChatTurn::assistant("First reply."));
        assert_eq!(calls[1].1, "It started last month");
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_conflict() {
        let store = Arc::new(FaultyStore::losing_cas(u32::MAX));
        let service = ChatService::new(
            store.clone(),
            Arc::new(ScriptedCompletion::default()),
            ChatSettings {
                max_update_retries: 3,
                ..Default::default()
            },
        );
        let (_, session) = setup(&service, expert_profile());

        let err = service
            .send_message(&session.id, "whatever, I give up on this")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Conflict { attempts: 3, .. }));
        assert_eq!(*store.cas_calls.lock(), 3);
        assert!(store.inner.list_messages(&session.id).unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_messages_each_append_one_position() {
        // Every lost CAS means another writer committed, so ten writers need
        // at most ten attempts each.
        let service = Arc::new(ChatService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedCompletion::default()),
            ChatSettings {
                max_update_retries: 10,
                ..Default::default()
            },
        ));
        let (mind, session) = setup(&service, expert_profile());

        let mut handles = Vec::new();
        for i in 0..10 {
            let service = Arc::clone(&service);
            let session_id = session.id.clone();
            handles.push(tokio::spawn(async move {
                service
                    .send_message(&session_id, &format!("I need some help with problem {}", i))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let record = service.get_psvs(&mind.id).unwrap();
        assert_eq!(record.version, 11);
        assert_eq!(record.trajectory.history().len(), 11);
        assert_eq!(service.get_session(&session.id).unwrap().message_count, 20);
    }

    #[test]
    fn test_crisis_profile_seeds_neurotic() {
        let service = service_with(Arc::new(ScriptedCompletion::default()));
        let profile = PersonalityProfile {
            cognition_beliefs: Some(CognitionBeliefs {
                cognitive_distortions: vec!["a".into(); 10],
                self_perception: "failure".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let (mind, _) = setup(&service, profile);
        let current = service.get_psvs(&mind.id).unwrap().trajectory.current().clone();
        assert_eq!(current.energy_state(), EnergyState::Neurotic);
    }

    #[tokio::test]
    async fn test_single_lost_update_is_retried() {
        let store = Arc::new(FaultyStore::losing_cas(1));
        let service = ChatService::new(
            store.clone(),
            Arc::new(ScriptedCompletion::default()),
            ChatSettings::default(),
        );
        let (mind, session) = setup(&service, expert_profile());

        let result = service
            .send_message(&session.id, "I will call my sister tonight")
            .await
            .unwrap();
        assert!(result.psvs_updated);
        assert_eq!(*store.cas_calls.lock(), 2);

        let record = service.get_psvs(&mind.id).unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.trajectory.history().len(), 2);
        assert_eq!(*record.trajectory.current(), result.position);
    }

    #[test]
    fn test_failed_trajectory_write_leaves_no_mind() {
        let service = ChatService::new(
            Arc::new(FaultyStore::refusing_trajectories()),
            Arc::new(ScriptedCompletion::default()),
            ChatSettings::default(),
        );
        let avatar = service
            .create_avatar(NewAvatar {
                pro_user_id: "pro-1".into(),
                name: "Dr. Lin".into(),
                specialty: String::new(),
                therapeutic_approaches: Vec::new(),
                about: String::new(),
            })
            .unwrap();

        let err = service
            .create_mind(NewMind {
                pro_user_id: "pro-1".into(),
                avatar_id: avatar.id.clone(),
                user_id: "client-1".into(),
                name: "Sam".into(),
                goals: String::new(),
                therapy_principles: String::new(),
                profile: expert_profile(),
            })
            .unwrap_err();
        assert!(matches!(err, ChatError::Store(StoreError::Io(_))));
        assert!(service.list_minds(&avatar.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_falls_back_to_default() {
        for secs in [f64::INFINITY, f64::NAN, 1e300, -1.0, 0.0] {
            let service = ChatService::new(
                Arc::new(MemoryStore::new()),
                Arc::new(ScriptedCompletion::replying(&["Still here."])),
                ChatSettings {
                    completion_timeout_secs: secs,
                    ..Default::default()
                },
            );
            assert_eq!(service.completion_limit(), Duration::from_secs(30));

            let (_, session) = setup(&service, expert_profile());
            let result = service
                .send_message(&session.id, "I keep worrying about work")
                .await
                .unwrap();
            assert_eq!(result.reply, "Still here.");
            assert!(!result.fallback_used);
        }
    }

    #[tokio::test]
    async fn test_end_session_preserves_message_count() {
        let service = service_with(Arc::new(ScriptedCompletion::default()));
        let (_, session) = setup(&service, expert_profile());
        service
            .send_message(&session.id, "I can't sleep at night")
            .await
            .unwrap();

        let ended = service.end_session(&session.id).unwrap();
        assert_eq!(ended.message_count, 2);
        let first_end = ended.ended_at;
        assert!(first_end.is_some());

        let again = service.end_session(&session.id).unwrap();
        assert_eq!(again.ended_at, first_end);
        assert_eq!(again.message_count, 2);

        let err = service.end_session("missing").unwrap_err();
        assert!(matches!(err, ChatError::NotFound { kind: "session", .. }));
    }

    #[test]
    fn test_update_avatar_owner_only() {
        let service = service_with(Arc::new(ScriptedCompletion::default()));
        let (mind, _) = setup(&service, expert_profile());

        let err = service
            .update_avatar(&mind.avatar_id, "pro-2", AvatarUpdate::default())
            .unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));

        let updated = service
            .update_avatar(
                &mind.avatar_id,
                "pro-1",
                AvatarUpdate {
                    specialty: Some("Grief".into()),
                    about: Some("Ten years in practice".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.specialty, "Grief");
        assert_eq!(updated.name, "Dr. Lin");
        assert_eq!(service.get_avatar(&mind.avatar_id).unwrap(), updated);

        let err = service
            .update_avatar(
                &mind.avatar_id,
                "pro-1",
                AvatarUpdate {
                    name: Some("  ".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    fn new_feedback(user_id: &str, session_id: &str, rating: f64) -> NewFeedback {
        NewFeedback {
            user_id: user_id.into(),
            session_id: session_id.into(),
            being_energy_level: 5.0,
            being_physical_comfort: 6.0,
            being_description: None,
            feeling_primary_emotion: FeedbackEmotion::Neutral,
            feeling_intensity: 3.0,
            feeling_description: None,
            knowing_clarity: 7.5,
            knowing_insights: vec!["Naming the worry helps".into()],
            knowing_description: None,
            overall_rating: rating,
        }
    }

    #[test]
    fn test_feedback_submit_and_history() {
        let service = service_with(Arc::new(ScriptedCompletion::default()));
        let (_, session) = setup(&service, expert_profile());

        let saved = service
            .submit_feedback(new_feedback("client-1", &session.id, 8.0))
            .unwrap();
        assert_eq!(saved.session_id, session.id);
        assert_eq!(service.list_feedback("client-1").unwrap(), vec![saved]);
        assert!(service.list_feedback("client-2").unwrap().is_empty());

        let err = service
            .submit_feedback(new_feedback("client-1", &session.id, 11.0))
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));

        let err = service
            .submit_feedback(new_feedback("client-1", &session.id, f64::NAN))
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));

        let err = service
            .submit_feedback(new_feedback("client-2", &session.id, 5.0))
            .unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));

        let err = service
            .submit_feedback(new_feedback("client-1", "missing", 5.0))
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound { kind: "session", .. }));
        assert_eq!(service.list_feedback("client-1").unwrap().len(), 1);
    }
}
