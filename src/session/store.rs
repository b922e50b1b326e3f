//! 会话状态存储
//!
//! 持有当前会话与会话外的展示状态（持久错误、临时提示、调度阶段）。
//! 每个修改方法都是一次原子状态转换：校验失败时返回 SessionError，不做部分修改。
//! 会话相关的修改都带 generation，重新配置或重置后，旧的在途响应会被拒绝。

use std::time::Duration;

use tokio::time::Instant;

use crate::core::{SchedulerPhase, SessionError};
use crate::session::{Cursor, ModeSettings, ModelId, Participant, Session, SessionStatus, Turn};

/// 临时提示（到期自动失效，不影响持久错误）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub expires_at: Instant,
}

impl Notice {
    pub fn is_active(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
pub struct SessionStore {
    initial_usable_models: Vec<ModelId>,
    usable_models: Vec<ModelId>,
    session: Option<Session>,
    generation: u64,
    error: Option<String>,
    notice: Option<Notice>,
    phase: SchedulerPhase,
}

impl SessionStore {
    pub fn new(usable_models: Vec<ModelId>) -> Self {
        Self {
            initial_usable_models: usable_models.clone(),
            usable_models,
            session: None,
            generation: 0,
            error: None,
            notice: None,
            phase: SchedulerPhase::Idle,
        }
    }

    pub fn usable_models(&self) -> &[ModelId] {
        &self.usable_models
    }

    pub fn set_usable_models(&mut self, models: Vec<ModelId>) {
        self.usable_models = models;
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// 仍在有效期内的提示
    pub fn notice(&self, now: Instant) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| n.is_active(now))
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase.is_busy()
    }

    /// 一次性写入新会话：清空旧记录、游标、错误与标志，返回新的 generation
    pub fn configure(
        &mut self,
        subject: &str,
        settings: ModeSettings,
        roster: Vec<Participant>,
        cursor: Cursor,
    ) -> u64 {
        self.generation += 1;
        self.session = Some(Session::new(self.generation, subject, settings, roster, cursor));
        self.error = None;
        self.notice = None;
        self.phase = SchedulerPhase::Idle;
        self.generation
    }

    /// 回到空白会话；preserve_usable_models 为 false 时可用模型恢复为初始列表
    pub fn reset(&mut self, preserve_usable_models: bool) {
        self.generation += 1;
        self.session = None;
        self.error = None;
        self.notice = None;
        self.phase = SchedulerPhase::Idle;
        if !preserve_usable_models {
            self.usable_models = self.initial_usable_models.clone();
        }
    }

    fn active_mut(&mut self, generation: u64) -> Result<&mut Session, SessionError> {
        if generation != self.generation {
            return Err(SessionError::StaleGeneration {
                expected: self.generation,
                got: generation,
            });
        }
        let session = self.session.as_mut().ok_or(SessionError::NotConfigured)?;
        if session.is_finished() {
            return Err(SessionError::AlreadyFinished);
        }
        Ok(session)
    }

    /// 追加发言；Debate 模式下不得超过 roster × answer_limit
    pub fn append_turn(&mut self, generation: u64, turn: Turn) -> Result<usize, SessionError> {
        let session = self.active_mut(generation)?;
        if let Some(budget) = session.turn_budget() {
            if session.transcript.len() >= budget {
                return Err(SessionError::TranscriptFull { budget });
            }
        }
        if session.awaiting_synthesis() {
            return Err(SessionError::StagesExhausted);
        }
        session.transcript.push(turn);
        Ok(session.transcript.len())
    }

    pub fn advance_cursor(&mut self, generation: u64, cursor: Cursor) -> Result<(), SessionError> {
        let session = self.active_mut(generation)?;
        if cursor.participant_index >= session.roster.len() {
            return Err(SessionError::CursorOutOfRange(cursor.participant_index));
        }
        if let Some(max) = session.max_stages() {
            if cursor.stage > max {
                return Err(SessionError::StagesExhausted);
            }
        }
        session.cursor = cursor;
        Ok(())
    }

    /// 结束 Debate 会话；Conclusion 会话只能通过 set_final_artifact 结束
    pub fn finish(&mut self, generation: u64) -> Result<(), SessionError> {
        let session = self.active_mut(generation)?;
        if matches!(session.settings, ModeSettings::Conclusion(_)) {
            return Err(SessionError::ArtifactMissing);
        }
        session.status = SessionStatus::Finished;
        session.auto_progress = false;
        self.phase = SchedulerPhase::Finished;
        Ok(())
    }

    /// 写入最终结论并结束会话（仅一次，仅 Conclusion 模式）
    pub fn set_final_artifact(&mut self, generation: u64, artifact: String) -> Result<(), SessionError> {
        let session = self.active_mut(generation)?;
        if !matches!(session.settings, ModeSettings::Conclusion(_)) {
            return Err(SessionError::WrongMode);
        }
        if session.final_artifact.is_some() {
            return Err(SessionError::ArtifactAlreadySet);
        }
        session.final_artifact = Some(artifact);
        session.status = SessionStatus::Finished;
        session.auto_progress = false;
        self.phase = SchedulerPhase::Finished;
        Ok(())
    }

    /// 辩论总结：只允许在 Debate 会话结束后写入
    pub fn set_summary(&mut self, generation: u64, summary: String) -> Result<(), SessionError> {
        if generation != self.generation {
            return Err(SessionError::StaleGeneration {
                expected: self.generation,
                got: generation,
            });
        }
        let session = self.session.as_mut().ok_or(SessionError::NotConfigured)?;
        if !matches!(session.settings, ModeSettings::Debate(_)) {
            return Err(SessionError::WrongMode);
        }
        if !session.is_finished() {
            return Err(SessionError::NotFinished);
        }
        session.summary = Some(summary);
        Ok(())
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn set_notice(&mut self, text: impl Into<String>, ttl: Duration) {
        self.notice = Some(Notice {
            text: text.into(),
            expires_at: Instant::now() + ttl,
        });
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn set_phase(&mut self, phase: SchedulerPhase) {
        self.phase = phase;
    }

    /// 返回是否发生变化；已结束或未配置的会话不接受开启
    pub fn set_auto_progress(&mut self, enabled: bool) -> bool {
        match self.session.as_mut() {
            Some(session) if session.auto_progress != enabled => {
                if enabled && session.is_finished() {
                    return false;
                }
                session.auto_progress = enabled;
                true
            }
            _ => false,
        }
    }

    pub fn auto_progress(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.auto_progress)
    }

    pub fn increment_retry(&mut self) -> u32 {
        match self.session.as_mut() {
            Some(session) => {
                session.retry_count += 1;
                session.retry_count
            }
            None => 0,
        }
    }

    pub fn reset_retry(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.retry_count = 0;
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.retry_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Persona;
    use crate::session::{ConclusionSettings, DebateSettings, Side};

    fn debate_store(answer_limit: u32) -> (SessionStore, u64) {
        let mut store = SessionStore::new(vec!["a".into(), "b".into()]);
        let generation = store.configure(
            "Cats are better than dogs",
            ModeSettings::Debate(DebateSettings {
                start_model: "a".into(),
                answer_limit,
            }),
            vec![
                Participant::debater("a", Side::Affirmative),
                Participant::debater("b", Side::Negative),
            ],
            Cursor::default(),
        );
        (store, generation)
    }

    fn conclusion_store() -> (SessionStore, u64) {
        let mut store = SessionStore::new(vec![]);
        let generation = store.configure(
            "Should we adopt a four-day week?",
            ModeSettings::Conclusion(ConclusionSettings {
                final_model: "x".into(),
                require_evidence: true,
                max_stages: 3,
            }),
            vec![
                Participant::expert("x", Persona::Economist),
                Participant::expert("y", Persona::Critic),
            ],
            Cursor::default(),
        );
        (store, generation)
    }

    #[test]
    fn test_debate_transcript_bound() {
        let (mut store, generation) = debate_store(1);
        store.append_turn(generation, Turn::new("a", "Affirmative", "one", None)).unwrap();
        store.append_turn(generation, Turn::new("b", "Negative", "two", None)).unwrap();
        let err = store
            .append_turn(generation, Turn::new("a", "Affirmative", "three", None))
            .unwrap_err();
        assert_eq!(err, SessionError::TranscriptFull { budget: 2 });
        assert_eq!(store.session().unwrap().transcript.len(), 2);
    }

    #[test]
    fn test_stale_generation_rejected() {
        let (mut store, generation) = debate_store(2);
        store.reset(true);
        let err = store
            .append_turn(generation, Turn::new("a", "Affirmative", "late", None))
            .unwrap_err();
        assert!(matches!(err, SessionError::StaleGeneration { .. }));
    }

    #[test]
    fn test_finished_session_rejects_appends() {
        let (mut store, generation) = debate_store(2);
        store.finish(generation).unwrap();
        let err = store
            .append_turn(generation, Turn::new("a", "Affirmative", "more", None))
            .unwrap_err();
        assert_eq!(err, SessionError::AlreadyFinished);
        assert_eq!(store.phase(), SchedulerPhase::Finished);
    }

    #[test]
    fn test_conclusion_requires_artifact_to_finish() {
        let (mut store, generation) = conclusion_store();
        assert_eq!(store.finish(generation).unwrap_err(), SessionError::ArtifactMissing);
        store.set_final_artifact(generation, "In conclusion, yes.".into()).unwrap();
        let session = store.session().unwrap();
        assert!(session.is_finished());
        assert_eq!(session.final_artifact.as_deref(), Some("In conclusion, yes."));
        // 结束后再次写入被拒绝，原值保留
        assert!(store.set_final_artifact(generation, "again".into()).is_err());
        assert_eq!(
            store.session().unwrap().final_artifact.as_deref(),
            Some("In conclusion, yes.")
        );
    }

    #[test]
    fn test_artifact_rejected_in_debate() {
        let (mut store, generation) = debate_store(1);
        assert_eq!(
            store.set_final_artifact(generation, "x".into()).unwrap_err(),
            SessionError::WrongMode
        );
    }

    #[test]
    fn test_cursor_stage_bounded() {
        let (mut store, generation) = conclusion_store();
        store
            .advance_cursor(generation, Cursor { participant_index: 0, stage: 3 })
            .unwrap();
        assert!(store.session().unwrap().awaiting_synthesis());
        assert_eq!(
            store
                .advance_cursor(generation, Cursor { participant_index: 0, stage: 4 })
                .unwrap_err(),
            SessionError::StagesExhausted
        );
        assert_eq!(
            store
                .append_turn(generation, Turn::new("x", "Economist", "late", Some(3)))
                .unwrap_err(),
            SessionError::StagesExhausted
        );
    }

    #[test]
    fn test_auto_progress_toggle_reports_change() {
        let (mut store, _) = debate_store(1);
        assert!(!store.set_auto_progress(false));
        assert!(store.set_auto_progress(true));
        assert!(!store.set_auto_progress(true));
        assert!(store.auto_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_notice_expiry_keeps_error() {
        let (mut store, _) = debate_store(1);
        store.set_error("upstream failed");
        store.set_notice("Error: upstream failed", Duration::from_secs(5));
        assert!(store.notice(Instant::now()).is_some());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.notice(Instant::now()).is_none());
        assert_eq!(store.error(), Some("upstream failed"));
    }

    #[test]
    fn test_reset_restores_usable_models() {
        let mut store = SessionStore::new(vec!["gpt-4o".into()]);
        store.set_usable_models(vec!["other".into()]);
        store.reset(true);
        assert_eq!(store.usable_models(), ["other".to_string()]);
        store.reset(false);
        assert_eq!(store.usable_models(), ["gpt-4o".to_string()]);
        assert!(store.session().is_none());
    }

    #[test]
    fn test_retry_counter() {
        let (mut store, _) = debate_store(1);
        assert_eq!(store.increment_retry(), 1);
        assert_eq!(store.increment_retry(), 2);
        store.reset_retry();
        assert_eq!(store.retry_count(), 0);
    }
}
