//! 轮次调度器：会话的唯一驱动者
//!
//! 状态机：Idle → Acting → (成功 | Retrying | Halted) → Idle | Finished
//!
//! - 手动 step 与自动推进共用同一入口 drive，由单飞标志保证同一时刻最多一个网关调用
//! - 成功：追加发言、推进游标；Debate 达到 roster × answer_limit 即结束，Conclusion 阶段用尽后发起一次最终结论
//! - 失败：交给 RetryPolicy，只有自动推进时才重试（退避后重发同一动作），否则中止并关闭自动推进
//! - 重新配置 / 重置会递增 generation，之后返回的旧响应直接丢弃

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerSection;
use crate::core::{
    AutoProgress, ConfigError, RecoveryAction, RetryPolicy, SchedulerEvent, SchedulerPhase,
    SessionError, StepOutcome, TurnError,
};
use crate::llm::{GatewayReply, InvocationMode, ModelGateway};
use crate::presentation::SessionView;
use crate::prompt::{stage_prompt, summary_prompt, synthesis_prompt, turn_prompt, StagePromptContext};
use crate::session::{
    ConclusionSetup, Cursor, DebateSetup, ModeSettings, ModelId, Participant, Session,
    SessionStore, Side, Turn, ValidatedSetup, MAX_CONVERSATION_STAGES,
};

/// 调度参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub retry: RetryPolicy,
    /// 自动推进时两次发言之间的间隔
    pub turn_delay: Duration,
    /// 临时提示的有效期
    pub notice_ttl: Duration,
    /// Conclusion 模式的讨论阶段数
    pub max_stages: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            turn_delay: Duration::from_millis(1000),
            notice_ttl: Duration::from_secs(5),
            max_stages: MAX_CONVERSATION_STAGES,
        }
    }
}

impl From<&SchedulerSection> for SchedulerSettings {
    fn from(section: &SchedulerSection) -> Self {
        Self {
            retry: RetryPolicy::new(section.max_retry, Duration::from_millis(section.retry_backoff_ms)),
            turn_delay: Duration::from_millis(section.turn_delay_ms),
            notice_ttl: Duration::from_secs(section.notice_ttl_secs),
            max_stages: section.max_conversation_stages.max(1),
        }
    }
}

/// 一次逻辑动作：普通发言或最终结论
#[derive(Debug, Clone)]
enum Action {
    Turn {
        model: ModelId,
        role_id: Option<String>,
        role_label: String,
        stage: u32,
        mode: InvocationMode,
        prompt: String,
    },
    Synthesis {
        model: ModelId,
        prompt: String,
    },
}

impl Action {
    fn model(&self) -> &str {
        match self {
            Self::Turn { model, .. } | Self::Synthesis { model, .. } => model,
        }
    }
}

/// 失败处理后的走向
enum Flow {
    Retry,
    Halt(String),
    Discarded,
}

/// 单飞守卫：drop 时释放
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 根据当前会话决定下一个动作；未配置或已结束返回 None
fn plan(session: &Session) -> Option<Action> {
    if session.is_finished() {
        return None;
    }
    match &session.settings {
        ModeSettings::Debate(_) => {
            let actor = session.current_participant()?;
            let side = actor.side.unwrap_or(Side::Affirmative);
            Some(Action::Turn {
                model: actor.name.clone(),
                role_id: None,
                role_label: side.to_string(),
                stage: session.cursor.stage,
                mode: InvocationMode::Debate,
                prompt: turn_prompt(&session.subject, &session.transcript, actor),
            })
        }
        ModeSettings::Conclusion(settings) if session.awaiting_synthesis() => Some(Action::Synthesis {
            model: settings.final_model.clone(),
            prompt: synthesis_prompt(
                &session.subject,
                &settings.final_model,
                &session.transcript,
                settings.require_evidence,
            ),
        }),
        ModeSettings::Conclusion(settings) => {
            let actor = session.current_participant()?;
            let persona = actor.persona();
            let prompt = stage_prompt(&StagePromptContext {
                subject: &session.subject,
                stage: session.cursor.stage,
                max_stages: settings.max_stages,
                actor,
                transcript: &session.transcript,
            });
            Some(Action::Turn {
                model: actor.name.clone(),
                role_id: Some(persona.role_id().to_string()),
                role_label: persona.role_name(),
                stage: session.cursor.stage,
                mode: InvocationMode::Conclusion,
                prompt,
            })
        }
    }
}

/// 发言后的游标：下一位参与者，名单轮完则进入下一阶段
fn next_cursor(cursor: Cursor, roster_len: usize) -> Cursor {
    let participant_index = (cursor.participant_index + 1) % roster_len.max(1);
    let stage = if participant_index == 0 { cursor.stage + 1 } else { cursor.stage };
    Cursor { participant_index, stage }
}

pub struct TurnScheduler {
    store: RwLock<SessionStore>,
    gateway: ModelGateway,
    settings: SchedulerSettings,
    in_flight: AtomicBool,
    auto: AutoProgress,
    events: broadcast::Sender<SchedulerEvent>,
}

impl TurnScheduler {
    pub fn new(gateway: ModelGateway, usable_models: Vec<ModelId>, settings: SchedulerSettings) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store: RwLock::new(SessionStore::new(usable_models)),
            gateway,
            settings,
            in_flight: AtomicBool::new(false),
            auto: AutoProgress::new(),
            events,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SchedulerEvent) {
        // 没有订阅者时发送失败，忽略
        let _ = self.events.send(event);
    }

    fn set_phase(&self, store: &mut SessionStore, phase: SchedulerPhase) {
        if store.phase() != phase {
            store.set_phase(phase);
            self.emit(SchedulerEvent::PhaseChanged { phase });
        }
    }

    // ---- 配置 ----

    pub async fn configure_debate(
        &self,
        subject: &str,
        roster: Vec<Participant>,
        start_model: Option<&str>,
        answer_limit: u32,
    ) -> Result<String, ConfigError> {
        let setup = DebateSetup::new(subject, roster, start_model, answer_limit).validate()?;
        Ok(self.activate(setup).await)
    }

    pub async fn configure_conclusion(
        &self,
        subject: &str,
        roster: Vec<ModelId>,
        final_model: Option<&str>,
        require_evidence: bool,
        role_assignments: HashMap<ModelId, String>,
        custom_role_descriptions: HashMap<ModelId, String>,
    ) -> Result<String, ConfigError> {
        let setup = ConclusionSetup {
            subject: subject.to_string(),
            roster,
            final_model: final_model.map(str::to_string),
            require_evidence,
            role_assignments,
            custom_role_descriptions,
            max_stages: self.settings.max_stages,
        }
        .validate()?;
        Ok(self.activate(setup).await)
    }

    /// 写入已校验的配置，返回会话 ID
    pub async fn activate(&self, setup: ValidatedSetup) -> String {
        self.stop_auto().await;
        let mut store = self.store.write().await;
        store.configure(&setup.subject, setup.settings, setup.roster, setup.cursor);
        let (session_id, mode) = match store.session() {
            Some(session) => (session.id.clone(), session.mode()),
            None => return String::new(),
        };
        tracing::info!(session_id = %session_id, ?mode, subject = %setup.subject, "session configured");
        self.emit(SchedulerEvent::Configured {
            session_id: session_id.clone(),
            mode,
        });
        session_id
    }

    pub async fn reset(&self, preserve_usable_models: bool) {
        self.stop_auto().await;
        self.store.write().await.reset(preserve_usable_models);
        tracing::info!(preserve_usable_models, "session reset");
        self.emit(SchedulerEvent::Reset);
    }

    pub async fn set_usable_models(&self, models: Vec<ModelId>) {
        self.store.write().await.set_usable_models(models);
    }

    // ---- 读取 ----

    pub async fn snapshot(&self) -> Option<Session> {
        self.store.read().await.session().cloned()
    }

    pub async fn view(&self) -> SessionView {
        SessionView::project(&*self.store.read().await, Instant::now())
    }

    pub async fn usable_models(&self) -> Vec<ModelId> {
        self.store.read().await.usable_models().to_vec()
    }

    pub async fn phase(&self) -> SchedulerPhase {
        self.store.read().await.phase()
    }

    pub async fn is_loading(&self) -> bool {
        self.store.read().await.is_loading()
    }

    pub async fn error(&self) -> Option<String> {
        self.store.read().await.error().map(str::to_string)
    }

    /// 仍在有效期内的提示文本
    pub async fn notice(&self) -> Option<String> {
        self.store
            .read()
            .await
            .notice(Instant::now())
            .map(|n| n.text.clone())
    }

    pub async fn auto_progress(&self) -> bool {
        self.store.read().await.auto_progress()
    }

    // ---- 推进 ----

    /// 手动推进一步（发言或最终结论，取决于当前状态）；失败立即中止
    ///
    /// 有动作在途（含重试等待）时直接返回 Busy，不改变任何状态；
    /// 否则先关闭自动推进再执行。
    pub async fn step(&self) -> StepOutcome {
        let Some(flight) = FlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("step rejected: an action is already in flight");
            return StepOutcome::Busy;
        };
        if self.store.read().await.is_loading() {
            return StepOutcome::Busy;
        }
        self.stop_auto().await;
        self.run(flight, false).await
    }

    /// 开启自动推进并立即执行第一步；已结束、在途或已开启时返回 false
    pub async fn start_auto(self: &Arc<Self>) -> bool {
        {
            let store = self.store.read().await;
            match store.session() {
                Some(session) if !session.is_finished() => {}
                _ => return false,
            }
            if store.is_loading() {
                return false;
            }
        }
        let Some(token) = self.auto.start().await else {
            return false;
        };
        {
            let mut store = self.store.write().await;
            store.set_auto_progress(true);
            store.clear_error();
        }
        tracing::info!("auto-progress started");
        self.emit(SchedulerEvent::AutoProgressChanged { enabled: true });

        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.auto_loop(token).await });
        true
    }

    /// 关闭自动推进；已关闭时不做任何修改并返回 false
    pub async fn stop_auto(&self) -> bool {
        let cancelled = self.auto.stop().await;
        let changed = self.store.write().await.set_auto_progress(false);
        if changed {
            tracing::info!("auto-progress stopped");
            self.emit(SchedulerEvent::AutoProgressChanged { enabled: false });
        }
        changed || cancelled
    }

    async fn auto_loop(self: Arc<Self>, token: CancellationToken) {
        let mut delay = Duration::ZERO;
        loop {
            if !delay.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep(delay) => {}
                }
            }
            // 每次自触发前检查开关
            if token.is_cancelled() || !self.store.read().await.auto_progress() {
                break;
            }
            match self.drive(true).await {
                StepOutcome::Turn { finished: false, .. } | StepOutcome::Busy => {}
                outcome => {
                    tracing::debug!(?outcome, "auto-progress loop ended");
                    break;
                }
            }
            delay = self.next_delay().await;
        }
        token.cancel();
    }

    /// 新阶段的第一位发言者立即开始，其余等待 turn_delay
    async fn next_delay(&self) -> Duration {
        let store = self.store.read().await;
        match store.session() {
            Some(s) if matches!(s.settings, ModeSettings::Conclusion(_)) && s.cursor.participant_index == 0 => {
                Duration::ZERO
            }
            _ => self.settings.turn_delay,
        }
    }

    async fn drive(&self, chain_synthesis: bool) -> StepOutcome {
        let Some(flight) = FlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("auto step skipped: an action is already in flight");
            return StepOutcome::Busy;
        };
        self.run(flight, chain_synthesis).await
    }

    /// 持有 flight 期间执行一个动作（含重试与自动串联的最终结论）
    async fn run(&self, _flight: FlightGuard<'_>, chain_synthesis: bool) -> StepOutcome {
        let mut fresh = true;
        loop {
            let (generation, action) = {
                let mut store = self.store.write().await;
                let generation = store.generation();
                let Some(action) = store.session().and_then(plan) else {
                    return StepOutcome::Idle;
                };
                if fresh {
                    store.reset_retry();
                }
                self.set_phase(&mut store, SchedulerPhase::Acting);
                (generation, action)
            };

            let result = self.invoke(&action).await;
            let result = match result {
                Ok(content) => self.apply(generation, &action, content).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(outcome) => {
                    let chained = chain_synthesis
                        && matches!(outcome, StepOutcome::Turn { finished: false, .. })
                        && self.synthesis_due(generation).await;
                    if !chained {
                        return outcome;
                    }
                    fresh = true;
                }
                Err(TurnError::Session(SessionError::StaleGeneration { expected, got })) => {
                    tracing::info!(expected, got, "discarding response for a replaced session");
                    return StepOutcome::Discarded;
                }
                Err(err) => match self.handle_failure(generation, &action, err).await {
                    Flow::Retry => {
                        sleep(self.settings.retry.backoff).await;
                        if let Some(outcome) = self.resume_after_backoff(generation).await {
                            return outcome;
                        }
                        fresh = false;
                    }
                    Flow::Halt(error) => return StepOutcome::Halted { error },
                    Flow::Discarded => return StepOutcome::Discarded,
                },
            }
        }
    }

    async fn invoke(&self, action: &Action) -> Result<String, TurnError> {
        let reply = match action {
            Action::Turn {
                model,
                role_id,
                mode,
                prompt,
                ..
            } => {
                self.gateway
                    .invoke(model, prompt, *mode, role_id.as_deref())
                    .await?
            }
            Action::Synthesis { model, prompt } => {
                tracing::info!(model = %model, "requesting final conclusion");
                self.gateway
                    .invoke(model, prompt, InvocationMode::Conclusion, None)
                    .await?
            }
        };
        match reply {
            GatewayReply::Content(text) => Ok(text),
            GatewayReply::Empty { .. } => Err(TurnError::EmptyResponse {
                model: action.model().to_string(),
            }),
        }
    }

    /// 把成功的响应写入会话
    async fn apply(&self, generation: u64, action: &Action, content: String) -> Result<StepOutcome, TurnError> {
        let mut store = self.store.write().await;
        match action {
            Action::Turn {
                model,
                role_label,
                stage,
                ..
            } => {
                let turn = Turn::new(model, role_label.as_str(), content, Some(*stage));
                let len = store.append_turn(generation, turn.clone())?;

                let (cursor, roster_len, budget) = match store.session() {
                    Some(s) => (s.cursor, s.roster.len(), s.turn_budget()),
                    None => return Err(SessionError::NotConfigured.into()),
                };
                let finished = budget.is_some_and(|b| len >= b);
                if finished {
                    store.finish(generation)?;
                } else {
                    let mut next = next_cursor(cursor, roster_len);
                    if budget.is_some() {
                        // Debate：stage 表示已完成的轮次
                        next.stage = (len / roster_len.max(1)) as u32;
                    }
                    store.advance_cursor(generation, next)?;
                    store.set_phase(SchedulerPhase::Idle);
                }
                store.reset_retry();
                store.clear_error();

                tracing::info!(model = %model, stage, turns = len, finished, "turn appended");
                self.emit(SchedulerEvent::TurnAppended { index: len - 1, turn });
                self.emit(SchedulerEvent::PhaseChanged { phase: store.phase() });
                Ok(StepOutcome::Turn {
                    participant: model.clone(),
                    stage: *stage,
                    finished,
                })
            }
            Action::Synthesis { model, .. } => {
                store.set_final_artifact(generation, content.clone())?;
                store.reset_retry();
                store.clear_error();

                tracing::info!(model = %model, chars = content.chars().count(), "final conclusion set");
                self.emit(SchedulerEvent::Concluded {
                    model: model.clone(),
                    artifact: content,
                });
                self.emit(SchedulerEvent::PhaseChanged {
                    phase: SchedulerPhase::Finished,
                });
                Ok(StepOutcome::Concluded { model: model.clone() })
            }
        }
    }

    /// 自动推进下，最后一个讨论阶段刚完成时直接发起最终结论
    async fn synthesis_due(&self, generation: u64) -> bool {
        let store = self.store.read().await;
        store.generation() == generation
            && store.auto_progress()
            && store.session().is_some_and(Session::awaiting_synthesis)
    }

    async fn handle_failure(&self, generation: u64, action: &Action, err: TurnError) -> Flow {
        let mut store = self.store.write().await;
        if store.generation() != generation {
            return Flow::Discarded;
        }
        let message = err.display_message();
        let max_retry = self.settings.retry.max_retry;
        let decision = self
            .settings
            .retry
            .decide(&err, store.retry_count(), store.auto_progress());

        match decision {
            RecoveryAction::Retry { attempt } => {
                store.increment_retry();
                store.set_error(message.clone());
                store.set_notice(
                    format!("Response error ({attempt}/{max_retry}), retrying shortly..."),
                    self.settings.notice_ttl,
                );
                self.set_phase(&mut store, SchedulerPhase::Retrying { attempt });
                tracing::warn!(model = action.model(), attempt, error = %message, "action failed, retrying");
                self.emit(SchedulerEvent::Retrying {
                    attempt,
                    error: message,
                });
                Flow::Retry
            }
            RecoveryAction::Halt => {
                let exhausted = store.auto_progress() && store.retry_count() >= max_retry && err.is_transient();
                let notice = if exhausted {
                    format!("Error: {message} (max retries of {max_retry} reached)")
                } else {
                    format!("Error: {message}")
                };
                store.set_error(message.clone());
                store.set_notice(notice, self.settings.notice_ttl);
                store.reset_retry();
                let auto_changed = store.set_auto_progress(false);
                self.set_phase(&mut store, SchedulerPhase::Halted);
                drop(store);

                self.auto.stop().await;
                tracing::error!(model = action.model(), error = %message, "action halted");
                if auto_changed {
                    self.emit(SchedulerEvent::AutoProgressChanged { enabled: false });
                }
                self.emit(SchedulerEvent::Failed {
                    error: message.clone(),
                });
                Flow::Halt(message)
            }
        }
    }

    /// 退避结束：会话已替换则丢弃；自动推进已关闭则中止
    async fn resume_after_backoff(&self, generation: u64) -> Option<StepOutcome> {
        let mut store = self.store.write().await;
        if store.generation() != generation {
            return Some(StepOutcome::Discarded);
        }
        if store.auto_progress() {
            return None;
        }
        let error = store
            .error()
            .unwrap_or("auto-progress stopped during retry")
            .to_string();
        store.reset_retry();
        self.set_phase(&mut store, SchedulerPhase::Halted);
        tracing::info!("retry abandoned: auto-progress was stopped");
        Some(StepOutcome::Halted { error })
    }

    // ---- 辩论总结 ----

    /// 辩论结束后由指定模型生成总结（不修改转录，不重试）
    pub async fn summarize_debate(&self, model: &str) -> Result<String, TurnError> {
        let Some(_flight) = FlightGuard::acquire(&self.in_flight) else {
            return Err(TurnError::Busy);
        };
        let (generation, prompt) = {
            let store = self.store.read().await;
            let session = store.session().ok_or(SessionError::NotConfigured)?;
            if !matches!(session.settings, ModeSettings::Debate(_)) {
                return Err(SessionError::WrongMode.into());
            }
            if !session.is_finished() {
                return Err(SessionError::NotFinished.into());
            }
            (store.generation(), summary_prompt(&session.subject, &session.transcript))
        };

        let result = match self.gateway.invoke(model, &prompt, InvocationMode::Debate, None).await {
            Ok(GatewayReply::Content(text)) => Ok(text),
            Ok(GatewayReply::Empty { .. }) => Err(TurnError::EmptyResponse {
                model: model.to_string(),
            }),
            Err(e) => Err(TurnError::from(e)),
        };

        let mut store = self.store.write().await;
        match result {
            Ok(summary) => {
                store.set_summary(generation, summary.clone())?;
                tracing::info!(model, "debate summary ready");
                self.emit(SchedulerEvent::SummaryReady {
                    summary: summary.clone(),
                });
                Ok(summary)
            }
            Err(err) => {
                let message = err.display_message();
                if store.generation() == generation {
                    store.set_error(message.clone());
                    store.set_notice(format!("Error: {message}"), self.settings.notice_ttl);
                }
                tracing::warn!(model, error = %message, "debate summary failed");
                self.emit(SchedulerEvent::Failed { error: message });
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for TurnScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnScheduler")
            .field("gateway", &self.gateway)
            .field("settings", &self.settings)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GatewayError, ScriptedLlmClient};
    use crate::prompt::Persona;

    fn scheduler(client: Arc<ScriptedLlmClient>) -> Arc<TurnScheduler> {
        let gateway = ModelGateway::new(client, 20);
        Arc::new(TurnScheduler::new(gateway, vec![], SchedulerSettings::default()))
    }

    fn debaters() -> Vec<Participant> {
        vec![
            Participant::debater("a", Side::Affirmative),
            Participant::debater("b", Side::Negative),
        ]
    }

    #[test]
    fn test_next_cursor_wraps_stage() {
        let c = next_cursor(Cursor { participant_index: 1, stage: 0 }, 2);
        assert_eq!(c, Cursor { participant_index: 0, stage: 1 });
        let c = next_cursor(Cursor { participant_index: 0, stage: 1 }, 2);
        assert_eq!(c, Cursor { participant_index: 1, stage: 1 });
    }

    #[test]
    fn test_plan_conclusion_passes_role_id() {
        let mut store = SessionStore::new(vec![]);
        store.configure(
            "T",
            ModeSettings::Conclusion(crate::session::ConclusionSettings {
                final_model: "x".into(),
                require_evidence: false,
                max_stages: 3,
            }),
            vec![
                Participant::expert("x", Persona::Historian),
                Participant::expert("y", Persona::Critic),
            ],
            Cursor::default(),
        );
        match plan(store.session().unwrap()) {
            Some(Action::Turn { model, role_id, role_label, .. }) => {
                assert_eq!(model, "x");
                assert_eq!(role_id.as_deref(), Some("historian"));
                assert_eq!(role_label, "Historian");
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debate_starts_with_start_model() {
        let client = Arc::new(ScriptedLlmClient::new().reply("opening"));
        let s = scheduler(client.clone());
        s.configure_debate("T", debaters(), Some("b"), 1).await.unwrap();

        let outcome = s.step().await;
        assert_eq!(
            outcome,
            StepOutcome::Turn { participant: "b".into(), stage: 0, finished: false }
        );
        assert_eq!(client.requests()[0].model, "b");
        assert_eq!(s.snapshot().await.unwrap().cursor.participant_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_failure_halts_without_retry() {
        let client = Arc::new(ScriptedLlmClient::new().fail(GatewayError::upstream("down", Some(503))));
        let s = scheduler(client.clone());
        s.configure_debate("T", debaters(), Some("a"), 2).await.unwrap();

        let outcome = s.step().await;
        assert!(matches!(outcome, StepOutcome::Halted { .. }));
        assert_eq!(client.call_count(), 1);
        assert_eq!(s.phase().await, SchedulerPhase::Halted);
        assert!(s.error().await.is_some());
        assert!(s.notice().await.unwrap().starts_with("Error:"));
        assert!(s.snapshot().await.unwrap().transcript.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_message_surfaced() {
        let client = Arc::new(ScriptedLlmClient::new().fail(GatewayError::upstream("slow down", Some(429))));
        let s = scheduler(client);
        s.configure_debate("T", debaters(), Some("a"), 2).await.unwrap();
        s.step().await;
        assert!(s.error().await.unwrap().contains("rate limit"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_discards_in_flight_response() {
        let client = Arc::new(
            ScriptedLlmClient::new()
                .reply("late answer")
                .with_latency(Duration::from_secs(2)),
        );
        let s = scheduler(client.clone());
        s.configure_debate("Old", debaters(), Some("a"), 2).await.unwrap();

        let stepping = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.step().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        s.configure_debate("New", debaters(), Some("a"), 2).await.unwrap();

        assert_eq!(stepping.await.unwrap(), StepOutcome::Discarded);
        let session = s.snapshot().await.unwrap();
        assert_eq!(session.subject, "New");
        assert!(session.transcript.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_session_step_is_noop() {
        let client = Arc::new(ScriptedLlmClient::new().reply("x"));
        let s = scheduler(client.clone());
        s.configure_debate("T", debaters(), Some("a"), 1).await.unwrap();
        s.step().await;
        assert!(matches!(s.step().await, StepOutcome::Turn { finished: true, .. }));
        assert_eq!(s.step().await, StepOutcome::Idle);
        assert!(!s.start_auto().await);
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_summarize_debate() {
        let client = Arc::new(ScriptedLlmClient::new().reply("turn").reply("turn").reply("## Summary"));
        let s = scheduler(client.clone());
        s.configure_debate("T", debaters(), Some("a"), 1).await.unwrap();

        assert!(matches!(
            s.summarize_debate("a").await,
            Err(TurnError::Session(SessionError::NotFinished))
        ));
        s.step().await;
        s.step().await;
        assert_eq!(s.summarize_debate("a").await.unwrap(), "## Summary");
        let session = s.snapshot().await.unwrap();
        assert_eq!(session.summary.as_deref(), Some("## Summary"));
        assert_eq!(session.transcript.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configure_rejects_invalid_setup() {
        let client = Arc::new(ScriptedLlmClient::new());
        let s = scheduler(client);
        let err = s
            .configure_conclusion("T", vec!["x".into(), "y".into()], None, false, HashMap::new(), HashMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingFinalModel);
        assert!(s.snapshot().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_broadcast() {
        let client = Arc::new(ScriptedLlmClient::new().reply("hello"));
        let s = scheduler(client);
        let mut rx = s.subscribe();
        s.configure_debate("T", debaters(), Some("a"), 1).await.unwrap();
        s.step().await;

        let mut saw_turn = false;
        while let Ok(event) = rx.try_recv() {
            if let SchedulerEvent::TurnAppended { index, turn } = event {
                assert_eq!(index, 0);
                assert_eq!(turn.content, "hello");
                saw_turn = true;
            }
        }
        assert!(saw_turn);
    }
}
