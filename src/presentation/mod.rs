//! 展示适配：从会话状态派生只读视图
//!
//! 阶段描述、进度、当前发言者角色名、消息左右对齐、Markdown 转录。
//! 所有函数只读，允许会话未配置、当前发言者缺失或最终结论为空。

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::core::SchedulerPhase;
use crate::session::{Mode, ModeSettings, Session, SessionStore, Side};

/// 当前发言者缺失时的角色名
pub const FALLBACK_ROLE_NAME: &str = "Expert";

/// 结论模式的阶段描述
pub fn stage_description(stage: u32, max_stages: u32) -> String {
    if stage >= max_stages {
        "Final conclusion".to_string()
    } else if stage == 0 {
        "Initial opinions".to_string()
    } else if stage + 1 == max_stages {
        "Finding common ground".to_string()
    } else {
        format!("Discussion stage {stage}")
    }
}

/// min(stage / max_stages, 1)
pub fn progress_fraction(stage: u32, max_stages: u32) -> f32 {
    if max_stages == 0 {
        return 1.0;
    }
    (stage as f32 / max_stages as f32).min(1.0)
}

/// 辩论立场的展示标签
pub fn side_label(side: Side) -> &'static str {
    match side {
        Side::Affirmative => "Agree",
        Side::Negative => "Disagree",
    }
}

/// 当前发言者的角色名（含自定义角色插值）；缺失时返回通用标签
pub fn current_role_name(session: Option<&Session>) -> String {
    let Some(actor) = session.and_then(Session::current_participant) else {
        return FALLBACK_ROLE_NAME.to_string();
    };
    match actor.side {
        Some(side) if actor.persona.is_none() => side.to_string(),
        _ => actor.persona().role_name(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnView {
    pub participant: String,
    pub label: String,
    pub content: String,
    pub stage: Option<u32>,
    pub align: Alignment,
    pub created_at: DateTime<Utc>,
}

/// 调用方可直接渲染的会话视图
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: Option<String>,
    pub mode: Option<Mode>,
    pub subject: String,
    pub phase: SchedulerPhase,
    pub is_loading: bool,
    pub auto_progress: bool,
    pub finished: bool,
    pub current_participant: Option<String>,
    pub current_role_name: String,
    pub stage_description: Option<String>,
    pub progress: Option<f32>,
    pub turns: Vec<TurnView>,
    pub final_artifact: Option<String>,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub can_step: bool,
    pub can_start_auto: bool,
    pub can_stop_auto: bool,
}

fn turn_views(session: &Session) -> Vec<TurnView> {
    let first = session.roster.first().map(|p| p.name.as_str());
    session
        .transcript
        .iter()
        .enumerate()
        .map(|(index, turn)| {
            let (label, align) = match session.mode() {
                Mode::Debate => {
                    let label = match session.participant(&turn.participant).and_then(|p| p.side) {
                        Some(side) => side_label(side).to_string(),
                        None => turn.role_label.clone(),
                    };
                    let align = if Some(turn.participant.as_str()) == first {
                        Alignment::Left
                    } else {
                        Alignment::Right
                    };
                    (label, align)
                }
                Mode::Conclusion => {
                    let align = if index % 2 == 0 { Alignment::Left } else { Alignment::Right };
                    (turn.role_label.clone(), align)
                }
            };
            TurnView {
                participant: turn.participant.clone(),
                label,
                content: turn.content.clone(),
                stage: turn.stage,
                align,
                created_at: turn.created_at,
            }
        })
        .collect()
}

impl SessionView {
    pub fn project(store: &SessionStore, now: Instant) -> Self {
        let session = store.session();
        let phase = store.phase();
        let busy = phase.is_busy();
        let finished = session.is_some_and(Session::is_finished);
        let auto_progress = store.auto_progress();

        let (stage_description, progress) = match session.map(|s| (&s.settings, s.cursor.stage)) {
            Some((ModeSettings::Conclusion(c), stage)) => (
                Some(stage_description(stage, c.max_stages)),
                Some(progress_fraction(stage, c.max_stages)),
            ),
            _ => (None, None),
        };

        Self {
            session_id: session.map(|s| s.id.clone()),
            mode: session.map(Session::mode),
            subject: session.map(|s| s.subject.clone()).unwrap_or_default(),
            phase,
            is_loading: busy,
            auto_progress,
            finished,
            current_participant: session
                .and_then(Session::current_participant)
                .map(|p| p.name.clone()),
            current_role_name: current_role_name(session),
            stage_description,
            progress,
            turns: session.map(turn_views).unwrap_or_default(),
            final_artifact: session.and_then(|s| s.final_artifact.clone()),
            summary: session.and_then(|s| s.summary.clone()),
            error: store.error().map(str::to_string),
            notice: store.notice(now).map(|n| n.text.clone()),
            can_step: session.is_some() && !finished && !busy,
            can_start_auto: session.is_some() && !finished && !busy && !auto_progress,
            can_stop_auto: auto_progress,
        }
    }

    /// Markdown 转录（CLI 输出与导出）
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.subject);
        for turn in &self.turns {
            out.push_str(&format!(
                "**{} ({})** · {}\n\n{}\n\n",
                turn.participant,
                turn.label,
                turn.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                turn.content
            ));
        }
        if let Some(artifact) = &self.final_artifact {
            out.push_str(&format!("## Final conclusion\n\n{artifact}\n\n"));
        }
        if let Some(summary) = &self.summary {
            out.push_str(&format!("## Summary\n\n{summary}\n\n"));
        }
        out
    }
}
