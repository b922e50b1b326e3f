//! 会话数据模型：参与者、发言记录、游标、状态

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::InvocationMode;
use crate::prompt::Persona;

/// 模型 ID（同时是参与者身份）
pub type ModelId = String;

/// 结论模式的讨论阶段数（达到后进入最终结论）
pub const MAX_CONVERSATION_STAGES: u32 = 3;

/// 辩论立场
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Affirmative,
    Negative,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Affirmative => write!(f, "Affirmative"),
            Self::Negative => write!(f, "Negative"),
        }
    }
}

/// 会话模式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Debate,
    Conclusion,
}

impl From<Mode> for InvocationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Debate => InvocationMode::Debate,
            Mode::Conclusion => InvocationMode::Conclusion,
        }
    }
}

/// 参与者：Debate 模式带立场，Conclusion 模式带人设
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: ModelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<Persona>,
}

impl Participant {
    pub fn debater(name: &str, side: Side) -> Self {
        Self {
            name: name.to_string(),
            side: Some(side),
            persona: None,
        }
    }

    pub fn expert(name: &str, persona: Persona) -> Self {
        Self {
            name: name.to_string(),
            side: None,
            persona: Some(persona),
        }
    }

    /// 未指定人设时按通用专家处理
    pub fn persona(&self) -> Persona {
        self.persona.clone().unwrap_or_default()
    }
}

/// 单条发言，写入后不可变
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub participant: ModelId,
    /// Debate 为立场，Conclusion 为角色名
    pub role_label: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(participant: &str, role_label: impl Into<String>, content: impl Into<String>, stage: Option<u32>) -> Self {
        Self {
            participant: participant.to_string(),
            role_label: role_label.into(),
            content: content.into(),
            stage,
            created_at: Utc::now(),
        }
    }
}

/// 当前发言位置；Debate 模式下 stage 表示轮次
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub participant_index: usize,
    pub stage: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Active,
    Finished,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateSettings {
    pub start_model: ModelId,
    /// 每位参与者的发言次数上限
    pub answer_limit: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConclusionSettings {
    pub final_model: ModelId,
    pub require_evidence: bool,
    pub max_stages: u32,
}

/// 模式及其专属设置（会话生命周期内固定）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeSettings {
    Debate(DebateSettings),
    Conclusion(ConclusionSettings),
}

/// 单个会话
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub id: String,
    /// 配置代数：每次 setup / reset 递增，用于丢弃过期的在途响应
    pub generation: u64,
    pub subject: String,
    pub settings: ModeSettings,
    pub roster: Vec<Participant>,
    pub transcript: Vec<Turn>,
    pub cursor: Cursor,
    pub status: SessionStatus,
    pub final_artifact: Option<String>,
    pub retry_count: u32,
    pub auto_progress: bool,
    /// 辩论结束后可选生成的总结
    pub summary: Option<String>,
}

impl Session {
    pub fn new(generation: u64, subject: &str, settings: ModeSettings, roster: Vec<Participant>, cursor: Cursor) -> Self {
        Self {
            id: format!("session_{}", uuid::Uuid::new_v4()),
            generation,
            subject: subject.to_string(),
            settings,
            roster,
            transcript: Vec::new(),
            cursor,
            status: SessionStatus::Active,
            final_artifact: None,
            retry_count: 0,
            auto_progress: false,
            summary: None,
        }
    }

    pub fn mode(&self) -> Mode {
        match self.settings {
            ModeSettings::Debate(_) => Mode::Debate,
            ModeSettings::Conclusion(_) => Mode::Conclusion,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    /// 当前应发言的参与者
    pub fn current_participant(&self) -> Option<&Participant> {
        self.roster.get(self.cursor.participant_index)
    }

    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.roster.iter().find(|p| p.name == name)
    }

    /// Debate 模式的总发言数上限；Conclusion 模式为 None
    pub fn turn_budget(&self) -> Option<usize> {
        match &self.settings {
            ModeSettings::Debate(d) => Some(self.roster.len() * d.answer_limit as usize),
            ModeSettings::Conclusion(_) => None,
        }
    }

    pub fn max_stages(&self) -> Option<u32> {
        match &self.settings {
            ModeSettings::Conclusion(c) => Some(c.max_stages),
            ModeSettings::Debate(_) => None,
        }
    }

    /// Conclusion 模式下所有讨论阶段已完成，等待最终结论
    pub fn awaiting_synthesis(&self) -> bool {
        match &self.settings {
            ModeSettings::Conclusion(c) => !self.is_finished() && self.cursor.stage >= c.max_stages,
            ModeSettings::Debate(_) => false,
        }
    }
}
