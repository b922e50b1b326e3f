//! 错误类型
//!
//! - ConfigError：会话配置非法（致命，不重试，由调用方修正后重新配置）
//! - SessionError：违反会话存储不变式的修改
//! - TurnError：一次调度动作失败（网关错误 / 空响应 / 会话错误），交给 RetryPolicy 决定重试或中止

use thiserror::Error;

use crate::llm::GatewayError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Subject must not be empty")]
    EmptySubject,

    #[error("At least 2 participants are required, got {0}")]
    NotEnoughParticipants(usize),

    #[error("Duplicate participant: {0}")]
    DuplicateParticipant(String),

    #[error("Start model is not set")]
    MissingStartModel,

    #[error("Final model is not set")]
    MissingFinalModel,

    #[error("Model {0} is not in the roster")]
    UnknownModel(String),

    #[error("Participant {0} has no debate side")]
    MissingSide(String),

    #[error("Custom role for {0} needs a description")]
    MissingCustomRoleDescription(String),

    #[error("Answer limit must be at least 1")]
    InvalidAnswerLimit,

    #[error("Stage count must be at least 1")]
    InvalidStageCount,

    #[error("Invalid session plan: {0}")]
    InvalidPlan(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No session is configured")]
    NotConfigured,

    #[error("Session is already finished")]
    AlreadyFinished,

    #[error("Session is not finished yet")]
    NotFinished,

    #[error("Session was reconfigured (generation {expected}, response for {got})")]
    StaleGeneration { expected: u64, got: u64 },

    #[error("Transcript already holds {budget} turns")]
    TranscriptFull { budget: usize },

    #[error("All discussion stages are complete")]
    StagesExhausted,

    #[error("Participant index {0} is out of range")]
    CursorOutOfRange(usize),

    #[error("Final conclusion is required to finish")]
    ArtifactMissing,

    #[error("Final conclusion is already set")]
    ArtifactAlreadySet,

    #[error("Operation not valid for this mode")]
    WrongMode,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("{model} returned an empty response")]
    EmptyResponse { model: String },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Another action is already in flight")]
    Busy,
}

impl TurnError {
    /// 超时 / 上游错误 / 空响应可重试；会话与配置错误不可重试
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::EmptyResponse { .. })
    }

    pub fn display_message(&self) -> String {
        match self {
            Self::Gateway(e) => e.display_message(),
            other => other.to_string(),
        }
    }
}

/// RetryPolicy 对一次失败给出的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 第 attempt 次重试（从 1 开始），等待退避后重发同一动作
    Retry { attempt: u32 },
    /// 中止：关闭自动推进，等待调用方手动恢复
    Halt,
}
