//! 会话：数据模型、状态存储、配置校验

pub mod setup;
pub mod store;
pub mod types;

pub use setup::{
    ConclusionSetup, DebateSetup, PlanParticipant, SessionPlan, SessionSetup, ValidatedSetup,
    DEFAULT_ANSWER_LIMIT,
};
pub use store::{Notice, SessionStore};
pub use types::{
    ConclusionSettings, Cursor, DebateSettings, Mode, ModeSettings, ModelId, Participant, Session,
    SessionStatus, Side, Turn, MAX_CONVERSATION_STAGES,
};
