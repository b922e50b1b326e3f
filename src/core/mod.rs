//! 核心调度层：错误与恢复策略、调度状态、自动推进、轮次调度器、编排

pub mod auto_progress;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod scheduler;
pub mod state;

pub use auto_progress::AutoProgress;
pub use error::{ConfigError, RecoveryAction, SessionError, TurnError};
pub use orchestrator::{
    create_client_from_config, create_gateway_from_config, create_scheduler, spawn_controller,
    Command,
};
pub use recovery::{RetryPolicy, DEFAULT_MAX_RETRY, DEFAULT_RETRY_BACKOFF};
pub use scheduler::{SchedulerSettings, TurnScheduler};
pub use state::{SchedulerEvent, SchedulerPhase, StepOutcome};
