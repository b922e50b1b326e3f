//! 状态定义：调度阶段、单步结果、对外广播的事件
//!
//! 调度器只通过 SchedulerEvent 向外推送变化；调用方也可以随时取 snapshot 自行投影。

use serde::Serialize;

use crate::session::{Mode, ModelId, Turn};

/// 调度阶段（展示层与 is_loading 使用）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SchedulerPhase {
    #[default]
    Idle,
    /// 请求在途
    Acting,
    /// 失败后等待退避，attempt 从 1 开始
    Retrying { attempt: u32 },
    /// 失败且不再重试，等待手动恢复
    Halted,
    Finished,
}

impl SchedulerPhase {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Acting | Self::Retrying { .. })
    }
}

/// 一次 step 的结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// 追加了一条发言；finished 表示本条发言结束了辩论
    Turn {
        participant: ModelId,
        stage: u32,
        finished: bool,
    },
    /// 最终结论已写入，会话结束
    Concluded { model: ModelId },
    /// 已有动作在途，本次调用被忽略
    Busy,
    /// 未配置或已结束，无事可做
    Idle,
    /// 响应返回前会话已被重新配置，结果被丢弃
    Discarded,
    /// 失败且不再重试
    Halted { error: String },
}

/// 广播给订阅者的调度事件
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    Configured {
        session_id: String,
        mode: Mode,
    },
    Reset,
    PhaseChanged {
        phase: SchedulerPhase,
    },
    TurnAppended {
        index: usize,
        turn: Turn,
    },
    Concluded {
        model: ModelId,
        artifact: String,
    },
    SummaryReady {
        summary: String,
    },
    Retrying {
        attempt: u32,
        error: String,
    },
    Failed {
        error: String,
    },
    AutoProgressChanged {
        enabled: bool,
    },
}
