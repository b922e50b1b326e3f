//! Agora - 多模型辩论 / 结论编排引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 轮次调度器、重试策略、自动推进、调度事件与编排
//! - **llm**: 模型网关与后端实现（HTTP 代理 / OpenAI 兼容 / Anthropic / 路由 / Mock）
//! - **observability**: tracing 日志
//! - **presentation**: 会话只读视图（阶段描述、进度、角色名、Markdown 转录）
//! - **prompt**: 辩论 / 结论提示词与专家人设
//! - **session**: 会话数据模型、状态存储、配置校验

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod presentation;
pub mod prompt;
pub mod session;

pub use crate::core::{SchedulerEvent, StepOutcome, TurnScheduler};
pub use crate::session::{Session, SessionPlan};
