//! 失败恢复策略
//!
//! 根据 TurnError 与当前重试计数返回 RecoveryAction：自动推进开启且未超过上限时重试同一动作，
//! 否则中止。手动 step 的失败总是立即中止。

use std::time::Duration;

use crate::core::{RecoveryAction, TurnError};

pub const DEFAULT_MAX_RETRY: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retry: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry: DEFAULT_MAX_RETRY,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retry: u32, backoff: Duration) -> Self {
        Self { max_retry, backoff }
    }

    /// retry_count 为本动作已重试的次数
    pub fn decide(&self, err: &TurnError, retry_count: u32, auto_progress: bool) -> RecoveryAction {
        if !err.is_transient() || !auto_progress {
            return RecoveryAction::Halt;
        }
        if retry_count < self.max_retry {
            RecoveryAction::Retry {
                attempt: retry_count + 1,
            }
        } else {
            RecoveryAction::Halt
        }
    }
}
