//! 自动推进控制：持有当前自动推进循环的 CancellationToken
//!
//! stop 只取消之后的自触发，在途的网关调用不受影响。

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct AutoProgress {
    token: Mutex<Option<CancellationToken>>,
}

impl AutoProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开启新循环并返回其 token；已在运行时返回 None
    pub async fn start(&self) -> Option<CancellationToken> {
        let mut guard = self.token.lock().await;
        if guard.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return None;
        }
        let token = CancellationToken::new();
        *guard = Some(token.clone());
        Some(token)
    }

    /// 取消当前循环；返回是否有循环被取消
    pub async fn stop(&self) -> bool {
        match self.token.lock().await.take() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.token
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_is_exclusive() {
        let auto = AutoProgress::new();
        let token = auto.start().await.unwrap();
        assert!(auto.start().await.is_none());
        assert!(auto.is_running().await);

        assert!(auto.stop().await);
        assert!(token.is_cancelled());
        assert!(!auto.stop().await, "second stop is a no-op");
        assert!(auto.start().await.is_some());
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let auto = AutoProgress::new();
        assert!(!auto.stop().await);
        assert!(!auto.is_running().await);
    }
}
