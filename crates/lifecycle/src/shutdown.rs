use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, info};

struct ShutdownState {
    /// 关闭信号发送器，触发后取出
    shutdown_tx: Option<broadcast::Sender<()>>,
    /// 是否已经关闭
    is_shutdown: bool,
}

/// 优雅关闭管理器
///
/// 重复触发无副作用，触发之后才订阅的接收器会立即收到信号。
/// [`ShutdownManager::rearm`] 可将已触发的信号恢复为未触发状态。
#[derive(Clone)]
pub struct ShutdownManager {
    state: Arc<RwLock<ShutdownState>>,
}

impl ShutdownManager {
    /// 创建新的关闭管理器
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            state: Arc::new(RwLock::new(ShutdownState {
                shutdown_tx: Some(shutdown_tx),
                is_shutdown: false,
            })),
        }
    }

    /// 订阅关闭信号
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        let state = self.state.read();
        match &state.shutdown_tx {
            Some(tx) if !state.is_shutdown => tx.subscribe(),
            _ => {
                // 已经关闭，返回一个立即触发的接收器
                let (tx, rx) = broadcast::channel(1);
                let _ = tx.send(());
                rx
            }
        }
    }

    /// 触发关闭，已经触发过时返回 false
    pub fn trigger(&self) -> bool {
        let mut state = self.state.write();
        if state.is_shutdown {
            debug!("关闭管理器已经触发过关闭");
            return false;
        }
        state.is_shutdown = true;
        if let Some(tx) = state.shutdown_tx.take() {
            debug!("发送关闭信号给 {} 个订阅者", tx.receiver_count());
            let _ = tx.send(());
        }
        info!("触发系统关闭");
        true
    }

    /// 重新装载已触发的关闭信号，未触发时不做任何事
    pub fn rearm(&self) {
        let mut state = self.state.write();
        if state.is_shutdown {
            let (tx, _) = broadcast::channel(16);
            state.shutdown_tx = Some(tx);
            state.is_shutdown = false;
            debug!("关闭信号已重新装载");
        }
    }

    /// 检查是否已经关闭
    pub fn is_triggered(&self) -> bool {
        self.state.read().is_shutdown
    }

    /// 等待关闭信号
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        let _ = rx.recv().await;
    }

    /// 带超时地等待关闭信号，超时前收到信号时返回 true
    pub async fn wait_timeout(&self, limit: Duration) -> bool {
        timeout(limit, self.wait()).await.is_ok()
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
