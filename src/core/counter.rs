use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

/// 单次测速内所有工作线程共享的字节计数器和停止标志
///
/// 每次测速创建一个，通过 `Arc` 传给每个工作线程，测速结束后随之释放。
#[derive(Debug, Default)]
pub struct SharedCounter {
    bytes_total: AtomicU64,
    stopped: AtomicBool,
    stop_notify: Notify,
}

impl SharedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累加一个分块的长度，返回累加后的总量
    pub fn add(&self, bytes: u64) -> u64 {
        self.bytes_total.fetch_add(bytes, Ordering::Relaxed) + bytes
    }

    pub fn bytes(&self) -> u64 {
        self.bytes_total.load(Ordering::Relaxed)
    }

    /// 设置停止标志并唤醒所有正在等待的工作线程（幂等）
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.stop_notify.notify_waiters();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// 等待停止标志被设置
    pub async fn stopped(&self) {
        loop {
            let notified = self.stop_notify.notified();
            tokio::pin!(notified);
            // 先登记再检查，避免错过 stop() 与检查之间的通知
            notified.as_mut().enable();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}
