use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::store::RegistryStore;

/// 后台清理任务：按 `cleanup_interval` 周期扫描并移除心跳超时的实例
///
/// 只通过 [`RegistryStore`] 的操作访问存储。取消信号只在两次扫描之间
/// 检查，正在进行的扫描总会完整结束。
#[derive(Debug)]
pub struct LivenessSweeper {
    cancel: CancellationToken,
    task_tracker: TaskTracker,
}

impl LivenessSweeper {
    // 启动清理任务
    pub fn spawn(store: Arc<RegistryStore>) -> Self {
        let interval = store.settings().cleanup_interval;
        Self::spawn_with_interval(store, interval)
    }

    pub fn spawn_with_interval(store: Arc<RegistryStore>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let task_tracker = TaskTracker::new();

        let token = cancel.clone();
        task_tracker.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 第一次 tick 立即返回，跳过
            interval.tick().await;

            tracing::info!(
                interval_secs = period.as_secs(),
                timeout_secs = store.settings().heartbeat_timeout.as_secs(),
                "Liveness sweeper started"
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => Self::run_cycle(&store),
                }
            }

            tracing::info!("Liveness sweeper stopped");
        });
        task_tracker.close();

        Self {
            cancel,
            task_tracker,
        }
    }

    fn run_cycle(store: &RegistryStore) {
        tracing::debug!("Executing instance expiration check...");
        match store.sweep_expired() {
            Ok(report) if report.evicted.is_empty() => {
                tracing::debug!(remaining = report.remaining, "Cleanup check completed");
            }
            Ok(report) => {
                tracing::info!(
                    expired_count = report.evicted.len(),
                    remaining = report.remaining,
                    "Cleanup check completed, expired instances removed"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping cleanup cycle");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task_tracker.is_empty()
    }

    /// 停止清理任务并等待当前扫描结束
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.task_tracker.wait().await;
    }
}

impl Drop for LivenessSweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
