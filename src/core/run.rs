use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;
use crate::catalog::Server;
use crate::config::Config;
use crate::core::counter::SharedCounter;
use crate::core::error::{SpeedTestError, SpeedTestResult};
use crate::core::sampler::{mbps, RateSampler};
use crate::core::worker::{DownloadWorker, WorkerReport, DEFAULT_BACKOFF, DEFAULT_CHUNK_SIZE};
use crate::utils::validator;

const MIB: f64 = 1024.0 * 1024.0;

/// 单次测速的输入
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub label: String,
    pub candidates: Vec<Server>,
    pub duration_secs: f64,
    pub worker_count: usize,
}

impl RunRequest {
    pub fn new(
        label: impl Into<String>,
        candidates: Vec<Server>,
        duration_secs: f64,
        worker_count: usize,
    ) -> SpeedTestResult<Self> {
        let request = Self {
            label: label.into(),
            candidates,
            duration_secs,
            worker_count,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> SpeedTestResult<()> {
        validator::validate_thread_count(self.worker_count)?;
        validator::validate_duration(self.duration_secs)?;
        if self.candidates.is_empty() {
            return Err(SpeedTestError::invalid_config(format!("{}: 候选服务器列表为空", self.label)));
        }
        if let Some(bad) = self.candidates.iter().find(|s| !validator::is_valid_url(&s.url)) {
            return Err(SpeedTestError::invalid_config(format!("无效的URL: {}", bad.url)));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs)
    }
}

/// 引擎参数
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub backoff: Duration,
    pub chunk_size: usize,
    pub join_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            backoff: DEFAULT_BACKOFF,
            chunk_size: DEFAULT_CHUNK_SIZE,
            join_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(200),
        }
    }
}

impl From<&Config> for RunSettings {
    fn from(config: &Config) -> Self {
        Self {
            backoff: Duration::from_millis(config.retry_delay_ms),
            chunk_size: config.chunk_size,
            join_timeout: Duration::from_millis(config.join_timeout_ms),
            poll_interval: config.ui_refresh(),
        }
    }
}

/// 测速生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Draining,
    Completed,
}

/// 每次轮询重新计算的实时数据
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub elapsed: Duration,
    pub bytes_total: u64,
    pub instantaneous_mbps: f64,
    pub average_mbps: f64,
    pub downloaded_mib: f64,
    pub remaining: Duration,
    /// 已产生的每秒采样数，用来判断瞬时值是否刷新
    pub sample_seq: u64,
}

impl RunSnapshot {
    fn idle(duration: Duration) -> Self {
        Self {
            elapsed: Duration::ZERO,
            bytes_total: 0,
            instantaneous_mbps: 0.0,
            average_mbps: 0.0,
            downloaded_mib: 0.0,
            remaining: duration,
            sample_seq: 0,
        }
    }
}

/// 测速结果，每次测速只产生一次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub label: String,
    pub server_name: String,
    pub url: String,
    pub avg_mbps: f64,
    pub avg_mbytes_per_sec: f64,
    pub downloaded_mib: f64,
    pub bytes_total: u64,
    pub elapsed_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_mbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_mbps: Option<f64>,
}

impl RunResult {
    /// 平均速率始终按配置的测速时长计算，而不是实际耗时
    pub fn from_totals(run_id: Uuid, label: &str, server: &Server, bytes_total: u64, duration: Duration) -> Self {
        let secs = duration.as_secs_f64();
        let avg_mbps = mbps(bytes_total, secs);
        Self {
            run_id,
            label: label.to_string(),
            server_name: server.name.clone(),
            url: server.url.clone(),
            avg_mbps,
            avg_mbytes_per_sec: avg_mbps / 8.0,
            downloaded_mib: bytes_total as f64 / MIB,
            bytes_total,
            elapsed_seconds: secs,
            min_mbps: None,
            max_mbps: None,
        }
    }

    pub fn with_range(mut self, min_mbps: f64, max_mbps: f64) -> Self {
        self.min_mbps = Some(min_mbps);
        self.max_mbps = Some(max_mbps);
        self
    }
}

/// 外部提前停止测速用的句柄（与截止时间到达走同一个停止标志）
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<SharedCounter>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.stop();
    }
}

/// 一次限时测速：N 个下载连接共享一个计数器
pub struct ThroughputRun {
    id: Uuid,
    label: String,
    server: Server,
    duration: Duration,
    worker_count: usize,
    client: Client,
    settings: RunSettings,
    counter: Arc<SharedCounter>,
    sampler: Mutex<RateSampler>,
    start: Option<Instant>,
    deadline: Option<Instant>,
    workers: Vec<JoinHandle<WorkerReport>>,
    state: RunState,
}

impl ThroughputRun {
    pub fn new(request: &RunRequest, server: Server, client: Client, settings: RunSettings) -> SpeedTestResult<Self> {
        request.validate()?;
        if !validator::is_valid_url(&server.url) {
            return Err(SpeedTestError::invalid_config(format!("无效的URL: {}", server.url)));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            label: request.label.clone(),
            server,
            duration: request.duration(),
            worker_count: request.worker_count,
            client,
            settings,
            counter: Arc::new(SharedCounter::new()),
            sampler: Mutex::new(RateSampler::new(Instant::now())),
            start: None,
            deadline: None,
            workers: Vec::new(),
            state: RunState::Idle,
        })
    }

    /// 创建并立即启动
    pub fn launch(request: &RunRequest, server: Server, client: Client, settings: RunSettings) -> SpeedTestResult<Self> {
        let mut run = Self::new(request, server, client, settings)?;
        run.start()?;
        Ok(run)
    }

    /// Idle -> Running：记录起点、计算唯一的截止时间并启动所有连接
    pub fn start(&mut self) -> SpeedTestResult<()> {
        if self.state != RunState::Idle {
            return Err(SpeedTestError::invalid_config("测速已经启动"));
        }
        let start = Instant::now();
        let deadline = start
            .checked_add(self.duration)
            .ok_or_else(|| SpeedTestError::invalid_config(format!("测速时长过长: {:?}", self.duration)))?;
        self.start = Some(start);
        self.deadline = Some(deadline);
        self.sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset(start);

        log::info!(
            "[{}] 开始测速: {} / {} ({}), {} 个连接, {:.1} 秒",
            self.id,
            self.label,
            self.server.name,
            self.server.url,
            self.worker_count,
            self.duration.as_secs_f64()
        );

        self.workers = (0..self.worker_count)
            .map(|id| {
                let worker = DownloadWorker::new(
                    id,
                    self.client.clone(),
                    self.server.url.clone(),
                    Arc::clone(&self.counter),
                    deadline,
                )
                .with_backoff(self.settings.backoff)
                .with_chunk_size(self.settings.chunk_size);
                tokio::spawn(worker.run())
            })
            .collect();
        self.state = RunState::Running;
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn state(&self) -> RunState {
        if self.state == RunState::Running && self.counter.is_stopped() {
            RunState::Draining
        } else {
            self.state
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.counter.is_stopped()
    }

    /// 提前结束（与截止时间到达等价）
    pub fn stop(&self) {
        self.counter.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.counter))
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// 计算实时数据；截止时间已过时设置停止标志。不会修改字节计数。
    pub fn snapshot_at(&self, now: Instant) -> RunSnapshot {
        let (Some(start), Some(deadline)) = (self.start, self.deadline) else {
            return RunSnapshot::idle(self.duration);
        };
        if now >= deadline {
            self.counter.stop();
        }

        let bytes = self.counter.bytes();
        let mut sampler = self.sampler.lock().unwrap_or_else(PoisonError::into_inner);
        let (instantaneous_mbps, average_mbps) = sampler.record_tick(bytes, now);
        let elapsed = now.saturating_duration_since(start);

        RunSnapshot {
            elapsed,
            bytes_total: bytes,
            instantaneous_mbps,
            average_mbps,
            downloaded_mib: bytes as f64 / MIB,
            remaining: self.duration.saturating_sub(elapsed),
            sample_seq: sampler.samples_taken(),
        }
    }

    /// 按固定间隔轮询直到停止，然后收尾并返回结果
    pub async fn drive<F>(self, mut observer: F) -> RunResult
    where
        F: FnMut(&RunSnapshot),
    {
        let interval = self.settings.poll_interval;
        loop {
            let snapshot = self.snapshot();
            observer(&snapshot);
            if self.counter.is_stopped() {
                break;
            }
            tokio::time::sleep(interval).await;
        }
        self.finish().await
    }

    /// Draining -> Completed
    ///
    /// 每个连接最多等待 join_timeout；超时的连接被放弃（任务继续在后台运行，
    /// 看到停止标志后自行退出），字节计数已包含它之前计入的所有分块。
    pub async fn finish(mut self) -> RunResult {
        self.counter.stop();
        self.state = RunState::Draining;

        let waited_ms = self.settings.join_timeout.as_millis() as u64;
        for (worker, handle) in self.workers.drain(..).enumerate() {
            match tokio::time::timeout(self.settings.join_timeout, handle).await {
                Ok(Ok(report)) => log::debug!("[{}] 连接 {} 已退出: {} 字节", self.id, report.id, report.bytes),
                Ok(Err(e)) => log::error!("[{}] 连接 {} 异常退出: {}", self.id, worker, e),
                Err(_) => log::warn!("[{}] {}", self.id, SpeedTestError::DrainTimeout { worker, waited_ms }),
            }
        }

        self.state = RunState::Completed;
        let result = RunResult::from_totals(self.id, &self.label, &self.server, self.counter.bytes(), self.duration);
        log::info!(
            "[{}] 测速完成: {} 平均 {:.1} Mbps, 共 {:.1} MiB",
            self.id, self.label, result.avg_mbps, result.downloaded_mib
        );
        result
    }
}
