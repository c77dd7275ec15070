//! Core: 测速引擎
//!
//! - `counter`: 共享字节计数器和停止标志
//! - `sampler`: 瞬时/平均速率采样
//! - `probe`: 测速前选择可用的镜像
//! - `worker`: 单个下载连接
//! - `run`: 一次限时测速的生命周期
//! - `batch`: 依次测试多个区域

pub mod batch;
pub mod counter;
pub mod error;
pub mod http;
pub mod probe;
pub mod run;
pub mod sampler;
pub mod worker;

pub use batch::{BatchProgress, BatchReport, BatchRunner, BatchTarget, BATCH_RUN_DURATION};
pub use counter::SharedCounter;
pub use error::{SpeedTestError, SpeedTestResult};
pub use http::HttpSettings;
pub use probe::{EndpointProbe, HttpReachability, Reachability, Selection};
pub use run::{RunRequest, RunResult, RunSettings, RunSnapshot, RunState, StopHandle, ThroughputRun};
pub use sampler::RateSampler;
pub use worker::{DownloadWorker, WorkerReport, WorkerState};
