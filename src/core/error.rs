use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum SpeedTestError {
    #[error("网络错误: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("服务器返回错误状态: HTTP {0}")]
    Status(u16),

    #[error("探测失败: {url} ({reason})")]
    ProbeFailed {
        url: String,
        reason: String,
    },

    #[error("下载中断: {0}")]
    Transient(String),

    #[error("配置无效: {0}")]
    InvalidConfig(String),

    #[error("配置文件解析失败: {0}")]
    ConfigParse(String),

    #[error("HTTP 客户端创建失败: {0}")]
    HttpClient(String),

    #[error("工作线程 {worker} 未能在 {waited_ms} 毫秒内退出")]
    DrainTimeout {
        worker: usize,
        waited_ms: u64,
    },
}

impl SpeedTestError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        SpeedTestError::InvalidConfig(msg.into())
    }

    /// 工作线程遇到这些错误时退避后重试，不会结束本次测速
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SpeedTestError::Network(_)
                | SpeedTestError::Io(_)
                | SpeedTestError::Status(_)
                | SpeedTestError::Transient(_)
                | SpeedTestError::ProbeFailed { .. }
        )
    }

    /// 只有构造阶段的配置错误会阻止测速启动
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SpeedTestError::InvalidConfig(_)
                | SpeedTestError::ConfigParse(_)
                | SpeedTestError::HttpClient(_)
        )
    }
}


pub type SpeedTestResult<T> = Result<T, SpeedTestError>;
