use async_trait::async_trait;
use reqwest::header::RANGE;
use reqwest::Client;
use crate::catalog::Server;
use crate::core::error::{SpeedTestError, SpeedTestResult};
use crate::core::http::HttpSettings;

/// 可达性检查
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn check(&self, url: &str) -> SpeedTestResult<()>;
}

/// 通过 `Range: bytes=0-0` 的 GET 请求确认服务器可用
#[derive(Debug, Clone)]
pub struct HttpReachability {
    client: Client,
}

impl HttpReachability {
    pub fn new(settings: &HttpSettings) -> SpeedTestResult<Self> {
        Ok(Self {
            client: settings.probe_client()?,
        })
    }
}

#[async_trait]
impl Reachability for HttpReachability {
    async fn check(&self, url: &str) -> SpeedTestResult<()> {
        let probe_failed = |reason: String| SpeedTestError::ProbeFailed {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| probe_failed(e.to_string()))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(probe_failed(format!("HTTP {}", status)));
        }

        // 只读首个数据帧：遵守 Range 的服务器只返回 1 字节；忽略 Range 返回 200 时
        // 也只取到一帧（通常几 KiB），随后丢弃响应断开连接，不读完整个文件
        response.chunk().await.map_err(|e| probe_failed(e.to_string()))?;
        Ok(())
    }
}

/// 选择结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub server: Server,
    /// false 表示所有候选都探测失败，退回第一个候选
    pub verified: bool,
}

/// 按顺序探测候选服务器，返回第一个可用的
pub struct EndpointProbe<R = HttpReachability> {
    checker: R,
}

impl EndpointProbe<HttpReachability> {
    pub fn http(settings: &HttpSettings) -> SpeedTestResult<Self> {
        Ok(Self::new(HttpReachability::new(settings)?))
    }
}

impl<R: Reachability> EndpointProbe<R> {
    pub fn new(checker: R) -> Self {
        Self { checker }
    }

    pub async fn pick(&self, candidates: &[Server]) -> SpeedTestResult<Selection> {
        let first = candidates
            .first()
            .ok_or_else(|| SpeedTestError::invalid_config("候选服务器列表为空"))?;

        for server in candidates {
            match self.checker.check(&server.url).await {
                Ok(()) => {
                    log::info!("选择服务器: {} ({})", server.name, server.url);
                    return Ok(Selection {
                        server: server.clone(),
                        verified: true,
                    });
                }
                Err(e) => log::warn!("服务器不可用: {} - {}", server.name, e),
            }
        }

        log::warn!("所有候选服务器探测失败，使用第一个: {}", first.name);
        Ok(Selection {
            server: first.clone(),
            verified: false,
        })
    }
}
