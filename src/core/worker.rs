use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use crate::core::counter::SharedCounter;
use crate::core::error::{SpeedTestError, SpeedTestResult};

/// 默认单次读取的最大分块
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;
/// 下载失败后的固定退避
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);

/// 工作线程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Connecting,
    Streaming,
    BackingOff,
    Stopped,
}

/// 工作线程退出时的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub id: usize,
    pub requests: u64,
    pub chunks: u64,
    pub bytes: u64,
    pub failures: u64,
}

/// 单个下载连接
///
/// 反复对同一地址发起完整 GET，直到截止时间或停止标志；请求失败时退避后重连，
/// 不会提前结束整个测速。
pub struct DownloadWorker {
    id: usize,
    client: Client,
    url: String,
    counter: Arc<SharedCounter>,
    deadline: Instant,
    backoff: Duration,
    chunk_size: usize,
}

impl DownloadWorker {
    pub fn new(id: usize, client: Client, url: String, counter: Arc<SharedCounter>, deadline: Instant) -> Self {
        Self {
            id,
            client,
            url,
            counter,
            deadline,
            backoff: DEFAULT_BACKOFF,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub async fn run(self) -> WorkerReport {
        let mut report = WorkerReport {
            id: self.id,
            ..Default::default()
        };
        let mut state = WorkerState::Connecting;
        let mut response = None;

        loop {
            state = match state {
                WorkerState::Connecting => {
                    if self.should_stop() {
                        WorkerState::Stopped
                    } else {
                        report.requests += 1;
                        match self.connect().await {
                            Ok(Some(resp)) => {
                                response = Some(resp);
                                WorkerState::Streaming
                            }
                            Ok(None) => WorkerState::Stopped,
                            Err(e) if e.is_retryable() => {
                                report.failures += 1;
                                log::debug!("连接 {} 请求失败: {}", self.id, e);
                                WorkerState::BackingOff
                            }
                            Err(e) => {
                                report.failures += 1;
                                log::error!("连接 {} 无法继续: {}", self.id, e);
                                WorkerState::Stopped
                            }
                        }
                    }
                }
                WorkerState::Streaming => match response.take() {
                    Some(resp) => self.stream(resp, &mut report).await,
                    None => WorkerState::Connecting,
                },
                WorkerState::BackingOff => self.back_off().await,
                WorkerState::Stopped => break,
            };
        }

        log::debug!(
            "连接 {} 退出: 请求 {} 次, 失败 {} 次, {} 字节",
            report.id, report.requests, report.failures, report.bytes
        );
        report
    }

    /// 停止标志已设置，或截止时间已过（此时顺带设置停止标志）
    fn should_stop(&self) -> bool {
        if self.counter.is_stopped() {
            return true;
        }
        if Instant::now() >= self.deadline {
            self.counter.stop();
            return true;
        }
        false
    }

    /// Ok(None) 表示等待响应期间测速已经结束
    async fn connect(&self) -> SpeedTestResult<Option<Response>> {
        let request = self.client.get(&self.url).send();
        tokio::select! {
            biased;
            _ = self.counter.stopped() => Ok(None),
            _ = tokio::time::sleep_until(self.deadline) => {
                self.counter.stop();
                Ok(None)
            }
            result = request => {
                let response = result?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SpeedTestError::Status(status.as_u16()));
                }
                Ok(Some(response))
            }
        }
    }

    async fn stream(&self, response: Response, report: &mut WorkerReport) -> WorkerState {
        let mut body = response.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                _ = self.counter.stopped() => return WorkerState::Stopped,
                _ = tokio::time::sleep_until(self.deadline) => {
                    self.counter.stop();
                    return WorkerState::Stopped;
                }
                next = body.next() => next,
            };

            match next {
                // 响应体读完，重新请求
                None => return WorkerState::Connecting,
                Some(Err(e)) => {
                    report.failures += 1;
                    log::debug!("连接 {} 读取中断: {}", self.id, SpeedTestError::Transient(e.to_string()));
                    return WorkerState::BackingOff;
                }
                Some(Ok(chunk)) => {
                    if !self.account(&chunk, report) {
                        return WorkerState::Stopped;
                    }
                }
            }
        }
    }

    /// 把收到的数据按 chunk_size 计入计数器；返回 false 表示应当停止
    fn account(&self, chunk: &Bytes, report: &mut WorkerReport) -> bool {
        for piece in chunk.chunks(self.chunk_size) {
            if self.counter.is_stopped() {
                return false;
            }
            let len = piece.len() as u64;
            self.counter.add(len);
            report.bytes += len;
            report.chunks += 1;
            // 已计入的分块保留，不回滚
            if Instant::now() >= self.deadline {
                self.counter.stop();
                return false;
            }
        }
        true
    }

    async fn back_off(&self) -> WorkerState {
        if self.counter.is_stopped() {
            return WorkerState::Stopped;
        }
        tokio::select! {
            biased;
            _ = self.counter.stopped() => WorkerState::Stopped,
            _ = tokio::time::sleep(self.backoff) => WorkerState::Connecting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY_SIZE: usize = 64 * 1024;

    async fn mount_body(server: &MockServer, url_path: &str) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xABu8; BODY_SIZE]))
            .mount(server)
            .await;
    }

    fn worker(id: usize, url: String, counter: &Arc<SharedCounter>, window: Duration) -> DownloadWorker {
        DownloadWorker::new(id, Client::new(), url, Arc::clone(counter), Instant::now() + window)
    }

    #[tokio::test]
    async fn test_worker_streams_until_deadline() {
        let server = MockServer::start().await;
        mount_body(&server, "/data.bin").await;

        let counter = Arc::new(SharedCounter::new());
        let started = Instant::now();
        let report = worker(0, format!("{}/data.bin", server.uri()), &counter, Duration::from_millis(300))
            .run()
            .await;

        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(counter.is_stopped());
        assert!(report.bytes > 0);
        assert_eq!(report.bytes, counter.bytes());
        assert_eq!(report.failures, 0);
    }

    #[tokio::test]
    async fn test_worker_resumes_after_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky.bin"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_body(&server, "/flaky.bin").await;

        let counter = Arc::new(SharedCounter::new());
        let report = worker(1, format!("{}/flaky.bin", server.uri()), &counter, Duration::from_millis(800))
            .with_backoff(Duration::from_millis(50))
            .run()
            .await;

        assert_eq!(report.failures, 2);
        assert!(report.requests > 2);
        assert!(report.bytes > 0);
        assert_eq!(counter.bytes(), report.bytes);
    }

    /// 声明 1000000 字节但只发送一小段就断开的服务器
    async fn truncating_server(partial: usize) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let head = "HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\nConnection: close\r\n\r\n";
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&vec![0x5Au8; partial]).await;
                    let _ = socket.flush().await;
                    // socket 在这里被丢弃，连接中途断开
                });
            }
        });
        format!("http://{}/reset.bin", addr)
    }

    #[tokio::test]
    async fn test_worker_keeps_counting_after_connection_reset() {
        const PARTIAL: usize = 4096;
        let url = truncating_server(PARTIAL).await;

        let counter = Arc::new(SharedCounter::new());
        let report = worker(5, url, &counter, Duration::from_millis(700))
            .with_backoff(Duration::from_millis(20))
            .run()
            .await;

        assert!(report.failures >= 2, "failures = {}", report.failures);
        // 截止时可能停在退避中，最后一次不会再发请求
        assert!(report.requests >= report.failures);
        assert!(report.bytes > PARTIAL as u64, "bytes = {}", report.bytes);
        assert_eq!(counter.bytes(), report.bytes);
        assert!(counter.is_stopped());
    }

    #[tokio::test]
    async fn test_worker_exits_immediately_when_already_stopped() {
        let counter = Arc::new(SharedCounter::new());
        counter.stop();

        let report = worker(2, "http://127.0.0.1:9/never".to_string(), &counter, Duration::from_secs(30))
            .run()
            .await;

        assert_eq!(report.requests, 0);
        assert_eq!(counter.bytes(), 0);
    }

    #[tokio::test]
    async fn test_stop_interrupts_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let counter = Arc::new(SharedCounter::new());
        let handle = tokio::spawn(
            worker(3, format!("{}/broken", server.uri()), &counter, Duration::from_secs(60))
                .with_backoff(Duration::from_secs(30))
                .run(),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        counter.stop();

        let report = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("退避中的连接应当立即退出")
            .unwrap();
        assert!(report.failures >= 1);
        assert_eq!(report.bytes, 0);
    }

    #[tokio::test]
    async fn test_chunks_are_bounded_by_chunk_size() {
        let server = MockServer::start().await;
        mount_body(&server, "/data.bin").await;

        let counter = Arc::new(SharedCounter::new());
        let report = worker(4, format!("{}/data.bin", server.uri()), &counter, Duration::from_millis(200))
            .with_chunk_size(1024)
            .run()
            .await;

        assert!(report.bytes > 0);
        assert!(report.chunks >= report.bytes / 1024);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_workers_account_exactly() {
        let server = MockServer::start().await;
        mount_body(&server, "/data.bin").await;

        let counter = Arc::new(SharedCounter::new());
        let deadline = Instant::now() + Duration::from_millis(400);
        let handles: Vec<_> = (0..4)
            .map(|id| {
                let w = DownloadWorker::new(
                    id,
                    Client::new(),
                    format!("{}/data.bin", server.uri()),
                    Arc::clone(&counter),
                    deadline,
                );
                tokio::spawn(w.run())
            })
            .collect();

        let mut sum = 0;
        for handle in handles {
            sum += handle.await.unwrap().bytes;
        }
        assert!(sum > 0);
        assert_eq!(sum, counter.bytes());
    }
}
