use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use crate::core::error::SpeedTestError;
use crate::core::probe::{EndpointProbe, HttpReachability, Reachability};
use crate::core::run::{RunRequest, RunResult, RunSettings, RunSnapshot, ThroughputRun};

/// all 模式下每个区域的测速时长，比单区域模式（60 秒）短，用来限制总耗时
pub const BATCH_RUN_DURATION: Duration = Duration::from_secs(15);

/// 批量测速中的一个目标
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTarget {
    /// 目标标识（区域代码）
    pub code: String,
    pub request: RunRequest,
}

/// 轮询回调收到的进度
#[derive(Debug)]
pub struct BatchProgress<'a> {
    pub index: usize,
    pub total: usize,
    pub code: &'a str,
    pub label: &'a str,
    pub server_name: &'a str,
    pub snapshot: &'a RunSnapshot,
    /// 已完成目标的结果，按代码索引
    pub completed: &'a HashMap<String, RunResult>,
}

/// 批量测速结果
#[derive(Debug, Default)]
pub struct BatchReport {
    /// 按输入顺序排列
    pub results: Vec<RunResult>,
    pub by_code: HashMap<String, RunResult>,
    /// 因配置错误未能启动的目标
    pub skipped: Vec<(String, SpeedTestError)>,
}

impl BatchReport {
    pub fn get(&self, code: &str) -> Option<&RunResult> {
        self.by_code.get(code)
    }
}

/// 每秒瞬时采样的最小/最大值
#[derive(Debug, Clone, Copy, Default)]
struct SampleRange {
    min: Option<f64>,
    max: Option<f64>,
}

impl SampleRange {
    fn push(&mut self, value: f64) {
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    /// 没有任何采样时退回平均值
    fn resolve(&self, fallback: f64) -> (f64, f64) {
        (self.min.unwrap_or(fallback), self.max.unwrap_or(fallback))
    }
}

/// 依次对每个目标执行探测 + 测速
pub struct BatchRunner<R = HttpReachability> {
    probe: EndpointProbe<R>,
    client: Client,
    settings: RunSettings,
    duration: Duration,
}

impl<R: Reachability> BatchRunner<R> {
    pub fn new(probe: EndpointProbe<R>, client: Client, settings: RunSettings) -> Self {
        Self {
            probe,
            client,
            settings,
            duration: BATCH_RUN_DURATION,
        }
    }

    #[cfg(test)]
    fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub async fn run_all<F>(&self, targets: &[BatchTarget], mut observer: F) -> BatchReport
    where
        F: FnMut(&BatchProgress<'_>),
    {
        let mut report = BatchReport::default();
        let total = targets.len();

        for (index, target) in targets.iter().enumerate() {
            let mut request = target.request.clone();
            request.duration_secs = self.duration.as_secs_f64();

            if let Err(e) = request.validate() {
                log::error!("跳过 {}: {}", target.code, e);
                report.skipped.push((target.code.clone(), e));
                continue;
            }

            let selection = match self.probe.pick(&request.candidates).await {
                Ok(selection) => selection,
                Err(e) => {
                    report.skipped.push((target.code.clone(), e));
                    continue;
                }
            };
            if !selection.verified {
                log::warn!("{}: 没有可用的服务器，仍使用 {}", target.code, selection.server.url);
            }

            let run = match ThroughputRun::launch(&request, selection.server, self.client.clone(), self.settings.clone()) {
                Ok(run) => run,
                Err(e) => {
                    log::error!("跳过 {}: {}", target.code, e);
                    report.skipped.push((target.code.clone(), e));
                    continue;
                }
            };

            let server_name = run.server().name.clone();
            let mut range = SampleRange::default();
            let mut last_seq = 0;
            let completed = &report.by_code;
            let result = run
                .drive(|snapshot| {
                    if snapshot.sample_seq != last_seq {
                        last_seq = snapshot.sample_seq;
                        range.push(snapshot.instantaneous_mbps);
                    }
                    observer(&BatchProgress {
                        index,
                        total,
                        code: &target.code,
                        label: &request.label,
                        server_name: &server_name,
                        snapshot,
                        completed,
                    });
                })
                .await;

            let (min, max) = range.resolve(result.avg_mbps);
            let result = result.with_range(min, max);
            report.by_code.insert(target.code.clone(), result.clone());
            report.results.push(result);
        }

        report
    }
}
