use std::time::Duration;
use tokio::time::Instant;

/// 瞬时速率的采样窗口
pub const SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// 计算平均速率时的最小耗时（秒），避免除以零
const MIN_ELAPSED_SECS: f64 = 1e-6;

/// 字节数 + 时间差 -> Mbps
pub fn mbps(bytes: u64, secs: f64) -> f64 {
    (bytes as f64 * 8.0) / (secs.max(MIN_ELAPSED_SECS) * 1_000_000.0)
}

/// 速率采样器
///
/// 瞬时速率只在距离上一个采样点至少 1 秒时重新计算，两次采样之间保持不变；
/// 平均速率每次调用都按总字节数重新计算。
#[derive(Debug, Clone)]
pub struct RateSampler {
    start: Instant,
    last_sample_bytes: u64,
    last_sample_time: Instant,
    instantaneous_mbps: f64,
    samples_taken: u64,
}

impl RateSampler {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            last_sample_bytes: 0,
            last_sample_time: start,
            instantaneous_mbps: 0.0,
            samples_taken: 0,
        }
    }

    pub fn reset(&mut self, start: Instant) {
        *self = Self::new(start);
    }

    /// 记录一次轮询，返回 (瞬时 Mbps, 平均 Mbps)
    pub fn record_tick(&mut self, now_bytes: u64, now: Instant) -> (f64, f64) {
        let since_last = now.saturating_duration_since(self.last_sample_time);
        if since_last >= SAMPLE_WINDOW {
            let delta = now_bytes.saturating_sub(self.last_sample_bytes);
            self.instantaneous_mbps = mbps(delta, since_last.as_secs_f64());
            self.last_sample_bytes = now_bytes;
            self.last_sample_time = now;
            self.samples_taken += 1;
        }
        (self.instantaneous_mbps, self.average_mbps(now_bytes, now))
    }

    pub fn average_mbps(&self, now_bytes: u64, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        mbps(now_bytes, elapsed)
    }

    pub fn instantaneous_mbps(&self) -> f64 {
        self.instantaneous_mbps
    }

    /// 已经越过的采样边界数
    pub fn samples_taken(&self) -> u64 {
        self.samples_taken
    }

    pub fn start(&self) -> Instant {
        self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instantaneous_only_changes_on_second_boundaries() {
        let start = Instant::now();
        let mut sampler = RateSampler::new(start);
        let mut distinct: Vec<f64> = Vec::new();

        // 0.3 秒一次，共 3 秒（含起点共 11 次）；字节增量逐次变大，保证每次采样值都不同
        for i in 0..=10u64 {
            let now = start + Duration::from_millis(300 * i);
            let bytes = i * i * 100_000;
            let (inst, _) = sampler.record_tick(bytes, now);
            if distinct.last() != Some(&inst) {
                distinct.push(inst);
            }
        }

        // 初始值 0 + 1.2 秒、2.4 秒两个采样点
        assert_eq!(distinct.len(), 3);
        assert_eq!(distinct[0], 0.0);
        assert_eq!(sampler.samples_taken(), 2);
    }

    #[test]
    fn test_instantaneous_uses_window_delta() {
        let start = Instant::now();
        let mut sampler = RateSampler::new(start);

        let (inst, _) = sampler.record_tick(125_000, start + Duration::from_secs(1));
        assert!((inst - 1.0).abs() < 1e-9);

        // 不足 1 秒：保持上一次的值
        let (inst, _) = sampler.record_tick(10_000_000, start + Duration::from_millis(1500));
        assert!((inst - 1.0).abs() < 1e-9);

        let (inst, _) = sampler.record_tick(375_000, start + Duration::from_secs(2));
        assert!((inst - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_is_total_over_elapsed() {
        let start = Instant::now();
        let mut sampler = RateSampler::new(start);
        let (_, avg) = sampler.record_tick(2_500_000, start + Duration::from_secs(4));
        assert!((avg - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_at_zero_elapsed_is_finite() {
        let start = Instant::now();
        let mut sampler = RateSampler::new(start);
        let (inst, avg) = sampler.record_tick(0, start);
        assert_eq!(inst, 0.0);
        assert!(avg.is_finite());
        assert_eq!(avg, 0.0);

        let (_, avg) = sampler.record_tick(1, start);
        assert!(avg.is_finite());
        assert!(avg > 0.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let start = Instant::now();
        let mut sampler = RateSampler::new(start);
        sampler.record_tick(1_000_000, start + Duration::from_secs(2));
        assert!(sampler.instantaneous_mbps() > 0.0);

        let restart = start + Duration::from_secs(10);
        sampler.reset(restart);
        assert_eq!(sampler.instantaneous_mbps(), 0.0);
        assert_eq!(sampler.samples_taken(), 0);
        assert_eq!(sampler.start(), restart);
    }
}
