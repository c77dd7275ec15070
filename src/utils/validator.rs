use std::time::Duration;
use url::Url;
use crate::core::error::{SpeedTestError, SpeedTestResult};

/// 单次测速时长上限（一天）
pub const MAX_DURATION_SECS: f64 = 86_400.0;

/// 只接受 http/https 地址
pub fn is_valid_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

pub fn validate_thread_count(threads: usize) -> SpeedTestResult<()> {
    if threads == 0 {
        return Err(SpeedTestError::invalid_config("线程数必须大于0"));
    }
    Ok(())
}

pub fn validate_duration(secs: f64) -> SpeedTestResult<()> {
    if !(secs.is_finite() && secs > 0.0) {
        return Err(SpeedTestError::invalid_config(format!("测速时长必须大于0: {}", secs)));
    }
    if secs > MAX_DURATION_SECS || Duration::try_from_secs_f64(secs).is_err() {
        return Err(SpeedTestError::invalid_config(format!(
            "测速时长不能超过 {} 秒: {}",
            MAX_DURATION_SECS, secs
        )));
    }
    Ok(())
}

/// 界面展示用的短地址：host + path
pub fn short_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => {
                let host = match parsed.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                };
                let path = if parsed.path() == "/" { "" } else { parsed.path() };
                format!("{}{}", host, path)
            }
            None => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}
