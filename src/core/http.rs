use reqwest::Client;
use std::time::Duration;
use crate::config::Config;
use crate::core::error::{SpeedTestError, SpeedTestResult};

/// 探测与下载共用的 HTTP 参数
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub probe_timeout: Duration,
    pub download_timeout: Duration,
    pub max_redirects: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for HttpSettings {
    fn from(config: &Config) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            probe_timeout: Duration::from_secs(config.probe_timeout),
            download_timeout: Duration::from_secs(config.download_timeout),
            max_redirects: config.max_redirects,
        }
    }
}

impl HttpSettings {
    /// 探测用客户端：整个请求受较短的总超时约束
    pub fn probe_client(&self) -> SpeedTestResult<Client> {
        Client::builder()
            .timeout(self.probe_timeout)
            .user_agent(&self.user_agent)
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .build()
            .map_err(|e| SpeedTestError::HttpClient(e.to_string()))
    }

    /// 下载用客户端：只限制连接和单次读取，整体下载可以持续整个测速窗口
    pub fn download_client(&self) -> SpeedTestResult<Client> {
        Client::builder()
            .connect_timeout(self.download_timeout)
            .read_timeout(self.download_timeout)
            .user_agent(&self.user_agent)
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .build()
            .map_err(|e| SpeedTestError::HttpClient(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.user_agent = "probe-test/2.0".to_string();
        config.probe_timeout = 3;

        let settings = HttpSettings::from(&config);
        assert_eq!(settings.user_agent, "probe-test/2.0");
        assert_eq!(settings.probe_timeout, Duration::from_secs(3));
        assert_eq!(settings.download_timeout, Duration::from_secs(12));
        assert!(settings.probe_timeout < settings.download_timeout);
    }

    #[test]
    fn test_clients_build() {
        let settings = HttpSettings::default();
        assert!(settings.probe_client().is_ok());
        assert!(settings.download_client().is_ok());
    }
}
