use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use crate::core::error::SpeedTestError;
use crate::utils::validator;

/// 配置结构体
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 默认并发下载线程数
    pub thread_count: usize,
    /// 单区域测速时长（秒）
    pub duration_secs: f64,
    /// User-Agent
    pub user_agent: String,
    /// 探测请求超时（秒），必须小于下载超时
    pub probe_timeout: u64,
    /// 下载连接/读取超时（秒）
    pub download_timeout: u64,
    /// 下载失败后的退避时间（毫秒）
    pub retry_delay_ms: u64,
    /// 单次流式读取的最大分块（字节）
    pub chunk_size: usize,
    /// 界面刷新间隔（毫秒）
    pub ui_refresh_ms: u64,
    /// 结束时等待每个工作线程的时长（毫秒）
    pub join_timeout_ms: u64,
    /// 最大重定向次数
    pub max_redirects: usize,
    /// 日志文件路径
    pub log_file: String,
    /// 日志级别
    pub log_level: String,
    /// 日志文件最大大小（字节），超过后启动时轮转
    pub log_max_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thread_count: 8,
            duration_secs: 60.0,
            user_agent: "multispeed/1.0".to_string(),
            probe_timeout: 8,
            download_timeout: 12,
            retry_delay_ms: 200,
            chunk_size: 256 * 1024,
            ui_refresh_ms: 200,
            join_timeout_ms: 200,
            max_redirects: 10,
            log_file: "logs/multispeed.log".to_string(),
            log_level: "info".to_string(),
            log_max_size: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// 加载配置文件，不存在时写入默认配置
    pub fn load(path: &str) -> Result<Self, SpeedTestError> {
        if Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            match toml::from_str(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    log::warn!("配置文件格式错误: {}，将使用默认配置", e);
                    eprintln!("配置文件格式错误: {}，将使用默认配置", e);
                    let config = Config::default();
                    config.save_with_tutorial(path)?;
                    Ok(config)
                }
            }
        } else {
            let config = Config::default();
            config.save_with_tutorial(path)?;
            Ok(config)
        }
    }

    /// 保存带教程的配置文件（唯一写入方法）
    pub fn save_with_tutorial(&self, path: &str) -> Result<(), SpeedTestError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let config_content = toml::to_string_pretty(self)
            .map_err(|e| SpeedTestError::ConfigParse(format!("无法序列化配置: {}", e)))?;
        let full_content = format!("{}\n\n{}", Config::generate_tutorial_content(), config_content);
        fs::write(path, full_content)?;
        Ok(())
    }

    fn generate_tutorial_content() -> &'static str {
        r#"# multispeed 配置文件
# ====================
#
# TOML 格式。命令行参数会覆盖这里的设置，优先级：命令行 > 配置文件 > 默认值
#
# 配置文件位置：
# - Windows: %APPDATA%/multispeed/multispeed.conf
# - macOS: ~/Library/Application Support/multispeed/multispeed.conf
# - Linux: ~/.config/multispeed/multispeed.conf
#
# 使用示例：
#   multispeed                      # 交互式菜单
#   multispeed -r de                # 测试德国节点
#   multispeed -r all               # 依次测试所有区域（每个区域 15 秒）
#   multispeed -r custom -u URL     # 测试自定义下载地址
#   multispeed -t 16 -r us          # 使用 16 个并发连接

# ==================== 测速设置 ====================
#
# thread_count     并发下载连接数，高速网络建议 8-16
# duration_secs    单区域测速时长（秒）；all 模式固定 15 秒
#
# ==================== 网络设置 ====================
#
# user_agent       所有请求携带的 User-Agent
# probe_timeout    选择服务器时的探测超时（秒），必须小于 download_timeout
# download_timeout 下载连接/读取超时（秒）
# retry_delay_ms   下载失败后等待多久再重连（毫秒）
# chunk_size       单次读取的最大字节数
# max_redirects    最大重定向次数
#
# ==================== 界面与日志 ====================
#
# ui_refresh_ms    实时界面刷新间隔（毫秒）
# join_timeout_ms  测速结束时等待每个连接退出的时长（毫秒）
# log_file         日志文件路径（日志不会输出到终端）
# log_level        error / warn / info / debug / trace，可被 RUST_LOG 覆盖
# log_max_size     日志文件超过该大小（字节）时在启动时轮转为 .backup

# ==================== 配置项 ===================="#
    }

    /// 校验配置合法性
    pub fn validate(&self) -> Result<(), SpeedTestError> {
        validator::validate_thread_count(self.thread_count)?;
        validator::validate_duration(self.duration_secs)?;
        if self.user_agent.trim().is_empty() {
            return Err(SpeedTestError::invalid_config("User-Agent 不能为空"));
        }
        if self.probe_timeout == 0 || self.download_timeout == 0 {
            return Err(SpeedTestError::invalid_config("超时时间必须大于0"));
        }
        if self.probe_timeout >= self.download_timeout {
            return Err(SpeedTestError::invalid_config("探测超时必须小于下载超时"));
        }
        if self.chunk_size == 0 {
            return Err(SpeedTestError::invalid_config("分块大小必须大于0"));
        }
        if self.ui_refresh_ms == 0 {
            return Err(SpeedTestError::invalid_config("界面刷新间隔必须大于0"));
        }
        Ok(())
    }

    /// 合并命令行参数到配置
    pub fn merge_from_args(&mut self, args: &crate::cli::Args) {
        if let Some(threads) = args.threads {
            self.thread_count = threads;
        }
        if let Some(duration) = args.duration {
            self.duration_secs = duration;
        }
    }

    pub fn ui_refresh(&self) -> Duration {
        Duration::from_millis(self.ui_refresh_ms)
    }

    /// 获取配置摘要信息
    pub fn get_summary(&self) -> String {
        format!(
            "配置摘要:\n\
            - 并发连接: {}\n\
            - 测速时长: {} 秒\n\
            - 探测超时: {} 秒\n\
            - 下载超时: {} 秒\n\
            - 重连间隔: {} 毫秒\n\
            - 分块大小: {} KiB\n\
            - 日志文件: {}",
            self.thread_count,
            self.duration_secs,
            self.probe_timeout,
            self.download_timeout,
            self.retry_delay_ms,
            self.chunk_size / 1024,
            self.log_file,
        )
    }
}
