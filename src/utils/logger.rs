use chrono::Local; // 用于获取本地时间
use log::LevelFilter; // 用于设置日志级别
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

/// 文件日志设置
#[derive(Debug, Clone)]
pub struct LoggerSettings {
    pub file_path: String,
    pub level: LevelFilter,
    pub max_size: u64, // 最大文件大小 (bytes)
}

impl LoggerSettings {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            file_path: config.log_file.clone(),
            level: parse_level(&config.log_level),
            max_size: config.log_max_size,
        }
    }
}

/// 无法识别的级别按 info 处理
pub fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::Info)
}

/// 超过最大大小时把当前日志改名为 .backup
pub fn rotate_if_needed(file_path: &str, max_size: u64) -> Result<bool, std::io::Error> {
    let size = match std::fs::metadata(file_path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if size <= max_size {
        return Ok(false);
    }
    let backup_path = format!("{}.backup", file_path);
    if Path::new(&backup_path).exists() {
        std::fs::remove_file(&backup_path)?;
    }
    std::fs::rename(file_path, &backup_path)?;
    Ok(true)
}

fn open_log_file(file_path: &str) -> Result<File, std::io::Error> {
    // 确保日志目录存在
    if let Some(parent) = Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(file_path)
}

fn builder(settings: &LoggerSettings, file: File) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(settings.level)
        // 依赖库的日志只保留警告以上
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Warn)
        .parse_env("RUST_LOG")
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(file)));
    builder
}

/// 初始化全局日志，输出到文件，避免干扰终端实时界面
pub fn init(settings: &LoggerSettings) -> Result<(), std::io::Error> {
    rotate_if_needed(&settings.file_path, settings.max_size)?;
    let file = open_log_file(&settings.file_path)?;
    builder(settings, file)
        .try_init()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN "), LevelFilter::Warn);
        assert_eq!(parse_level("verbose"), LevelFilter::Info);
    }

    #[test]
    fn test_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let path = path.to_str().unwrap();

        assert!(!rotate_if_needed(path, 10).unwrap());

        std::fs::write(path, "short").unwrap();
        assert!(!rotate_if_needed(path, 10).unwrap());

        std::fs::write(path, "a line longer than ten bytes").unwrap();
        assert!(rotate_if_needed(path, 10).unwrap());
        assert!(!Path::new(path).exists());
        assert!(Path::new(&format!("{}.backup", path)).exists());
    }

    #[test]
    fn test_log_format_written_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("app.log");
        let settings = LoggerSettings {
            file_path: path.to_str().unwrap().to_string(),
            level: LevelFilter::Info,
            max_size: 1024,
        };

        let logger = builder(&settings, open_log_file(&settings.file_path).unwrap()).build();
        log::Log::log(
            &logger,
            &log::Record::builder()
                .args(format_args!("测速开始"))
                .level(log::Level::Info)
                .target("multispeed")
                .build(),
        );
        log::Log::flush(&logger);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[INFO] - 测速开始"));
    }
}
