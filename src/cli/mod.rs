//! CLI: 命令行接口和参数解析模块
//!
//! ## 主要功能
//!
//! - 命令行参数解析和验证
//! - 配置文件路径管理
//! - 测速目标选择（命令行参数或交互菜单）
//! - 配置文件编辑器集成
//!
//! ## 支持的命令
//!
//! - 交互选择：`multispeed`
//! - 指定区域：`multispeed -r de`
//! - 依次测试全部区域：`multispeed -r all`
//! - 自定义地址：`multispeed -u https://example.com/1GB.bin`
//! - 编辑配置：`multispeed -e`
//!
//! ## 平台支持
//!
//! - Windows: `%APPDATA%/multispeed/multispeed.conf`
//! - macOS: `~/Library/Application Support/multispeed/multispeed.conf`
//! - Linux: `~/.config/multispeed/multispeed.conf`

use clap::Parser;
use std::env;
use std::io::{self, BufRead, Write};
use crate::catalog::{self, Region};
use crate::config::Config;
use crate::core::error::SpeedTestError;
use crate::utils::validator::is_valid_url;

/// 菜单直接回车时使用的区域
pub const DEFAULT_REGION: &str = "ru";

/// 获取平台默认配置文件路径
pub fn default_config_path() -> String {
    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        format!("{}/multispeed/multispeed.conf", appdata)
    }
    #[cfg(target_os = "macos")]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/Library/Application Support/multispeed/multispeed.conf", home)
    }
    #[cfg(target_os = "linux")]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.config/multispeed/multispeed.conf", home)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        "multispeed.conf".to_string()
    }
}

/// 打开配置文件编辑器
pub fn open_config_in_editor(config_path: &str) {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("notepad").arg(config_path).status().ok();
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg("-e").arg(config_path).status().ok();
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // 优先 $EDITOR，其次 xdg-open，最后 nano
        let editor = env::var("EDITOR").ok();
        let opened = editor
            .map(|e| std::process::Command::new(e).arg(config_path).status().is_ok())
            .unwrap_or(false);
        if !opened && std::process::Command::new("xdg-open").arg(config_path).status().is_err() {
            let _ = std::process::Command::new("nano").arg(config_path).status();
        }
    }
}

fn long_version() -> &'static str {
    concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("VERGEN_BUILD_TIMESTAMP"), ")")
}

/// multispeed 命令行参数
///
/// 示例用法：
///   multispeed             # 交互选择区域
///   multispeed -r de -t 16
///   multispeed -r all
///   multispeed -u https://example.com/1GB.bin --duration 30
///
/// 更多用法请加 --help 查看
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "multispeed",
    author = "panzhifu",
    version = env!("CARGO_PKG_VERSION"),
    long_version = long_version(),
    about = "一个用 Rust 编写的多连接下载测速工具",
    long_about = "通过多个并发 HTTP 连接下载大文件，测量一段时间内的平均下载速度。\n\n示例：\n  multispeed\n  multispeed -r de\n  multispeed -r all\n  multispeed -u https://example.com/1GB.bin\n"
)]
pub struct Args {
    /// 区域代码，或 all / custom
    #[arg(short = 'r', long, help = "区域代码（如 ru、de、jp），all 依次测试全部区域，custom 使用自定义地址。")]
    pub region: Option<String>,

    /// 并发连接数
    #[arg(short = 't', long, help = "并发连接数，覆盖配置文件中的设置。")]
    pub threads: Option<usize>,

    /// 自定义下载地址，跳过区域探测
    #[arg(short = 'u', long, help = "自定义下载地址，指定后直接测速该地址。")]
    pub url: Option<String>,

    /// 单次测速时长（秒）
    #[arg(long, help = "单次测速时长（秒），覆盖配置文件中的设置；all 模式固定为 15 秒。")]
    pub duration: Option<f64>,

    /// 配置文件路径，默认为平台推荐路径
    #[arg(short = 'c', long, default_value_t = default_config_path(), help = "配置文件路径，默认为平台推荐路径。")]
    pub config: String,

    /// 编辑配置文件
    #[arg(short = 'e', long = "edit", help = "用系统默认编辑器打开配置文件并退出。")]
    pub edit_config: bool,

    /// 列出内置区域
    #[arg(short = 'L', long = "list", help = "列出内置的区域和服务器并退出。")]
    pub list: bool,

    /// 以 JSON 输出结果
    #[arg(long, help = "测速结束后把结果以 JSON 输出到标准输出。")]
    pub json: bool,

    /// 关闭实时界面
    #[arg(long = "no-ui", help = "不显示实时面板，只输出最终结果。")]
    pub no_ui: bool,
}

/// 本次要执行的测速
#[derive(Debug, Clone)]
pub enum Choice {
    Region(&'static Region),
    All,
    Custom(String),
}

impl Args {
    pub fn parse_args() -> Result<(Self, Config), SpeedTestError> {
        let args = Args::parse();
        let config = args.load_config()?;
        Ok((args, config))
    }

    /// 加载（必要时创建）配置文件，合并命令行参数并验证
    pub fn load_config(&self) -> Result<Config, SpeedTestError> {
        let mut config = Config::load(&self.config)?;
        config.merge_from_args(self);
        config.validate()?;
        Ok(config)
    }

    /// 根据参数决定测速目标，未指定区域时返回 None（需要交互选择）
    pub fn preset_choice(&self) -> Result<Option<Choice>, SpeedTestError> {
        if let Some(url) = &self.url {
            return custom_url(url).map(Some);
        }
        match self.region.as_deref().map(str::trim) {
            None => Ok(None),
            Some(code) => match parse_choice(code) {
                Some(Choice::Custom(_)) => Ok(None),
                Some(choice) => Ok(Some(choice)),
                None => Err(SpeedTestError::invalid_config(format!("未知的区域代码: {}", code))),
            },
        }
    }

    /// 命令行指定 -r custom 但没有给出地址
    pub fn wants_custom(&self) -> bool {
        self.url.is_none()
            && self
                .region
                .as_deref()
                .map_or(false, |r| r.trim().eq_ignore_ascii_case("custom"))
    }
}

fn custom_url(url: &str) -> Result<Choice, SpeedTestError> {
    let url = url.trim();
    if !is_valid_url(url) {
        return Err(SpeedTestError::invalid_config(format!("无效的下载地址: {}", url)));
    }
    Ok(Choice::Custom(url.to_string()))
}

/// 解析菜单输入；custom 的地址留空，稍后再询问
pub fn parse_choice(input: &str) -> Option<Choice> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return Some(Choice::All);
    }
    if input.eq_ignore_ascii_case("custom") {
        return Some(Choice::Custom(String::new()));
    }
    catalog::region(input).map(Choice::Region)
}

/// 打印区域列表（菜单和 --list 共用）
pub fn write_region_table<W: Write>(output: &mut W, with_servers: bool) -> io::Result<()> {
    writeln!(output, "{:<8}{}", "代码", "区域")?;
    for region in catalog::regions_in_order() {
        writeln!(output, "{:<8}{}", region.code, region.title)?;
        if with_servers {
            for server in region.servers() {
                writeln!(output, "        - {} {}", server.name, server.url)?;
            }
        }
    }
    writeln!(output, "{:<8}{}", "all", "依次测试全部区域（每个 15 秒）")?;
    writeln!(output, "{:<8}{}", "custom", "自定义下载地址")?;
    Ok(())
}

fn read_trimmed_line<R: BufRead>(input: &mut R) -> io::Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "输入已结束"));
    }
    Ok(line.trim().to_string())
}

/// 交互式选择区域，空输入使用默认区域，无效输入重新询问
pub fn prompt_choice<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Choice> {
    write_region_table(output, false)?;
    loop {
        write!(output, "\n选择区域 [{}]: ", DEFAULT_REGION)?;
        output.flush()?;
        let line = read_trimmed_line(input)?;
        let code = if line.is_empty() { DEFAULT_REGION } else { line.as_str() };
        match parse_choice(code) {
            Some(Choice::Custom(_)) => return prompt_url(input, output).map(Choice::Custom),
            Some(choice) => return Ok(choice),
            None => writeln!(output, "未知的区域代码: {}，请重新输入", code)?,
        }
    }
}

/// 询问自定义下载地址，直到输入合法的 http/https 地址
pub fn prompt_url<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<String> {
    loop {
        write!(output, "输入下载地址: ")?;
        output.flush()?;
        let line = read_trimmed_line(input)?;
        if is_valid_url(&line) {
            return Ok(line);
        }
        writeln!(output, "无效的地址，需要 http:// 或 https:// 开头")?;
    }
}
