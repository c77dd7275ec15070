//! multispeed: 多线程网络下载测速
//!
//! 对选定的镜像并发发起 HTTP 下载，在固定时间窗口内统计字节数，
//! 计算瞬时和平均速率并在终端实时显示。

pub mod catalog;
pub mod cli;
pub mod config;
pub mod core;
pub mod ui;
pub mod utils;
