mod progress;

use crossterm::style::{Color, Stylize};
use std::fmt;
use crate::catalog;
use crate::core::{RunResult, RunSnapshot};
use crate::utils::validator::short_url;

pub use progress::LiveView;

pub fn print_success(message: &str) {
    println!("✓ {}", message);
}

pub fn print_error(message: &str) {
    eprintln!("✗ {}", message);
}

/// 按速度分档上色
pub fn speed_color(mbps: f64) -> Color {
    if mbps <= 10.0 {
        Color::Red
    } else if mbps <= 50.0 {
        Color::AnsiValue(214) // 橙色
    } else if mbps <= 100.0 {
        Color::Yellow
    } else if mbps <= 500.0 {
        Color::Green
    } else {
        Color::Blue
    }
}

/// 已经格式化好的数字按 mbps 上色
pub fn colored_number(text: &str, mbps: f64) -> String {
    text.with(speed_color(mbps)).to_string()
}

pub fn speed_text(mbps: f64, digits: usize) -> String {
    colored_number(&format!("{:.*}", digits, mbps), mbps)
}

/// "12.3 Mbps (1.5 MB/s)"
pub fn speed_pair_text(mbps: f64, digits: usize) -> String {
    format!(
        "{} Mbps ({} MB/s)",
        colored_number(&format!("{:.*}", digits, mbps), mbps),
        colored_number(&format!("{:.*}", digits, mbps / 8.0), mbps)
    )
}

/// 单区域实时面板的静态信息
#[derive(Debug, Clone)]
pub struct RunView {
    pub title: String,
    pub server_name: String,
    pub url: String,
    pub threads: usize,
    pub duration_secs: f64,
}

pub fn render_single(view: &RunView, snapshot: &RunSnapshot) -> String {
    let elapsed = snapshot.elapsed.as_secs_f64().min(view.duration_secs);
    let rows = [
        ("区域", view.title.clone()),
        ("服务器", view.server_name.clone()),
        ("地址", short_url(&view.url)),
        ("连接数", view.threads.to_string()),
        ("当前", speed_pair_text(snapshot.instantaneous_mbps, 1)),
        ("平均", speed_pair_text(snapshot.average_mbps, 1)),
        ("已下载", format!("{:.1} MiB", snapshot.downloaded_mib)),
        ("时间", format!("{:.1} / {:.1} 秒", elapsed, view.duration_secs)),
    ];

    let mut out = format!("{}\n", "── multispeed 测速 ──".bold().green());
    for (key, value) in rows {
        out.push_str(&format!("  {}{}\n", format!("{:<8}", key).cyan().bold(), value));
    }
    out
}

/// all 模式的列状态：当前显示剩余秒数，完成显示 OK
fn column_status(code: &str, current: &str, remaining_secs: f64, done: Option<&RunResult>) -> (String, String) {
    if code == current {
        let secs = (remaining_secs + 0.999).floor().max(0.0) as u64;
        return (format!("{}s", secs), format!("{:.0}", 0.0));
    }
    match done {
        Some(r) => ("OK".to_string(), format!("{:.0}", r.avg_mbps)),
        None => ("...".to_string(), "-".to_string()),
    }
}

pub struct BatchFrame<'a> {
    pub current_code: &'a str,
    pub current_title: &'a str,
    pub snapshot: &'a RunSnapshot,
    pub completed: &'a std::collections::HashMap<String, RunResult>,
}

pub fn render_batch(frame: &BatchFrame<'_>) -> String {
    let remaining = frame.snapshot.remaining.as_secs_f64();
    let mut header = format!("{:<8}", "");
    let mut status_row = format!("{:<8}", "时间");
    let mut speed_row = format!("{:<8}", "平均");

    for code in catalog::ORDER {
        header.push_str(&format!("{:^6}", code));
        let (status, speed) = column_status(code, frame.current_code, remaining, frame.completed.get(code));
        let status_cell = format!("{:^6}", status);
        status_row.push_str(&match status.as_str() {
            "OK" => status_cell.green().to_string(),
            "..." => status_cell,
            _ => status_cell.yellow().bold().to_string(),
        });
        if code == frame.current_code {
            let avg = frame.snapshot.average_mbps;
            speed_row.push_str(&colored_number(&format!("{:^6.0}", avg), avg));
        } else {
            match frame.completed.get(code) {
                Some(r) => speed_row.push_str(&colored_number(&format!("{:^6}", speed), r.avg_mbps)),
                None => speed_row.push_str(&format!("{:^6}", speed)),
            }
        }
    }

    let info = [
        ("模式", "all（依次测试）".to_string()),
        ("当前", format!("{} ({})", frame.current_code, frame.current_title)),
        ("已下载", format!("{:.0} MiB", frame.snapshot.downloaded_mib)),
        ("当前速度", speed_pair_text(frame.snapshot.instantaneous_mbps, 1)),
        ("平均速度", speed_pair_text(frame.snapshot.average_mbps, 1)),
    ];

    let mut out = format!("{}\n", "── multispeed 测速 ALL ──".bold().green());
    out.push_str(&format!("{}\n{}\n{}\n\n", header.bold(), status_row, speed_row));
    for (key, value) in info {
        out.push_str(&format!("  {}{}\n", format!("{:<10}", key).cyan().bold(), value));
    }
    out
}

/// 单区域 / 自定义地址的最终汇总
pub struct RunSummary<'a>(pub &'a [RunResult]);

impl fmt::Display for RunSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n最终汇总:")?;
        writeln!(
            f,
            "{:<16}{:<28}{:>10}{:>10}{:>12}{:>8}",
            "区域", "服务器", "平均Mbps", "≈ MB/s", "已下载", "时间"
        )?;
        for r in self.0 {
            writeln!(
                f,
                "{:<16}{:<28}{}{}{:>12}{:>8}",
                r.label,
                r.server_name,
                colored_number(&format!("{:>10.1}", r.avg_mbps), r.avg_mbps),
                colored_number(&format!("{:>10.1}", r.avg_mbytes_per_sec), r.avg_mbps),
                format!("{:.0} MiB", r.downloaded_mib),
                format!("{:.0}s", r.elapsed_seconds),
            )?;
        }
        Ok(())
    }
}

/// all 模式的最终汇总：平均 / 最大
pub struct BatchSummary<'a>(pub &'a [RunResult]);

impl fmt::Display for BatchSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n区域 平均 / 最大 (Mbps):")?;
        writeln!(f, "{:<16}{:>10}{:>10}", "区域", "平均", "最大")?;
        for r in self.0 {
            let max = r.max_mbps.unwrap_or(r.avg_mbps);
            writeln!(
                f,
                "{:<16}{}{}",
                r.label,
                colored_number(&format!("{:>10.0}", r.avg_mbps), r.avg_mbps),
                colored_number(&format!("{:>10.0}", max), max),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Server;
    use std::collections::HashMap;
    use std::time::Duration;
    use uuid::Uuid;

    fn snapshot(elapsed: f64, avg: f64) -> RunSnapshot {
        RunSnapshot {
            elapsed: Duration::from_secs_f64(elapsed),
            bytes_total: 10 * 1024 * 1024,
            instantaneous_mbps: 42.0,
            average_mbps: avg,
            downloaded_mib: 10.0,
            remaining: Duration::from_secs_f64((15.0 - elapsed).max(0.0)),
            sample_seq: 3,
        }
    }

    fn result(label: &str, bytes: u64) -> RunResult {
        RunResult::from_totals(
            Uuid::new_v4(),
            label,
            &Server::new("srv", "http://example.com/f"),
            bytes,
            Duration::from_secs(15),
        )
    }

    #[test]
    fn test_speed_color_thresholds() {
        assert_eq!(speed_color(10.0), Color::Red);
        assert_eq!(speed_color(10.1), Color::AnsiValue(214));
        assert_eq!(speed_color(100.0), Color::Yellow);
        assert_eq!(speed_color(500.0), Color::Green);
        assert_eq!(speed_color(500.1), Color::Blue);
    }

    #[test]
    fn test_speed_pair_text_contains_both_units() {
        let text = speed_pair_text(80.0, 1);
        assert!(text.contains("80.0"));
        assert!(text.contains("10.0"));
        assert!(text.contains("Mbps"));
        assert!(text.contains("MB/s"));
    }

    #[test]
    fn test_render_single_clamps_elapsed() {
        let view = RunView {
            title: "德国".to_string(),
            server_name: "Hetzner (DE)".to_string(),
            url: "https://speed.hetzner.de/10GB.bin".to_string(),
            threads: 8,
            duration_secs: 15.0,
        };
        let panel = render_single(&view, &snapshot(15.4, 12.0));
        assert!(panel.contains("speed.hetzner.de/10GB.bin"));
        assert!(panel.contains("15.0 / 15.0 秒"));
        assert!(panel.contains("10.0 MiB"));
    }

    #[test]
    fn test_column_status() {
        let done = result("俄罗斯", 15_000_000);
        assert_eq!(column_status("de", "de", 3.2, None).0, "4s");
        assert_eq!(column_status("de", "de", 0.0, None).0, "0s");
        assert_eq!(column_status("ru", "de", 3.2, Some(&done)), ("OK".to_string(), "8".to_string()));
        assert_eq!(column_status("za", "de", 3.2, None), ("...".to_string(), "-".to_string()));
    }

    #[test]
    fn test_render_batch_lists_every_region() {
        let mut completed = HashMap::new();
        completed.insert("ru".to_string(), result("俄罗斯", 15_000_000));
        let snap = snapshot(5.0, 30.0);
        let panel = render_batch(&BatchFrame {
            current_code: "us",
            current_title: "美国",
            snapshot: &snap,
            completed: &completed,
        });
        for code in catalog::ORDER {
            assert!(panel.contains(code));
        }
        assert!(panel.contains("OK"));
        assert!(panel.contains("us (美国)"));
    }

    #[test]
    fn test_summaries() {
        let results = vec![result("俄罗斯", 15_000_000).with_range(2.0, 12.7)];
        let single = RunSummary(&results).to_string();
        assert!(single.contains("俄罗斯"));
        assert!(single.contains("14 MiB"));
        assert!(single.contains("15s"));

        let batch = BatchSummary(&results).to_string();
        assert!(batch.contains("最大"));
        assert!(batch.contains("13"));
    }
}
