use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// 实时测速面板
///
/// 借用 indicatif 的重绘能力：面板整体作为进度条的 message，
/// 每次轮询替换内容，终端上原地刷新。
pub struct LiveView {
    bar: ProgressBar,
}

impl LiveView {
    /// `enabled == false` 时不绘制任何内容（--no-ui）
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout())
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        Self { bar }
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }

    pub fn update(&self, panel: String) {
        self.bar.set_message(panel);
    }

    /// 保留最后一帧
    pub fn finish(&self) {
        self.bar.finish();
    }
}
