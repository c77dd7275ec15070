use anyhow::Context;
use multispeed::catalog::{self, Server};
use multispeed::cli::{self, Choice};
use multispeed::config::Config;
use multispeed::core::{
    BatchRunner, BatchTarget, EndpointProbe, HttpSettings, RunRequest, RunResult, RunSettings, ThroughputRun,
    BATCH_RUN_DURATION,
};
use multispeed::ui::{self, BatchFrame, BatchSummary, LiveView, RunSummary, RunView};
use multispeed::utils::logger::{self, LoggerSettings};
use reqwest::Client;
use std::io::{self, BufRead, IsTerminal, Write};

/// 测速完成后的输出方式
struct Output {
    json: bool,
    batch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 解析参数和配置
    let (args, config) = match cli::Args::parse_args() {
        Ok((args, config)) => (args, config),
        Err(e) => {
            ui::print_error(&format!("参数解析失败: {}", e));
            std::process::exit(1);
        }
    };

    if let Err(e) = logger::init(&LoggerSettings::from_config(&config)) {
        eprintln!("日志初始化失败: {}，继续运行", e);
    }
    log::info!("程序启动 v{}", env!("CARGO_PKG_VERSION"));
    log::info!("配置文件路径: {}", args.config);
    log::info!("配置摘要:\n{}", config.get_summary());

    if args.edit_config {
        cli::open_config_in_editor(&args.config);
        return Ok(());
    }
    if args.list {
        cli::write_region_table(&mut io::stdout().lock(), true)?;
        return Ok(());
    }

    let choice = match args.preset_choice()? {
        Some(choice) => choice,
        None => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();
            if args.wants_custom() {
                Choice::Custom(cli::prompt_url(&mut input, &mut output)?)
            } else {
                cli::prompt_choice(&mut input, &mut output)?
            }
        }
    };

    let http = HttpSettings::from(&config);
    let client = http.download_client().context("无法创建 HTTP 客户端")?;
    let settings = RunSettings::from(&config);
    // --json 时标准输出只留给结果
    let view = LiveView::new(!args.no_ui && !args.json);

    let (results, output) = match choice {
        Choice::Region(region) => {
            let request = RunRequest::new(region.title, region.servers(), config.duration_secs, config.thread_count)?;
            say(&args, &format!("正在探测 {} 的服务器...", region.title));
            let selection = EndpointProbe::http(&http)?.pick(&request.candidates).await?;
            if !selection.verified {
                ui::print_error(&format!("没有探测到可用的服务器，仍尝试 {}", selection.server.name));
            }
            let result = run_single(&request, selection.server, client, settings, &view).await?;
            (vec![result], Output { json: args.json, batch: false })
        }
        Choice::Custom(url) => {
            let server = Server::new("自定义", url);
            let request = RunRequest::new("自定义地址", vec![server.clone()], config.duration_secs, config.thread_count)?;
            let result = run_single(&request, server, client, settings, &view).await?;
            (vec![result], Output { json: args.json, batch: false })
        }
        Choice::All => {
            let results = run_batch(&config, &http, client, settings, &view).await?;
            (results, Output { json: args.json, batch: true })
        }
    };

    print_results(&results, &output)?;

    if !args.json && io::stdin().is_terminal() {
        print!("\n按回车键退出...");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
    }

    log::info!("程序退出");
    Ok(())
}

fn say(args: &cli::Args, message: &str) {
    if !args.json {
        println!("{}", message);
    }
}

/// 单个目标测速，Ctrl-C 提前结束
async fn run_single(
    request: &RunRequest,
    server: Server,
    client: Client,
    settings: RunSettings,
    view: &LiveView,
) -> anyhow::Result<RunResult> {
    let run = ThroughputRun::launch(request, server, client, settings)?;

    let stop = run.stop_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("收到 Ctrl-C，提前结束测速");
            stop.stop();
        }
    });

    let panel = RunView {
        title: request.label.clone(),
        server_name: run.server().name.clone(),
        url: run.server().url.clone(),
        threads: run.worker_count(),
        duration_secs: run.duration().as_secs_f64(),
    };
    let result = run.drive(|snapshot| view.update(ui::render_single(&panel, snapshot))).await;

    ctrl_c.abort();
    view.finish();
    Ok(result)
}

/// all 模式：按固定顺序依次测试每个区域
async fn run_batch(
    config: &Config,
    http: &HttpSettings,
    client: Client,
    settings: RunSettings,
    view: &LiveView,
) -> anyhow::Result<Vec<RunResult>> {
    // 校验交给 BatchRunner，单个目标出错只跳过该目标
    let targets: Vec<BatchTarget> = catalog::regions_in_order()
        .map(|region| BatchTarget {
            code: region.code.to_string(),
            request: RunRequest {
                label: region.title.to_string(),
                candidates: region.servers(),
                duration_secs: BATCH_RUN_DURATION.as_secs_f64(),
                worker_count: config.thread_count,
            },
        })
        .collect();

    let runner = BatchRunner::new(EndpointProbe::http(http)?, client, settings);
    log::info!("all 模式: {} 个区域，每个 {:?}", targets.len(), runner.duration());

    let report = runner
        .run_all(&targets, |progress| {
            view.update(ui::render_batch(&BatchFrame {
                current_code: progress.code,
                current_title: progress.label,
                snapshot: progress.snapshot,
                completed: progress.completed,
            }))
        })
        .await;
    view.finish();

    for (code, e) in &report.skipped {
        ui::print_error(&format!("{} 已跳过: {}", code, e));
    }
    Ok(report.results)
}

fn print_results(results: &[RunResult], output: &Output) -> anyhow::Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    if output.batch {
        print!("{}", BatchSummary(results));
    } else {
        print!("{}", RunSummary(results));
    }
    ui::print_success("测速完成");
    Ok(())
}
