use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use taskgate::app::{load_tasks, Application};
use taskgate::shutdown::ShutdownManager;
use taskgate_config::{AppConfig, PolicyKind};
use taskgate_worker::WorkerPool;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("taskgate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("任务分发与触发条件调度引擎")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，未指定时按默认路径查找"),
        )
        .arg(
            Arg::new("policy")
                .short('p')
                .long("policy")
                .value_name("POLICY")
                .help("调度策略，覆盖配置文件")
                .value_parser(["periodic", "immediate"]),
        )
        .arg(
            Arg::new("tasks")
                .short('t')
                .long("tasks")
                .value_name("FILE")
                .help("启动时提交的任务列表 (JSON)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");

    // 配置在任何工作线程启动之前加载一次
    let mut config = AppConfig::load(config_path.map(String::as_str))
        .with_context(|| format!("加载配置失败: {config_path:?}"))?;

    if let Some(policy) = matches.get_one::<String>("policy") {
        config.scheduler.policy = match policy.as_str() {
            "immediate" => PolicyKind::Immediate,
            _ => PolicyKind::Periodic,
        };
    }

    let log_level = matches
        .get_one::<String>("log-level")
        .unwrap_or(&config.observability.log_level)
        .clone();
    let log_format = matches
        .get_one::<String>("log-format")
        .unwrap_or(&config.observability.log_format)
        .clone();
    init_logging(&log_level, &log_format)?;

    info!("启动 taskgate {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    let pool = WorkerPool::acquire(&config.worker_pool).context("创建工作线程池失败")?;
    let shutdown_timeout = Duration::from_secs(config.worker_pool.shutdown_timeout_seconds);
    let app = Arc::new(Application::new(config, pool.handle())?);

    if let Some(path) = matches.get_one::<String>("tasks") {
        let tasks = load_tasks(Path::new(path))?;
        app.submit_all(tasks);
    }

    let shutdown_manager = ShutdownManager::new();
    pool.block_on(async {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app_clone = Arc::clone(&app);
        let app_handle = tokio::spawn(async move {
            if let Err(e) = app_clone.run(shutdown_rx).await {
                error!("应用运行失败: {e}");
            }
        });

        wait_for_shutdown_signal().await;
        info!("收到关闭信号，开始优雅关闭...");
        shutdown_manager.shutdown().await;

        match tokio::time::timeout(shutdown_timeout, app_handle).await {
            Ok(Ok(())) => info!("应用已优雅关闭"),
            Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
            Err(_) => warn!("应用关闭超时，强制退出"),
        }
    });

    // 等待进行中的回调投递完成
    pool.release();
    info!("taskgate 已退出");
    Ok(())
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        _ => return Err(anyhow::anyhow!("不支持的日志格式: {log_format}")),
    }

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("安装Ctrl+C信号处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("安装SIGTERM信号处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
