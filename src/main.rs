use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod build;
mod config;
mod dispatch;
mod serve;
mod status;
mod watcher;

use build::pipeline::Pipelines;
use dispatch::Dispatcher;
use status::StatusReporter;
use watcher::{SourceWatcher, WatchMessage};

#[derive(Parser)]
#[command(name = "sitewatch", about = "单页站点开发监听器", version = long_version())]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// 构建并监听 index.html / src/main.scss / src/main.js，同时启动预览服务
    Dev {
        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// 监听地址
        #[arg(long)]
        host: Option<String>,

        /// 起始端口，被占用时依次向后尝试
        #[arg(long)]
        port: Option<u16>,
    },

    /// 构建一次后退出
    Build {
        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // None 等同于 Dev { root: ".", host: None, port: None }
    let command = cli.command.unwrap_or(Commands::Dev {
        root: PathBuf::from("."),
        host: None,
        port: None,
    });

    let root = match &command {
        Commands::Dev { root, .. } | Commands::Build { root } => root
            .canonicalize()
            .map_err(|e| anyhow::anyhow!("项目目录 {} 无效：{}", root.display(), e))?,
    };
    let config = config::DevConfig::load(&root)?;

    // 日志写 stderr，stdout 留给状态区
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    // 单线程调度：事件处理和构建结算都在同一个线程上交替进行
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match command {
        Commands::Dev { host, port, .. } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            runtime.block_on(run_dev(root, config))?;
        }
        Commands::Build { .. } => {
            let status = StatusReporter::stdout();
            let stats = runtime.block_on(build::run(&root, Arc::new(config), &status))?;
            status.finish();
            if stats.failed > 0 {
                anyhow::bail!("构建失败：{} 个文件出错", stats.failed);
            }
        }
    }

    Ok(())
}

async fn run_dev(root: PathBuf, config: config::DevConfig) -> anyhow::Result<()> {
    let output_dir = build::prepare_output_dir(&root)?;

    let listener = serve::bind_first_free(&config.server.host, config.server.port).await?;
    let port = listener.local_addr()?.port();
    println!("Server running at {}", serve::display_url(&config.server.host, port));
    tokio::spawn({
        let output_dir = output_dir.clone();
        async move {
            if let Err(e) = serve::serve(listener, output_dir).await {
                tracing::error!("预览服务异常退出：{e}");
            }
        }
    });

    let status = StatusReporter::stdout();
    let (mut source_watcher, mut changes) = SourceWatcher::start(&root)?;
    let pipelines = Pipelines::new(root.clone(), output_dir, Arc::new(config));
    let (mut dispatcher, mut fatal) = Dispatcher::new(pipelines, status.clone());
    dispatcher.startup();

    let result = loop {
        tokio::select! {
            Some(message) = changes.recv() => {
                handle_message(&root, &mut source_watcher, &mut dispatcher, message)?;
            }
            Some(err) = fatal.recv() => {
                break Err(anyhow::anyhow!(err));
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("收到 Ctrl+C，退出");
                break Ok(());
            }
        }
    };

    status.finish();
    result
}

fn handle_message(
    root: &Path,
    source_watcher: &mut SourceWatcher,
    dispatcher: &mut Dispatcher,
    message: WatchMessage,
) -> anyhow::Result<()> {
    match message {
        WatchMessage::Touched(file) => {
            dispatcher.touch(file);
        }
        WatchMessage::SourceDirCreated => {
            if source_watcher.watch_src_dir()? {
                tracing::debug!("开始监听 {}", root.join("src").display());
            }
            // 目录建好之前写入的文件不会有事件；目录被移走时文件也随之消失。补一次检查
            dispatcher.touch(build::events::WatchedFile::Sass);
            dispatcher.touch(build::events::WatchedFile::Js);
        }
    }
    Ok(())
}

const fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\ncommit:  ",
        env!("SITEWATCH_GIT_COMMIT"),
        "\nbuild:   ",
        env!("SITEWATCH_BUILD_TIME"),
        "\ntarget:  ",
        env!("SITEWATCH_BUILD_TARGET"),
        "\nprofile: ",
        env!("SITEWATCH_BUILD_PROFILE"),
    )
}
