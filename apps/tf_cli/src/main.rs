// apps/tf_cli/src/main.rs

//! TerraFuse 命令行界面
//!
//! 提供补丁融合、母面版本管理和栅格检查的命令行工具。
//!
//! # 架构层级
//!
//! 本模块属于 **Layer 5: Application**，只负责参数解析、日志初始化和结果输出，
//! 融合事务全部委托给 `tf_workflow`。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// TerraFuse 地形差分与母面融合命令行工具
#[derive(Parser)]
#[command(name = "tf_cli")]
#[command(author = "TerraFuse Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Volumetric terrain differencing and master surface fusion", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 把补丁融合进墙体母面
    Merge(commands::merge::MergeArgs),
    /// 发布墙体的初始母面
    Seed(commands::seed::SeedArgs),
    /// 列出墙体的母面版本
    Versions(commands::versions::VersionsArgs),
    /// 显示 TFGR 文件信息
    Info(commands::info::InfoArgs),
    /// 计算测区轮廓长度/宽度
    Extent(commands::extent::ExtentArgs),
    /// 显示或验证引擎配置
    Config(commands::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 执行命令
    match cli.command {
        Commands::Merge(args) => commands::merge::execute(args),
        Commands::Seed(args) => commands::seed::execute(args),
        Commands::Versions(args) => commands::versions::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Extent(args) => commands::extent::execute(args),
        Commands::Config(args) => commands::config::execute(args),
    }
}
