// apps/tf_cli/src/commands/seed.rs

//! 初始母面命令

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tf_io::{read_grid, MasterStore};
use tf_workflow::MergeManager;
use tracing::info;

use super::{load_config, parse_date, print_json};

/// 初始母面参数
#[derive(Args)]
pub struct SeedArgs {
    /// 母面版本库根目录
    #[arg(short, long)]
    pub store: PathBuf,

    /// 墙体编号
    #[arg(short, long)]
    pub wall: String,

    /// 母面栅格 (TFGR)
    #[arg(short, long)]
    pub master: PathBuf,

    /// 发布日期 (YYYY-MM-DD)，默认今天
    #[arg(short, long)]
    pub date: Option<String>,

    /// 引擎配置文件 (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// 执行初始母面命令
pub fn execute(args: SeedArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let date = parse_date(args.date.as_deref())?;
    let master = read_grid(&args.master)
        .with_context(|| format!("读取母面失败: {}", args.master.display()))?;

    let manager = MergeManager::new(MasterStore::new(&args.store), config)?;
    let version = manager
        .seed(&args.wall, &master, date)
        .with_context(|| format!("墙体 {} 发布初始母面失败", args.wall))?;
    info!(wall = %args.wall, path = %version.path.display(), "初始母面已发布");
    print_json(&version)
}
