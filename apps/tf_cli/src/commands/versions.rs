// apps/tf_cli/src/commands/versions.rs

//! 版本列表命令

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tf_io::MasterStore;

use super::print_json;

/// 版本列表参数
#[derive(Args)]
pub struct VersionsArgs {
    /// 母面版本库根目录
    #[arg(short, long)]
    pub store: PathBuf,

    /// 墙体编号
    #[arg(short, long)]
    pub wall: String,

    /// 只显示最新版本
    #[arg(long)]
    pub latest: bool,
}

/// 执行版本列表命令
pub fn execute(args: VersionsArgs) -> Result<()> {
    let store = MasterStore::new(&args.store);
    let mut versions = store
        .versions(&args.wall)
        .with_context(|| format!("列出墙体 {} 的版本失败", args.wall))?;
    if args.latest {
        versions = versions.pop().into_iter().collect();
    }
    print_json(&versions)
}
