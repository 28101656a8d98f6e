// apps/tf_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示 TFGR 文件头；加 `--stats` 时解码全部分块并统计有效单元。

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use tf_io::{read_grid, read_header};

use super::print_json;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// TFGR 文件路径
    pub file: PathBuf,

    /// 解码并统计有效单元（同时校验全部分块）
    #[arg(long)]
    pub stats: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    let header = read_header(&args.file)
        .with_context(|| format!("读取文件头失败: {}", args.file.display()))?;
    let (tile_cols, tile_rows) = header.tile_grid();
    let extent = header.geometry.extent();

    let mut out = json!({
        "file": args.file.display().to_string(),
        "header": header,
        "crs": header.crs.to_text(),
        "tiles": { "cols": tile_cols, "rows": tile_rows, "count": header.tile_count() },
        "extent": extent,
    });

    if args.stats {
        let grid = read_grid(&args.file)
            .with_context(|| format!("解码失败: {}", args.file.display()))?;
        out["stats"] = serde_json::to_value(grid.stats())?;
    }

    print_json(&out)
}
