// apps/tf_cli/src/commands/extent.rs

//! 轮廓尺寸命令

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tf_io::read_grid;
use tf_workflow::valid_footprint;

use super::{load_polygon, print_json};

/// 轮廓尺寸参数
#[derive(Args)]
pub struct ExtentArgs {
    /// 轮廓文件 (JSON [[x, y], ...])
    #[arg(long, conflicts_with = "grid", required_unless_present = "grid")]
    pub polygon: Option<PathBuf>,

    /// 以栅格有效单元的外包矩形为轮廓 (TFGR)
    #[arg(long)]
    pub grid: Option<PathBuf>,
}

/// 执行轮廓尺寸命令
pub fn execute(args: ExtentArgs) -> Result<()> {
    let polygon = match (&args.polygon, &args.grid) {
        (Some(path), _) => Some(load_polygon(path)?),
        (None, Some(path)) => valid_footprint(&read_grid(path)?)?,
        (None, None) => None,
    };
    let extent = polygon.map(|p| p.extent()).unwrap_or_default();
    print_json(&extent)
}
