// apps/tf_cli/src/commands/merge.rs

//! 融合命令
//!
//! 读取补丁栅格，与墙体最新母面融合，发布新版本并输出体积结果（JSON）。

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tf_geo::BoundingBox;
use tf_io::{read_grid, MasterStore};
use tf_workflow::{MergeJob, MergeManager};
use tracing::info;

use super::{load_config, load_polygon, parse_date, print_json};

/// 融合参数
#[derive(Args)]
pub struct MergeArgs {
    /// 母面版本库根目录
    #[arg(short, long)]
    pub store: PathBuf,

    /// 墙体编号
    #[arg(short, long)]
    pub wall: String,

    /// 补丁栅格 (TFGR)
    #[arg(short, long)]
    pub patch: PathBuf,

    /// 发布日期 (YYYY-MM-DD)，默认今天
    #[arg(short, long)]
    pub date: Option<String>,

    /// 引擎配置文件 (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 测区轮廓文件 (JSON [[x, y], ...])
    #[arg(long)]
    pub footprint: Option<PathBuf>,

    /// 可写入范围 min_x,min_y,max_x,max_y
    #[arg(long, value_delimiter = ',', num_args = 4)]
    pub bounds: Option<Vec<f64>>,

    /// 分类栅格输出路径
    #[arg(long)]
    pub classified: Option<PathBuf>,

    /// 只计算不发布
    #[arg(long)]
    pub dry_run: bool,

    /// 输出完整报告（含差分、坡面、覆盖统计）
    #[arg(long)]
    pub full: bool,
}

/// 执行融合命令
pub fn execute(args: MergeArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let date = parse_date(args.date.as_deref())?;
    let patch = read_grid(&args.patch)
        .with_context(|| format!("读取补丁失败: {}", args.patch.display()))?;

    let mut job = MergeJob::new(args.wall.clone(), patch, date);
    if let Some(path) = &args.footprint {
        job = job.with_footprint(load_polygon(path)?);
    }
    if let Some(b) = &args.bounds {
        job = job.with_bounds(BoundingBox::new(b[0], b[1], b[2], b[3]));
    }
    if let Some(path) = &args.classified {
        job = job.with_classified_output(path);
    }

    let manager = MergeManager::new(MasterStore::new(&args.store), config)
        .context("创建融合管理器失败")?;

    if args.dry_run {
        let report = manager
            .preview(&job)
            .with_context(|| format!("墙体 {} 试算失败", args.wall))?;
        info!(wall = %args.wall, "试算完成，未发布");
        return if args.full {
            print_json(&report)
        } else {
            print_json(&report.volumetric)
        };
    }

    let outcome = manager
        .merge(&job)
        .with_context(|| format!("墙体 {} 融合失败", args.wall))?;
    info!(
        wall = %args.wall,
        previous = %outcome.previous.path.display(),
        version = %outcome.version.path.display(),
        "新版本已发布"
    );
    if let Some(path) = &outcome.classified {
        info!(path = %path.display(), "分类栅格已写出");
    }

    if args.full {
        print_json(&outcome.report)
    } else {
        print_json(&outcome.report.volumetric)
    }
}
