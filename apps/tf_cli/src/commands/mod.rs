// apps/tf_cli/src/commands/mod.rs

//! 子命令实现

pub mod config;
pub mod extent;
pub mod info;
pub mod merge;
pub mod seed;
pub mod versions;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;
use tf_config::EngineConfig;
use tf_geo::{Point2D, Polygon};

/// 加载配置，未指定时取默认值
pub(crate) fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::from_file(p)
            .with_context(|| format!("加载配置失败: {}", p.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// 解析日期参数，未指定时取本地当天
pub(crate) fn parse_date(text: Option<&str>) -> Result<NaiveDate> {
    match text {
        Some(t) => NaiveDate::parse_from_str(t, "%Y-%m-%d")
            .with_context(|| format!("日期格式应为 YYYY-MM-DD: {t}")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// 读取轮廓文件：JSON 数组 `[[x, y], ...]`
pub(crate) fn load_polygon(path: &Path) -> Result<Polygon> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("读取轮廓失败: {}", path.display()))?;
    let coords: Vec<[f64; 2]> = serde_json::from_str(&text)
        .with_context(|| format!("轮廓应为 [[x, y], ...]: {}", path.display()))?;
    let vertices = coords.into_iter().map(|[x, y]| Point2D::new(x, y)).collect();
    Polygon::new(vertices).context("轮廓无效")
}

/// 以 JSON 输出到标准输出
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
