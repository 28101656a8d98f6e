// crates/tf_terrain/src/update.rs

//! 母面更新
//!
//! 把补齐坡面后的补丁覆盖到母面上，返回新版本母面；旧版本从不修改。
//! 补丁内（实测与合成）单元覆盖母面，其余单元保持原值；
//! 补丁超出母面范围时母面随之扩展。

use crate::harmonize::{harmonize, HarmonizeOptions};
use crate::raster::Grid;
use crate::warning::TerrainWarning;
use serde::{Deserialize, Serialize};
use tf_foundation::error::TfResult;
use tf_foundation::tolerance::ELEVATION_CHANGE;
use tf_foundation::KahanSum;
use tf_geo::BoundingBox;
use tracing::debug;

/// 更新选项
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// 格网统一选项
    pub harmonize: HarmonizeOptions,
    /// 可写入范围（单元中心须落在其中），`None` 表示不限制
    pub bounds: Option<BoundingBox>,
}

/// 覆盖前后对比报告
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateReport {
    /// 写入的补丁单元数
    pub cells_written: usize,
    /// 高程实际改变的单元数（|Δ| > 1e-6，原为无数据也算）
    pub cells_changed: usize,
    /// 改变单元占写入单元的百分比
    pub percent_changed: f64,
    /// 最大绝对变化（仅统计原值有效的单元）
    pub max_abs_change: f64,
    /// 平均绝对变化（仅统计原值有效的单元）
    pub mean_abs_change: f64,
    /// 母面范围是否扩展
    pub extent_grew: bool,
}

/// 更新结果
#[derive(Debug, Clone)]
pub struct MasterUpdate {
    /// 新版本母面
    pub master: Grid,
    /// 对比报告
    pub report: UpdateReport,
    /// 格网统一时产生的警告
    pub warnings: Vec<TerrainWarning>,
}

/// 把补丁覆盖到母面，返回新母面
///
/// # Errors
///
/// CRS 不兼容时返回 `IncompatibleReference`。
pub fn overlay_patch(master: &Grid, completed: &Grid, options: &UpdateOptions) -> TfResult<MasterUpdate> {
    let pair = harmonize(completed, master, &options.harmonize)?;
    let geometry = *pair.geometry();
    let prior = &pair.base;
    let patch = &pair.patch;

    let mut data = prior.data().to_vec();
    let mut report = UpdateReport::default();
    let mut abs_change = KahanSum::new();
    let mut compared = 0usize;

    for (idx, slot) in data.iter_mut().enumerate() {
        let Some(z) = patch.value(idx) else {
            continue;
        };
        if let Some(bounds) = &options.bounds {
            let (col, row) = geometry.col_row(idx);
            if !bounds.contains_point(&geometry.cell_center(col, row)) {
                continue;
            }
        }

        report.cells_written += 1;
        match prior.value(idx) {
            Some(old) => {
                let change = (f64::from(z) - f64::from(old)).abs();
                compared += 1;
                abs_change.add(change);
                report.max_abs_change = report.max_abs_change.max(change);
                if change > ELEVATION_CHANGE {
                    report.cells_changed += 1;
                }
            }
            None => report.cells_changed += 1,
        }
        *slot = z;
    }

    if report.cells_written > 0 {
        report.percent_changed = 100.0 * report.cells_changed as f64 / report.cells_written as f64;
    }
    if compared > 0 {
        report.mean_abs_change = abs_change.value() / compared as f64;
    }
    report.extent_grew = geometry != *master.geometry();

    debug!(
        written = report.cells_written,
        changed = report.cells_changed,
        max_change = report.max_abs_change,
        grew = report.extent_grew,
        "母面覆盖完成"
    );

    Ok(MasterUpdate {
        master: prior.with_data(data)?,
        report,
        warnings: pair.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GridGeometry;
    use tf_geo::CrsDefinition;

    const ND: f32 = -9999.0;

    fn crs() -> CrsDefinition {
        CrsDefinition::Epsg(32719)
    }

    #[test]
    fn test_overlay_inside_footprint_only() {
        let mg = GridGeometry::new(0.0, 10.0, 1.0, 10, 10).unwrap();
        let master = Grid::filled(mg, ND, crs(), 100.0).unwrap();
        let pg = GridGeometry::new(2.0, 8.0, 1.0, 3, 3).unwrap();
        let patch = Grid::from_fn(pg, ND, crs(), |c, _| (c != 1).then_some(104.0)).unwrap();

        let up = overlay_patch(&master, &patch, &UpdateOptions::default()).unwrap();
        assert_eq!(up.master.geometry(), master.geometry());
        assert_eq!(up.master.get(2, 2), Some(104.0));
        assert_eq!(up.master.get(3, 2), Some(100.0));
        assert_eq!(up.master.get(0, 0), Some(100.0));
        assert_eq!(up.report.cells_written, 6);
        assert_eq!(up.report.cells_changed, 6);
        assert!((up.report.max_abs_change - 4.0).abs() < 1e-9);
        assert!((up.report.percent_changed - 100.0).abs() < 1e-9);
        assert!(!up.report.extent_grew);
        // 旧母面未被修改
        assert!(master.data().iter().all(|&v| v == 100.0));
    }

    #[test]
    fn test_patch_outside_extends_master() {
        let mg = GridGeometry::new(0.0, 4.0, 1.0, 4, 4).unwrap();
        let master = Grid::filled(mg, ND, crs(), 1.0).unwrap();
        let pg = GridGeometry::new(3.0, 6.0, 1.0, 3, 3).unwrap();
        let patch = Grid::filled(pg, ND, crs(), 7.0).unwrap();

        let up = overlay_patch(&master, &patch, &UpdateOptions::default()).unwrap();
        let g = up.master.geometry();
        assert!(up.report.extent_grew);
        assert_eq!((g.cols, g.rows), (6, 6));
        assert!((g.origin_y - 6.0).abs() < 1e-12);
        assert_eq!(up.master.valid_count(), 16 + 9 - 1);
        assert_eq!(up.report.cells_written, 9);
    }

    #[test]
    fn test_bounds_limit_written_cells() {
        let mg = GridGeometry::new(0.0, 4.0, 1.0, 4, 4).unwrap();
        let master = Grid::filled(mg, ND, crs(), 0.0).unwrap();
        let patch = Grid::filled(mg, ND, crs(), 2.0).unwrap();
        let opts = UpdateOptions {
            bounds: Some(BoundingBox::new(0.0, 2.0, 2.0, 4.0)),
            ..UpdateOptions::default()
        };
        let up = overlay_patch(&master, &patch, &opts).unwrap();
        assert_eq!(up.report.cells_written, 4);
        assert_eq!(up.master.get(0, 0), Some(2.0));
        assert_eq!(up.master.get(3, 3), Some(0.0));
    }

    #[test]
    fn test_unchanged_values_not_counted() {
        let mg = GridGeometry::new(0.0, 2.0, 1.0, 2, 2).unwrap();
        let master = Grid::filled(mg, ND, crs(), 5.0).unwrap();
        let patch = Grid::filled(mg, ND, crs(), 5.0).unwrap();
        let up = overlay_patch(&master, &patch, &UpdateOptions::default()).unwrap();
        assert_eq!(up.report.cells_written, 4);
        assert_eq!(up.report.cells_changed, 0);
        assert_eq!(up.report.mean_abs_change, 0.0);
    }
}
