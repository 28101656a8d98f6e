// crates/tf_workflow/src/pipeline.rs

//! 补丁融合计算
//!
//! 纯计算部分，不涉及文件与锁：
//!
//! ```text
//! harmonize → difference → project_skirt → with_skirt → aggregate
//!                                        └→ overlay_patch → 新母面
//! ```

use crate::result::{MergeReport, VolumetricResult};
use tf_config::EngineConfig;
use tf_foundation::error::TfResult;
use tf_geo::{BoundingBox, Point2D, Polygon};
use tf_terrain::{
    aggregate, classify, difference, harmonize, overlay_patch, project_skirt, ClassifiedGrid,
    DifferenceGrid, Grid, TerrainWarning, UpdateOptions,
};
use tracing::debug;

/// 融合计算结果
#[derive(Debug, Clone)]
pub struct MergeComputation {
    /// 新母面
    pub master: Grid,
    /// 含过渡坡面的差值栅格
    pub difference: DifferenceGrid,
    /// 差值分类
    pub classified: ClassifiedGrid,
    /// 统计报告
    pub report: MergeReport,
}

/// 执行一次融合计算
///
/// `footprint` 为测区轮廓；缺省时用补丁有效单元的外包矩形。
/// `bounds` 限制母面可写入的范围。输入栅格均不会被修改。
///
/// # Errors
///
/// CRS 不兼容、格网错位等致命错误。
pub fn compute_merge(
    patch: &Grid,
    master: &Grid,
    config: &EngineConfig,
    footprint: Option<&Polygon>,
    bounds: Option<BoundingBox>,
) -> TfResult<MergeComputation> {
    let mut warnings = Vec::new();

    let pair = harmonize(patch, master, &config.harmonize_options())?;
    debug!(
        cols = pair.geometry().cols,
        rows = pair.geometry().rows,
        cell_size = pair.geometry().cell_size,
        resampled = ?pair.resampled,
        "格网统一完成"
    );
    extend_unique(&mut warnings, &pair.warnings);

    let outcome = difference(&pair.patch, &pair.base, &config.diff_options())?;
    debug!(
        cells = outcome.stats.valid_cells,
        suppressed = outcome.stats.suppressed_cells,
        mean = outcome.stats.mean,
        std_dev = outcome.stats.std_dev,
        "差分完成"
    );

    let skirt = project_skirt(
        &pair.patch,
        &pair.base,
        &outcome.difference,
        &config.skirt_options(),
    )?;
    debug!(
        synthetic = skirt.stats.synthetic_cells,
        void_filled = skirt.stats.void_filled_cells,
        boundary = skirt.stats.boundary_cells,
        "过渡坡面完成"
    );
    extend_unique(&mut warnings, &skirt.warnings);

    let completed = outcome.difference.with_skirt(&skirt, &pair.base)?;
    let volume = aggregate(&completed, &config.volume_options());
    let classified = classify(&completed, config.volume.unchanged_tolerance);

    let update = overlay_patch(
        master,
        skirt.completed(),
        &UpdateOptions {
            harmonize: config.harmonize_options(),
            bounds,
        },
    )?;
    debug!(
        written = update.report.cells_written,
        changed = update.report.cells_changed,
        "母面覆盖完成"
    );
    extend_unique(&mut warnings, &update.warnings);

    let extent = match footprint {
        Some(polygon) => polygon.extent(),
        None => valid_footprint(patch)?
            .map(|p| p.extent())
            .unwrap_or_default(),
    };

    let volumetric =
        VolumetricResult::from_stages(&volume, &outcome.stats, &skirt.stats, &extent, warnings);

    Ok(MergeComputation {
        master: update.master,
        difference: completed,
        classified,
        report: MergeReport {
            volumetric,
            diff: outcome.stats,
            skirt: skirt.stats,
            update: update.report,
            extent,
        },
    })
}

/// 补丁有效单元的外包矩形（按单元边界），没有有效单元时返回 `None`
pub fn valid_footprint(grid: &Grid) -> TfResult<Option<Polygon>> {
    let cols = grid.cols();
    let mut span: Option<(usize, usize, usize, usize)> = None;
    for idx in (0..grid.len()).filter(|&i| grid.is_valid(i)) {
        let (c, r) = (idx % cols, idx / cols);
        span = Some(match span {
            None => (c, c, r, r),
            Some((c0, c1, r0, r1)) => (c0.min(c), c1.max(c), r0.min(r), r1.max(r)),
        });
    }
    let Some((c0, c1, r0, r1)) = span else {
        return Ok(None);
    };

    let g = grid.geometry();
    let left = g.origin_x + c0 as f64 * g.cell_size;
    let right = g.origin_x + (c1 + 1) as f64 * g.cell_size;
    let top = g.origin_y - r0 as f64 * g.cell_size;
    let bottom = g.origin_y - (r1 + 1) as f64 * g.cell_size;
    Polygon::new(vec![
        Point2D::new(left, bottom),
        Point2D::new(right, bottom),
        Point2D::new(right, top),
        Point2D::new(left, top),
    ])
    .map(Some)
}

fn extend_unique(into: &mut Vec<TerrainWarning>, from: &[TerrainWarning]) {
    for w in from {
        if !into.contains(w) {
            into.push(w.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_geo::CrsDefinition;
    use tf_terrain::{CellClass, GridGeometry};

    const ND: f32 = -9999.0;

    fn crs() -> CrsDefinition {
        CrsDefinition::utm_zone(19, false)
    }

    #[test]
    fn test_valid_footprint_bounds_data() {
        let g = GridGeometry::new(100.0, 50.0, 2.0, 10, 10).unwrap();
        let grid = Grid::from_fn(g, ND, crs(), |c, r| {
            ((2..6).contains(&c) && (3..5).contains(&r)).then_some(1.0)
        })
        .unwrap();
        let poly = valid_footprint(&grid).unwrap().unwrap();
        let ext = poly.extent();
        assert!((ext.area - 8.0 * 4.0).abs() < 1e-9);
        assert!((ext.length - (64.0f64 + 16.0).sqrt()).abs() < 1e-9);

        let empty = Grid::empty(g, ND, crs()).unwrap();
        assert!(valid_footprint(&empty).unwrap().is_none());
    }

    #[test]
    fn test_raised_block_merge() {
        let mg = GridGeometry::new(0.0, 20.0, 1.0, 20, 20).unwrap();
        let master = Grid::filled(mg, ND, crs(), 10.0).unwrap();
        let patch = Grid::from_fn(mg, ND, crs(), |c, r| {
            ((8..12).contains(&c) && (8..12).contains(&r)).then_some(12.0)
        })
        .unwrap();

        let out = compute_merge(&patch, &master, &EngineConfig::default(), None, None).unwrap();
        let v = &out.report.volumetric;

        assert!(v.fill_volume > 32.0);
        assert_eq!(v.cut_volume, 0.0);
        assert!(v.synthetic_cells > 0);
        assert_eq!(v.synthetic_cells, out.report.skirt.synthetic_cells);
        assert!((v.length - 32.0f64.sqrt()).abs() < 1e-9);
        assert!((v.width - 16.0 / 32.0f64.sqrt()).abs() < 1e-9);
        assert!(v.warnings.is_empty());

        assert_eq!(out.master.get(9, 9), Some(12.0));
        assert_eq!(out.master.get(0, 0), Some(10.0));
        assert_eq!(out.master.get(12, 9), Some(11.0));
        assert_eq!(
            out.classified.counts().synthetic,
            out.report.skirt.synthetic_cells
        );
        assert_eq!(out.classified.classes()[9 * 20 + 9], CellClass::Fill);
        assert_eq!(out.report.update.cells_written, 16 + v.synthetic_cells);
    }

    #[test]
    fn test_explicit_footprint_wins() {
        let mg = GridGeometry::new(0.0, 10.0, 1.0, 10, 10).unwrap();
        let master = Grid::filled(mg, ND, crs(), 0.0).unwrap();
        let patch = Grid::filled(mg, ND, crs(), 0.0).unwrap();
        let poly = Polygon::new(vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(40.0, 0.0),
            Point2D::new(40.0, 10.0),
            Point2D::new(0.0, 10.0),
        ])
        .unwrap();

        let out = compute_merge(&patch, &master, &EngineConfig::default(), Some(&poly), None)
            .unwrap();
        assert!((out.report.extent.length - 1700.0f64.sqrt()).abs() < 1e-9);
        assert_eq!(out.report.volumetric.net_volume, 0.0);
        assert_eq!(out.report.update.cells_changed, 0);
    }
}
