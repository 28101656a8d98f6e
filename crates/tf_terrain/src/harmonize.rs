// crates/tf_terrain/src/harmonize.rs

//! 分辨率统一
//!
//! 把补丁与基准放到同一工作格网上：
//!
//! 1. CRS 不一致直接报错（不做隐式重投影）
//! 2. 工作单元尺寸取两者中较细者，较粗者双线性上采样，较细者从不下采样
//! 3. 工作格网以较细栅格的原点为锚（尺寸相同时以基准为锚），
//!    向外扩展整单元直至覆盖两者范围的并集，空白处填无数据值
//! 4. 已在工作格网上的栅格按偏移逐单元复制，结果逐位一致
//!
//! 双线性权重与无数据处理沿用空间插值器的规则：
//! 四个邻近中心中无数据者丢弃，剩余权重和 ≥ 0.5 时重新归一化，否则输出无数据；
//! 最外层中心与栅格边界之间回退到最近邻；源范围以外为无数据。

use crate::parallel::{for_each_row, DEFAULT_PARALLEL_THRESHOLD};
use crate::raster::{Grid, GridGeometry};
use crate::warning::TerrainWarning;
use serde::{Deserialize, Serialize};
use tf_foundation::error::TfResult;
use tf_foundation::tolerance::same_cell_size;
use tf_geo::BoundingBox;
use tracing::{debug, warn};

/// 格网扩展时的吸附容差（单元）
const SNAP_EPS: f64 = 1e-6;

/// 上采样方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleMethod {
    /// 双线性（四个最近单元中心）
    #[default]
    Bilinear,
}

impl ResampleMethod {
    /// 方法名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bilinear => "bilinear",
        }
    }
}

/// 分辨率统一选项
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonizeOptions {
    /// 上采样方法
    pub method: ResampleMethod,
    /// 分辨率比警告阈值
    pub resolution_ratio_warning: f64,
    /// 并行阈值（单元数）
    pub parallel_threshold: usize,
}

impl Default for HarmonizeOptions {
    fn default() -> Self {
        Self {
            method: ResampleMethod::Bilinear,
            resolution_ratio_warning: 4.0,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

/// 哪一侧经过了插值重采样
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampledSide {
    /// 两者都只是偏移复制
    Neither,
    /// 补丁被重采样
    Patch,
    /// 基准被重采样
    Base,
}

/// 统一后的栅格对
#[derive(Debug, Clone)]
pub struct HarmonizedPair {
    /// 工作格网上的补丁
    pub patch: Grid,
    /// 工作格网上的基准
    pub base: Grid,
    /// 经过插值的一侧
    pub resampled: ResampledSide,
    /// 粗/细单元尺寸比（≥ 1）
    pub resolution_ratio: f64,
    /// 降级警告
    pub warnings: Vec<TerrainWarning>,
}

impl HarmonizedPair {
    /// 工作格网
    pub fn geometry(&self) -> &GridGeometry {
        self.patch.geometry()
    }
}

/// 把补丁和基准统一到同一格网
///
/// # Errors
///
/// CRS 不兼容时返回 `IncompatibleReference`。
pub fn harmonize(patch: &Grid, base: &Grid, options: &HarmonizeOptions) -> TfResult<HarmonizedPair> {
    patch.check_reference(base)?;

    let patch_finer = patch.cell_size() < base.cell_size()
        && !same_cell_size(patch.cell_size(), base.cell_size());
    let anchor = if patch_finer { patch } else { base };
    let fine = anchor.cell_size();
    let coarse = patch.cell_size().max(base.cell_size());
    let resolution_ratio = coarse / fine;

    let mut warnings = Vec::new();
    if resolution_ratio > options.resolution_ratio_warning {
        warn!(
            ratio = resolution_ratio,
            bound = options.resolution_ratio_warning,
            "分辨率比超过阈值，仍继续上采样"
        );
        warnings.push(TerrainWarning::ResolutionRatioExceeded {
            ratio: resolution_ratio,
            bound: options.resolution_ratio_warning,
        });
    }
    if !patch.extent().intersects(&base.extent()) {
        warn!("补丁与基准范围不相交");
        warnings.push(TerrainWarning::NoOverlap);
    }

    let union = patch.extent().merge(&base.extent());
    let target = working_geometry(anchor.geometry(), &union)?;

    let patch_aligned = patch.geometry().is_aligned_with(&target);
    let base_aligned = base.geometry().is_aligned_with(&target);
    let resampled = match (patch_aligned, base_aligned) {
        (true, true) => ResampledSide::Neither,
        (false, _) => ResampledSide::Patch,
        (true, false) => ResampledSide::Base,
    };

    let patch_out = resample_onto(patch, &target, options)?;
    let base_out = resample_onto(base, &target, options)?;

    debug!(
        cols = target.cols,
        rows = target.rows,
        cell_size = target.cell_size,
        ratio = resolution_ratio,
        resampled = ?resampled,
        method = options.method.name(),
        "分辨率统一完成"
    );

    Ok(HarmonizedPair {
        patch: patch_out,
        base: base_out,
        resampled,
        resolution_ratio,
        warnings,
    })
}

/// 以 `anchor` 的格网为基准，构建覆盖 `cover` 的最小工作几何
///
/// # Errors
///
/// 结果几何无效时返回 `MalformedGrid`（锚几何合法时不会发生）。
pub fn working_geometry(anchor: &GridGeometry, cover: &BoundingBox) -> TfResult<GridGeometry> {
    let cs = anchor.cell_size;
    let steps = |span: f64| ((span / cs) - SNAP_EPS).ceil().max(0.0);

    let origin_x = anchor.origin_x - steps(anchor.origin_x - cover.min_x) * cs;
    let origin_y = anchor.origin_y + steps(cover.max_y - anchor.origin_y) * cs;
    let cols = steps(cover.max_x - origin_x).max(1.0) as usize;
    let rows = steps(origin_y - cover.min_y).max(1.0) as usize;

    GridGeometry::new(origin_x, origin_y, cs, cols, rows)
}

/// 把 `src` 放到 `target` 几何上
///
/// 对齐时按偏移复制，否则按 `options.method` 插值。
pub fn resample_onto(src: &Grid, target: &GridGeometry, options: &HarmonizeOptions) -> TfResult<Grid> {
    let mut out = vec![src.nodata(); target.len()];

    if src.geometry().is_aligned_with(target) {
        let (dc, dr) = target.offset_in(src.geometry());
        let (src_cols, src_rows) = (src.cols() as isize, src.rows() as isize);
        for_each_row(&mut out, target.cols, options.parallel_threshold, |row, line| {
            let sr = row as isize + dr;
            if sr < 0 || sr >= src_rows {
                return;
            }
            for (col, v) in line.iter_mut().enumerate() {
                let sc = col as isize + dc;
                if sc >= 0 && sc < src_cols {
                    *v = src.data()[sr as usize * src.cols() + sc as usize];
                }
            }
        });
    } else {
        match options.method {
            ResampleMethod::Bilinear => {
                for_each_row(&mut out, target.cols, options.parallel_threshold, |row, line| {
                    for (col, v) in line.iter_mut().enumerate() {
                        let c = target.cell_center(col, row);
                        *v = sample_bilinear(src, c.x, c.y);
                    }
                });
            }
        }
    }

    Grid::from_data(*target, src.nodata(), src.crs().clone(), out)
}

/// 插值权重
#[derive(Debug, Clone, Copy)]
struct Weight {
    /// 源单元索引
    src_idx: usize,
    /// 权重值
    val: f64,
}

/// 在地理坐标 (x, y) 处双线性采样，返回值或源栅格的无数据值
fn sample_bilinear(src: &Grid, x: f64, y: f64) -> f32 {
    let g = src.geometry();
    let (px, py) = g.geo_to_pixel(x, y);
    if px < 0.0 || py < 0.0 || px > g.cols as f64 || py > g.rows as f64 {
        return src.nodata();
    }

    // 单元中心位于整数坐标的空间
    let (cx, cy) = (px - 0.5, py - 0.5);
    let mut acc = 0.0;
    let mut weight_sum = 0.0;
    for w in bilinear_weights(cx, cy, g.cols, g.rows).iter().flatten() {
        if let Some(v) = src.value(w.src_idx) {
            acc += w.val * f64::from(v);
            weight_sum += w.val;
        }
    }

    if weight_sum < 0.5 {
        src.nodata()
    } else {
        (acc / weight_sum) as f32
    }
}

/// 最近邻权重（坐标已夹到栅格内）
fn nearest_weights(cx: f64, cy: f64, cols: usize, rows: usize) -> [Option<Weight>; 4] {
    let ix = (cx.round().max(0.0) as usize).min(cols - 1);
    let iy = (cy.round().max(0.0) as usize).min(rows - 1);
    [
        Some(Weight {
            src_idx: iy * cols + ix,
            val: 1.0,
        }),
        None,
        None,
        None,
    ]
}

/// 双线性权重，四邻不全时回退到最近邻
fn bilinear_weights(cx: f64, cy: f64, cols: usize, rows: usize) -> [Option<Weight>; 4] {
    let x0 = cx.floor() as isize;
    let y0 = cy.floor() as isize;
    let x1 = x0 + 1;
    let y1 = y0 + 1;

    if x0 < 0 || y0 < 0 || x1 >= cols as isize || y1 >= rows as isize {
        return nearest_weights(cx, cy, cols, rows);
    }

    let dx = cx - x0 as f64;
    let dy = cy - y0 as f64;
    let (x0, y0, x1, y1) = (x0 as usize, y0 as usize, x1 as usize, y1 as usize);

    [
        Some(Weight { src_idx: y0 * cols + x0, val: (1.0 - dx) * (1.0 - dy) }),
        Some(Weight { src_idx: y0 * cols + x1, val: dx * (1.0 - dy) }),
        Some(Weight { src_idx: y1 * cols + x0, val: (1.0 - dx) * dy }),
        Some(Weight { src_idx: y1 * cols + x1, val: dx * dy }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_geo::CrsDefinition;

    const ND: f32 = -9999.0;

    fn crs() -> CrsDefinition {
        CrsDefinition::Epsg(32719)
    }

    fn ramp(origin_x: f64, origin_y: f64, cs: f64, cols: usize, rows: usize) -> Grid {
        let g = GridGeometry::new(origin_x, origin_y, cs, cols, rows).unwrap();
        Grid::from_fn(g, ND, crs(), |c, r| {
            let p = g.cell_center(c, r);
            Some((p.x + 2.0 * p.y) as f32)
        })
        .unwrap()
    }

    #[test]
    fn test_bilinear_weights_sum_to_one() {
        let w = bilinear_weights(1.3, 2.7, 5, 5);
        let sum: f64 = w.iter().flatten().map(|w| w.val).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_edge_falls_back_to_nearest() {
        let w = bilinear_weights(-0.3, 0.2, 4, 4);
        assert_eq!(w.iter().flatten().count(), 1);
        assert_eq!(w[0].unwrap().src_idx, 0);
    }

    #[test]
    fn test_upsampling_reproduces_linear_surface() {
        // 线性面在内部点上双线性插值应精确重现
        let patch = ramp(10.0, 20.0, 0.5, 8, 8);
        let base = ramp(8.0, 22.0, 2.0, 4, 4);
        let pair = harmonize(&patch, &base, &HarmonizeOptions::default()).unwrap();

        assert_eq!(pair.resampled, ResampledSide::Base);
        assert!((pair.resolution_ratio - 4.0).abs() < 1e-12);
        assert!(pair.warnings.is_empty());
        assert!((pair.geometry().cell_size - 0.5).abs() < 1e-12);

        let g = *pair.geometry();
        // 取远离基准边界的内部单元
        let col = 6;
        let row = 6;
        let p = g.cell_center(col, row);
        let v = pair.base.get(col, row).unwrap();
        assert!((f64::from(v) - (p.x + 2.0 * p.y)).abs() < 1e-2);
    }

    #[test]
    fn test_finer_grid_is_copied_bit_exact() {
        let patch = ramp(10.0, 20.0, 0.5, 8, 8);
        let base = ramp(8.0, 22.0, 2.0, 4, 4);
        let pair = harmonize(&patch, &base, &HarmonizeOptions::default()).unwrap();
        let g = pair.geometry();
        let (dc, dr) = patch.geometry().offset_in(g);
        for r in 0..patch.rows() {
            for c in 0..patch.cols() {
                let orig = patch.get(c, r).unwrap();
                let moved = pair
                    .patch
                    .get((c as isize + dc) as usize, (r as isize + dr) as usize)
                    .unwrap();
                assert_eq!(orig.to_bits(), moved.to_bits());
            }
        }
    }

    #[test]
    fn test_union_extent_padded_with_nodata() {
        let patch = ramp(0.0, 10.0, 1.0, 4, 4);
        let base = ramp(6.0, 4.0, 1.0, 4, 4);
        let pair = harmonize(&patch, &base, &HarmonizeOptions::default()).unwrap();
        let g = pair.geometry();
        assert_eq!((g.cols, g.rows), (10, 10));
        assert_eq!(pair.resampled, ResampledSide::Neither);
        assert!(pair.warnings.contains(&TerrainWarning::NoOverlap));
        assert_eq!(pair.patch.valid_count(), 16);
        assert_eq!(pair.base.valid_count(), 16);
        assert_eq!(pair.patch.get(9, 9), None);
        assert!(pair.base.get(9, 9).is_some());
    }

    #[test]
    fn test_same_size_tie_anchors_on_base() {
        let patch = ramp(0.25, 10.0, 1.0, 4, 4);
        let base = ramp(0.0, 10.0, 1.0, 6, 6);
        let pair = harmonize(&patch, &base, &HarmonizeOptions::default()).unwrap();
        assert_eq!(pair.resampled, ResampledSide::Patch);
        assert!(pair.geometry().is_aligned_with(base.geometry()));
        assert_eq!(pair.base.data(), base.data());
    }

    #[test]
    fn test_ratio_warning() {
        let patch = ramp(0.0, 10.0, 0.25, 8, 8);
        let base = ramp(0.0, 10.0, 2.0, 2, 2);
        let pair = harmonize(&patch, &base, &HarmonizeOptions::default()).unwrap();
        assert!(matches!(
            pair.warnings[0],
            TerrainWarning::ResolutionRatioExceeded { ratio, .. } if (ratio - 8.0).abs() < 1e-12
        ));
    }

    #[test]
    fn test_nodata_neighbours_renormalised() {
        let g = GridGeometry::new(0.0, 2.0, 1.0, 2, 2).unwrap();
        let src = Grid::from_data(g, ND, crs(), vec![1.0, ND, 3.0, 3.0]).unwrap();
        // 中心处四个权重各 0.25，去掉一个后剩 0.75 ≥ 0.5
        let v = sample_bilinear(&src, 1.0, 1.0);
        assert!((v - 7.0 / 3.0).abs() < 1e-6);

        let sparse = Grid::from_data(g, ND, crs(), vec![1.0, ND, ND, ND]).unwrap();
        assert_eq!(sample_bilinear(&sparse, 1.0, 1.0), ND);
        assert_eq!(sample_bilinear(&src, 5.0, 1.0), ND);
    }

    #[test]
    fn test_working_geometry_extends_whole_cells() {
        let anchor = GridGeometry::new(10.0, 20.0, 0.5, 4, 4).unwrap();
        let cover = BoundingBox::new(9.2, 17.1, 12.3, 20.6);
        let g = working_geometry(&anchor, &cover).unwrap();
        assert!(g.is_aligned_with(&anchor));
        assert!((g.origin_x - 9.0).abs() < 1e-12);
        assert!((g.origin_y - 21.0).abs() < 1e-12);
        let ext = g.extent();
        assert!(ext.max_x >= 12.3 && ext.min_y <= 17.1);
        assert_eq!(g.cols, 7);
        assert_eq!(g.rows, 8);
    }
}
