// crates/tf_terrain/src/volume.rs

//! 体积统计
//!
//! 对差值栅格积分：填方 = Σ(正差值) × 单元面积，挖方 = Σ|负差值| × 单元面积，
//! 净体积 = 填方 − 挖方。单元以 f32 存储，累加在 f64 中以 Kahan 补偿进行，
//! 按块并行后合并部分和。

use crate::diff::DifferenceGrid;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tf_foundation::KahanSum;
use tracing::debug;

const CHUNK: usize = 8192;

/// 体积统计选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeOptions {
    /// 是否计入过渡坡面的合成单元
    pub include_synthetic: bool,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self {
            include_synthetic: true,
        }
    }
}

/// 体积统计结果
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeStats {
    /// 挖方 [m³]（正值）
    pub cut_volume: f64,
    /// 填方 [m³]
    pub fill_volume: f64,
    /// 净体积 = 填方 − 挖方 [m³]
    pub net_volume: f64,
    /// 最小厚度 [m]
    pub thickness_min: Option<f64>,
    /// 最大厚度 [m]
    pub thickness_max: Option<f64>,
    /// 参与统计的面积 [m²]
    pub analyzed_area: f64,
    /// 平均厚度 = 净体积 / 面积 [m]
    pub mean_thickness: f64,
    /// 参与统计的单元数
    pub valid_cells: usize,
    /// 其中的合成单元数
    pub synthetic_cells: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Partial {
    cut: KahanSum,
    fill: KahanSum,
    cells: usize,
    synthetic: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl Partial {
    fn merge(mut self, other: Self) -> Self {
        self.cut.merge(&other.cut);
        self.fill.merge(&other.fill);
        self.cells += other.cells;
        self.synthetic += other.synthetic;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self
    }
}

/// 对差值栅格积分
pub fn aggregate(difference: &DifferenceGrid, options: &VolumeOptions) -> VolumeStats {
    let grid = difference.grid();
    let nodata = grid.nodata();

    let total = grid
        .data()
        .par_chunks(CHUNK)
        .zip(difference.synthetic().par_chunks(CHUNK))
        .map(|(values, synthetic)| {
            let mut p = Partial::default();
            for (&v, &syn) in values.iter().zip(synthetic) {
                if v == nodata || (syn && !options.include_synthetic) {
                    continue;
                }
                let d = f64::from(v);
                if d > 0.0 {
                    p.fill.add(d);
                } else if d < 0.0 {
                    p.cut.add(-d);
                }
                p.cells += 1;
                if syn {
                    p.synthetic += 1;
                }
                p.min = Some(p.min.map_or(d, |m| m.min(d)));
                p.max = Some(p.max.map_or(d, |m| m.max(d)));
            }
            p
        })
        .reduce(Partial::default, Partial::merge);

    let cell_area = difference.cell_area();
    let cut_volume = total.cut.value() * cell_area;
    let fill_volume = total.fill.value() * cell_area;
    let net_volume = fill_volume - cut_volume;
    let analyzed_area = total.cells as f64 * cell_area;
    let mean_thickness = if analyzed_area > 0.0 {
        net_volume / analyzed_area
    } else {
        0.0
    };

    let stats = VolumeStats {
        cut_volume,
        fill_volume,
        net_volume,
        thickness_min: total.min,
        thickness_max: total.max,
        analyzed_area,
        mean_thickness,
        valid_cells: total.cells,
        synthetic_cells: total.synthetic,
    };
    debug!(
        cut = stats.cut_volume,
        fill = stats.fill_volume,
        net = stats.net_volume,
        cells = stats.valid_cells,
        "体积统计完成"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Grid, GridGeometry};
    use tf_geo::CrsDefinition;

    const ND: f32 = -9999.0;

    fn diff_grid(cs: f64, data: Vec<f32>, synthetic: Vec<bool>) -> DifferenceGrid {
        let n = data.len();
        let g = GridGeometry::new(0.0, 1.0, cs, n, 1).unwrap();
        let grid = Grid::from_data(g, ND, CrsDefinition::Epsg(32719), data).unwrap();
        DifferenceGrid::new(grid, synthetic).unwrap()
    }

    #[test]
    fn test_cut_fill_net() {
        let d = diff_grid(2.0, vec![1.0, -0.5, ND, 2.0], vec![false; 4]);
        let s = aggregate(&d, &VolumeOptions::default());
        assert!((s.fill_volume - 12.0).abs() < 1e-12);
        assert!((s.cut_volume - 2.0).abs() < 1e-12);
        assert!((s.net_volume - 10.0).abs() < 1e-12);
        assert!((s.analyzed_area - 12.0).abs() < 1e-12);
        assert!((s.mean_thickness - 10.0 / 12.0).abs() < 1e-12);
        assert_eq!(s.thickness_min, Some(-0.5));
        assert_eq!(s.thickness_max, Some(2.0));
    }

    #[test]
    fn test_synthetic_flag() {
        let d = diff_grid(1.0, vec![1.0, 3.0], vec![false, true]);
        let with = aggregate(&d, &VolumeOptions::default());
        let without = aggregate(&d, &VolumeOptions { include_synthetic: false });
        assert!((with.fill_volume - 4.0).abs() < 1e-12);
        assert_eq!(with.synthetic_cells, 1);
        assert!((without.fill_volume - 1.0).abs() < 1e-12);
        assert_eq!(without.synthetic_cells, 0);
    }

    #[test]
    fn test_empty_difference() {
        let d = diff_grid(1.0, vec![ND; 3], vec![false; 3]);
        let s = aggregate(&d, &VolumeOptions::default());
        assert_eq!(s, VolumeStats::default());
    }

    #[test]
    fn test_many_small_cells_stay_accurate() {
        // 百万级单元的小厚度累加
        let n = 1_000_000;
        let d = diff_grid(0.1, vec![0.001; n], vec![false; n]);
        let s = aggregate(&d, &VolumeOptions::default());
        let expected = n as f64 * f64::from(0.001f32) * 0.01;
        assert!((s.fill_volume - expected).abs() < 1e-9);
    }
}
