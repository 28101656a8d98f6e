// crates/tf_terrain/src/diff.rs

//! 挖填差分
//!
//! `delta = patch − base`，仅在两者都有效的单元上计算；正值为填方，负值为挖方。
//! 随后对所有有效差值求均值和总体标准差，`|delta − mean| > k·σ` 的单元置为无数据。
//!
//! 统计量在 f64 中以 Kahan 补偿累加，大栅格按块并行后合并。

use crate::raster::Grid;
use crate::skirt::SkirtSurface;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tf_foundation::error::TfResult;
use tf_foundation::KahanSum;
use tracing::debug;

/// 并行统计的分块大小
const CHUNK: usize = 8192;

/// 差值栅格的无数据值
///
/// 与输入栅格的无数据值无关，避免真实差值（例如 0）恰好等于输入的无数据值。
/// 实测高程之差达不到 f32 下限的量级；溢出或恰好等于该值的差值按无数据处理。
pub const DIFFERENCE_NODATA: f32 = f32::MIN;

#[inline]
fn delta(patch: f32, base: f32) -> f32 {
    let d = patch - base;
    if d.is_finite() && d != DIFFERENCE_NODATA {
        d
    } else {
        DIFFERENCE_NODATA
    }
}

/// 差分选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// 是否剔除异常值
    pub filter_outliers: bool,
    /// 标准差倍数 k
    pub outlier_multiple: f64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            filter_outliers: true,
            outlier_multiple: 3.0,
        }
    }
}

/// 差分统计（滤波前的原始值）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DiffStats {
    /// 原始有效差值数
    pub valid_cells: usize,
    /// 被剔除的异常单元数
    pub suppressed_cells: usize,
    /// 原始差值均值
    pub mean: f64,
    /// 原始差值总体标准差
    pub std_dev: f64,
    /// 原始最小差值
    pub raw_min: Option<f64>,
    /// 原始最大差值
    pub raw_max: Option<f64>,
}

/// 差值栅格，附带合成单元掩膜
#[derive(Debug, Clone, PartialEq)]
pub struct DifferenceGrid {
    grid: Grid,
    synthetic: Vec<bool>,
}

impl DifferenceGrid {
    /// 由差值栅格和合成掩膜构建
    ///
    /// # Errors
    ///
    /// 掩膜长度与栅格不一致时返回 `SizeMismatch`。
    pub fn new(grid: Grid, synthetic: Vec<bool>) -> TfResult<Self> {
        tf_foundation::TfError::check_size("synthetic mask", grid.len(), synthetic.len())?;
        Ok(Self { grid, synthetic })
    }

    /// 差值栅格
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// 合成掩膜
    pub fn synthetic(&self) -> &[bool] {
        &self.synthetic
    }

    /// 单元是否由过渡坡面生成
    #[inline]
    pub fn is_synthetic(&self, idx: usize) -> bool {
        self.synthetic[idx]
    }

    /// 合成单元数（含无差值的空洞填充单元）
    pub fn synthetic_count(&self) -> usize {
        self.synthetic.iter().filter(|&&s| s).count()
    }

    /// 单元面积 [m²]
    pub fn cell_area(&self) -> f64 {
        self.grid.geometry().cell_area()
    }

    /// 并入过渡坡面
    ///
    /// 合成单元在基准有效处取 `Z_proj − base`；基准为空洞时没有参考面，
    /// 差值保持无数据，但仍记为合成单元。
    ///
    /// # Errors
    ///
    /// 坡面、基准与本差值栅格不在同一格网时返回错误。
    pub fn with_skirt(&self, skirt: &SkirtSurface, base: &Grid) -> TfResult<Self> {
        self.grid.check_same_lattice(skirt.completed())?;
        self.grid.check_same_lattice(base)?;

        let mut data = self.grid.data().to_vec();
        let mut synthetic = self.synthetic.clone();
        let completed = skirt.completed();
        let cells = skirt.synthetic().iter().enumerate().filter_map(|(i, &s)| s.then_some(i));
        for idx in cells {
            synthetic[idx] = true;
            data[idx] = match (completed.value(idx), base.value(idx)) {
                (Some(z), Some(b)) => delta(z, b),
                _ => self.grid.nodata(),
            };
        }

        Ok(Self {
            grid: self.grid.with_data(data)?,
            synthetic,
        })
    }
}

/// 差分结果
#[derive(Debug, Clone)]
pub struct DifferenceOutcome {
    /// 滤波后的差值栅格
    pub difference: DifferenceGrid,
    /// 统计量
    pub stats: DiffStats,
}

/// 分块累加量
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    count: usize,
    sum: KahanSum,
    min: Option<f64>,
    max: Option<f64>,
}

impl Moments {
    fn push(&mut self, v: f64) {
        self.count += 1;
        self.sum.add(v);
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    fn merge(mut self, other: Self) -> Self {
        self.count += other.count;
        self.sum.merge(&other.sum);
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

/// 计算挖填差值
///
/// 输入必须已经统一到同一格网（见 [`crate::harmonize::harmonize`]）。
///
/// # Errors
///
/// CRS 不同返回 `IncompatibleReference`，格网不同返回 `MisalignedGrids`。
pub fn difference(patch: &Grid, base: &Grid, options: &DiffOptions) -> TfResult<DifferenceOutcome> {
    patch.check_same_lattice(base)?;

    let nodata = DIFFERENCE_NODATA;
    let mut deltas: Vec<f32> = patch
        .data()
        .par_iter()
        .zip(base.data().par_iter())
        .map(|(&p, &b)| {
            if patch.is_valid_value(p) && base.is_valid_value(b) {
                delta(p, b)
            } else {
                nodata
            }
        })
        .collect();

    let is_valid = |v: f32| v != nodata;

    let moments = deltas
        .par_chunks(CHUNK)
        .map(|chunk| {
            let mut m = Moments::default();
            for &v in chunk.iter().filter(|&&v| is_valid(v)) {
                m.push(f64::from(v));
            }
            m
        })
        .reduce(Moments::default, Moments::merge);

    let mean = if moments.count > 0 {
        moments.sum.value() / moments.count as f64
    } else {
        0.0
    };

    let sq = deltas
        .par_chunks(CHUNK)
        .map(|chunk| {
            let mut acc = KahanSum::new();
            for &v in chunk.iter().filter(|&&v| is_valid(v)) {
                let d = f64::from(v) - mean;
                acc.add(d * d);
            }
            acc
        })
        .reduce(KahanSum::new, |mut a, b| {
            a.merge(&b);
            a
        });
    let std_dev = if moments.count > 0 {
        (sq.value() / moments.count as f64).sqrt()
    } else {
        0.0
    };

    let mut suppressed_cells = 0;
    if options.filter_outliers && std_dev > 0.0 {
        let limit = options.outlier_multiple * std_dev;
        suppressed_cells = deltas
            .par_iter_mut()
            .map(|v| {
                if is_valid(*v) && (f64::from(*v) - mean).abs() > limit {
                    *v = nodata;
                    1
                } else {
                    0
                }
            })
            .sum();
    }

    let stats = DiffStats {
        valid_cells: moments.count,
        suppressed_cells,
        mean,
        std_dev,
        raw_min: moments.min,
        raw_max: moments.max,
    };
    debug!(
        valid = stats.valid_cells,
        suppressed = stats.suppressed_cells,
        mean = stats.mean,
        std_dev = stats.std_dev,
        "差分完成"
    );

    let synthetic = vec![false; deltas.len()];
    let grid = Grid::from_data(*patch.geometry(), nodata, patch.crs().clone(), deltas)?;
    Ok(DifferenceOutcome {
        difference: DifferenceGrid::new(grid, synthetic)?,
        stats,
    })
}
