// crates/tf_terrain/src/raster.rs

//! 高程栅格
//!
//! 规则方形网格上的 f32 高程，原点为左上角（x₀ = 左边界，y₀ = 上边界），
//! 行号向南增大。栅格一经构建即不可变：所有算法都返回新栅格。
//!
//! 不变量：每个单元要么是有限值，要么恰好等于无数据值。
//! 构造时非有限样本会被改写为无数据值。

use serde::{Deserialize, Serialize};
use tf_foundation::error::{TfError, TfResult};
use tf_foundation::tolerance::{is_integral_multiple, same_cell_size};
use tf_geo::{BoundingBox, CrsDefinition, Point2D};
use tracing::debug;

/// 网格几何（仿射变换 + 行列数）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// 左边界 x
    pub origin_x: f64,
    /// 上边界 y
    pub origin_y: f64,
    /// 单元边长 [m]
    pub cell_size: f64,
    /// 列数
    pub cols: usize,
    /// 行数
    pub rows: usize,
}

impl GridGeometry {
    /// 创建并校验网格几何
    ///
    /// # Errors
    ///
    /// 单元尺寸非正或非有限、原点非有限、行列数为零时返回 `MalformedGrid`。
    pub fn new(origin_x: f64, origin_y: f64, cell_size: f64, cols: usize, rows: usize) -> TfResult<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(TfError::malformed_grid(format!("单元尺寸无效: {cell_size}")));
        }
        if !(origin_x.is_finite() && origin_y.is_finite()) {
            return Err(TfError::malformed_grid(format!(
                "原点坐标非有限值: ({origin_x}, {origin_y})"
            )));
        }
        if cols == 0 || rows == 0 {
            return Err(TfError::malformed_grid(format!("行列数不能为零: {cols}x{rows}")));
        }
        Ok(Self {
            origin_x,
            origin_y,
            cell_size,
            cols,
            rows,
        })
    }

    /// 单元总数
    #[inline]
    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    /// 是否为空（合法几何永远非空）
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 行主序索引
    #[inline]
    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.cols + col
    }

    /// 索引 → (列, 行)
    #[inline]
    pub fn col_row(&self, idx: usize) -> (usize, usize) {
        (idx % self.cols, idx / self.cols)
    }

    /// 单元面积 [m²]
    #[inline]
    pub fn cell_area(&self) -> f64 {
        self.cell_size * self.cell_size
    }

    /// 单元中心坐标
    #[inline]
    pub fn cell_center(&self, col: usize, row: usize) -> Point2D {
        Point2D::new(
            self.origin_x + (col as f64 + 0.5) * self.cell_size,
            self.origin_y - (row as f64 + 0.5) * self.cell_size,
        )
    }

    /// 地理坐标转连续像素坐标（单元 i 覆盖 [i, i+1)）
    #[inline]
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.cell_size,
            (self.origin_y - y) / self.cell_size,
        )
    }

    /// 连续像素坐标转地理坐标
    #[inline]
    pub fn pixel_to_geo(&self, px: f64, py: f64) -> (f64, f64) {
        (
            self.origin_x + px * self.cell_size,
            self.origin_y - py * self.cell_size,
        )
    }

    /// 覆盖范围
    pub fn extent(&self) -> BoundingBox {
        BoundingBox::new(
            self.origin_x,
            self.origin_y - self.rows as f64 * self.cell_size,
            self.origin_x + self.cols as f64 * self.cell_size,
            self.origin_y,
        )
    }

    /// 两个几何是否位于同一格网（单元尺寸相同且原点偏移为整单元）
    pub fn is_aligned_with(&self, other: &Self) -> bool {
        same_cell_size(self.cell_size, other.cell_size)
            && is_integral_multiple(self.origin_x - other.origin_x, self.cell_size)
            && is_integral_multiple(self.origin_y - other.origin_y, self.cell_size)
    }

    /// 两个几何是否完全重合（同格网、同原点、同行列数）
    pub fn same_lattice(&self, other: &Self) -> bool {
        self.is_aligned_with(other)
            && self.cols == other.cols
            && self.rows == other.rows
            && self.offset_in(other) == (0, 0)
    }

    /// 本几何原点在 `other` 中的整单元偏移 (列, 行)
    ///
    /// 仅在两者对齐时有意义。
    pub fn offset_in(&self, other: &Self) -> (isize, isize) {
        let dc = ((self.origin_x - other.origin_x) / other.cell_size).round() as isize;
        let dr = ((other.origin_y - self.origin_y) / other.cell_size).round() as isize;
        (dc, dr)
    }
}

/// 有效单元统计
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GridStats {
    /// 有效单元数
    pub valid_cells: usize,
    /// 最小值
    pub min: Option<f64>,
    /// 最大值
    pub max: Option<f64>,
}

/// 高程栅格
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    geometry: GridGeometry,
    nodata: f32,
    crs: CrsDefinition,
    data: Vec<f32>,
}

impl Grid {
    /// 从行主序数据构建栅格
    ///
    /// # Errors
    ///
    /// - 数据长度与 `rows * cols` 不一致 → `MalformedGrid`
    /// - 无数据值非有限 → `MalformedGrid`
    pub fn from_data(
        geometry: GridGeometry,
        nodata: f32,
        crs: CrsDefinition,
        mut data: Vec<f32>,
    ) -> TfResult<Self> {
        if data.len() != geometry.len() {
            return Err(TfError::malformed_grid(format!(
                "数据长度 {} 与 {}x{} 网格不一致",
                data.len(),
                geometry.cols,
                geometry.rows
            )));
        }
        if !nodata.is_finite() {
            return Err(TfError::malformed_grid(format!("无数据值必须为有限值: {nodata}")));
        }

        let mut rewritten = 0usize;
        for v in data.iter_mut().filter(|v| !v.is_finite()) {
            *v = nodata;
            rewritten += 1;
        }
        if rewritten > 0 {
            debug!(cells = rewritten, "非有限样本已改写为无数据值");
        }

        Ok(Self {
            geometry,
            nodata,
            crs,
            data,
        })
    }

    /// 所有单元为同一值的栅格
    pub fn filled(geometry: GridGeometry, nodata: f32, crs: CrsDefinition, value: f32) -> TfResult<Self> {
        Self::from_data(geometry, nodata, crs, vec![value; geometry.len()])
    }

    /// 全部为无数据值的栅格
    pub fn empty(geometry: GridGeometry, nodata: f32, crs: CrsDefinition) -> TfResult<Self> {
        Self::filled(geometry, nodata, crs, nodata)
    }

    /// 按单元函数构建，`None` 表示无数据
    pub fn from_fn<F>(geometry: GridGeometry, nodata: f32, crs: CrsDefinition, mut f: F) -> TfResult<Self>
    where
        F: FnMut(usize, usize) -> Option<f32>,
    {
        let mut data = Vec::with_capacity(geometry.len());
        for row in 0..geometry.rows {
            for col in 0..geometry.cols {
                data.push(f(col, row).unwrap_or(nodata));
            }
        }
        Self::from_data(geometry, nodata, crs, data)
    }

    /// 以相同几何、无数据值和 CRS 构建新栅格
    pub fn with_data(&self, data: Vec<f32>) -> TfResult<Self> {
        Self::from_data(self.geometry, self.nodata, self.crs.clone(), data)
    }

    /// 网格几何
    #[inline]
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// 列数
    #[inline]
    pub fn cols(&self) -> usize {
        self.geometry.cols
    }

    /// 行数
    #[inline]
    pub fn rows(&self) -> usize {
        self.geometry.rows
    }

    /// 单元尺寸
    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.geometry.cell_size
    }

    /// 无数据值
    #[inline]
    pub fn nodata(&self) -> f32 {
        self.nodata
    }

    /// 坐标参考系统
    #[inline]
    pub fn crs(&self) -> &CrsDefinition {
        &self.crs
    }

    /// 原始数据（含无数据值）
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// 取出数据
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// 单元总数
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否没有单元
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 值是否为有效高程
    #[inline]
    pub fn is_valid_value(&self, value: f32) -> bool {
        value != self.nodata
    }

    /// 按索引判断单元是否有效
    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        self.is_valid_value(self.data[idx])
    }

    /// 按索引取有效值
    #[inline]
    pub fn value(&self, idx: usize) -> Option<f32> {
        let v = self.data[idx];
        self.is_valid_value(v).then_some(v)
    }

    /// 按行列取有效值，越界或无数据返回 `None`
    #[inline]
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col < self.geometry.cols && row < self.geometry.rows {
            self.value(self.geometry.index(col, row))
        } else {
            None
        }
    }

    /// 有效单元数
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| self.is_valid_value(v)).count()
    }

    /// 有效单元的数量与极值
    pub fn stats(&self) -> GridStats {
        let mut stats = GridStats::default();
        for &v in self.data.iter().filter(|&&v| self.is_valid_value(v)) {
            let v = f64::from(v);
            stats.valid_cells += 1;
            stats.min = Some(stats.min.map_or(v, |m| m.min(v)));
            stats.max = Some(stats.max.map_or(v, |m| m.max(v)));
        }
        stats
    }

    /// 覆盖范围
    pub fn extent(&self) -> BoundingBox {
        self.geometry.extent()
    }

    /// 同一 CRS 且位于同一格网
    pub fn is_aligned_with(&self, other: &Self) -> bool {
        self.crs.is_compatible(&other.crs) && self.geometry.is_aligned_with(&other.geometry)
    }

    /// 检查 CRS 一致
    ///
    /// # Errors
    ///
    /// CRS 不兼容时返回 `IncompatibleReference`。
    pub fn check_reference(&self, other: &Self) -> TfResult<()> {
        if self.crs.is_compatible(&other.crs) {
            Ok(())
        } else {
            Err(TfError::incompatible_reference(
                self.crs.to_text(),
                other.crs.to_text(),
            ))
        }
    }

    /// 检查两个栅格位于同一 CRS 和完全相同的网格上
    ///
    /// # Errors
    ///
    /// CRS 不同返回 `IncompatibleReference`，网格不同返回 `MisalignedGrids`。
    pub fn check_same_lattice(&self, other: &Self) -> TfResult<()> {
        self.check_reference(other)?;
        if self.geometry.same_lattice(&other.geometry) {
            Ok(())
        } else {
            Err(TfError::misaligned(format!(
                "网格不一致: {:?} vs {:?}",
                self.geometry, other.geometry
            )))
        }
    }
}
