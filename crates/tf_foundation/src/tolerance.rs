// crates/tf_foundation/src/tolerance.rs

//! 数值容差
//!
//! 高程比较、网格对齐判断和几何计算中使用的阈值。

/// 默认无数据值（与历史数据一致）
pub const DEFAULT_NODATA: f32 = -9999.0;

/// 判断单元值"发生变化"的最小高程差 [m]
pub const ELEVATION_CHANGE: f64 = 1e-6;

/// 网格对齐判断的相对容差（相对于单元尺寸）
pub const ALIGNMENT_REL: f64 = 1e-9;

/// 几何退化判断阈值
pub const GEOMETRY_EPS: f64 = 1e-12;

/// 两个单元尺寸是否视为相同
#[inline]
pub fn same_cell_size(a: f64, b: f64) -> bool {
    (a - b).abs() <= ALIGNMENT_REL * a.abs().max(b.abs())
}

/// `value` 是否为 `step` 的整数倍（容差相对于 `step`）
#[inline]
pub fn is_integral_multiple(value: f64, step: f64) -> bool {
    let ratio = value / step;
    (ratio - ratio.round()).abs() <= 1e-6
}
