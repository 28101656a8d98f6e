// crates/tf_terrain/src/lib.rs

//! 地形栅格处理
//!
//! 提供高程栅格模型和体积差分/曲面融合所需的全部数值算法。
//!
//! # 模块
//!
//! - `raster`: 高程栅格与网格几何
//! - `harmonize`: 分辨率统一（双线性上采样，并集范围）
//! - `diff`: 挖填差分与异常值剔除
//! - `skirt`: 过渡坡面投影
//! - `update`: 母面覆盖更新
//! - `volume`: 体积积分
//! - `classify`: 差值分类与作业层类别
//! - `warning`: 降级结果警告
//!
//! # 处理流程
//!
//! ```text
//! 补丁 + 母面 → harmonize → difference → project_skirt → overlay_patch
//!                                     └→ with_skirt → aggregate
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod diff;
pub mod harmonize;
mod parallel;
pub mod raster;
pub mod skirt;
pub mod update;
pub mod volume;
pub mod warning;

// 重导出常用类型
pub use classify::{classify, CellClass, ClassCounts, ClassifiedGrid, LayerClass};
pub use diff::{
    difference, DiffOptions, DiffStats, DifferenceGrid, DifferenceOutcome, DIFFERENCE_NODATA,
};
pub use harmonize::{harmonize, HarmonizeOptions, HarmonizedPair, ResampleMethod, ResampledSide};
pub use parallel::DEFAULT_PARALLEL_THRESHOLD;
pub use raster::{Grid, GridGeometry, GridStats};
pub use skirt::{project_skirt, SkirtDirection, SkirtOptions, SkirtStats, SkirtSurface, TiePolicy};
pub use update::{overlay_patch, MasterUpdate, UpdateOptions, UpdateReport};
pub use volume::{aggregate, VolumeOptions, VolumeStats};
pub use warning::TerrainWarning;
