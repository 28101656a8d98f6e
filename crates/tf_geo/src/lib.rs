// crates/tf_geo/src/lib.rs
//! TerraFuse 地理空间基础模块
//!
//! 提供坐标参考系统 (CRS) 标识、平面几何类型和测区轮廓尺寸计算。
//!
//! # 模块
//!
//! - `crs`: 坐标参考系统定义、解析与兼容性判断
//! - `geometry`: 平面点 `Point2D`
//! - `bbox`: 轴对齐边界框
//! - `extent`: 多边形轮廓的旋转不变长度/宽度
//!
//! # 示例
//!
//! ```
//! use tf_geo::prelude::*;
//!
//! let crs = CrsDefinition::parse("EPSG:32719").unwrap();
//! assert_eq!(crs, CrsDefinition::utm_zone(19, false));
//!
//! let poly = Polygon::new(vec![
//!     Point2D::new(0.0, 0.0),
//!     Point2D::new(40.0, 0.0),
//!     Point2D::new(40.0, 10.0),
//!     Point2D::new(0.0, 10.0),
//! ]).unwrap();
//! let ext = poly.extent();
//! assert!((ext.area - 400.0).abs() < 1e-9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod bbox;
pub mod crs;
pub mod extent;
pub mod geometry;

/// 预导入模块
pub mod prelude {
    pub use crate::bbox::BoundingBox;
    pub use crate::crs::CrsDefinition;
    pub use crate::extent::{FootprintExtent, Polygon};
    pub use crate::geometry::Point2D;
}

// 重导出常用类型
pub use bbox::BoundingBox;
pub use crs::CrsDefinition;
pub use extent::{FootprintExtent, Polygon};
pub use geometry::Point2D;
