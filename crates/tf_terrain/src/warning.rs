// crates/tf_terrain/src/warning.rs

//! 降级结果警告
//!
//! 这些情况不会中止合并，而是随体积结果一起返回给调用方。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 地形处理警告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerrainWarning {
    /// 补丁没有任何有效单元
    EmptyPatch,
    /// 搜索半径内没有任何有效上下文，未生成过渡坡面
    IsolatedPatch {
        /// 边界单元数
        boundary_cells: usize,
        /// 搜索半径 [单元]
        search_radius_cells: usize,
    },
    /// 部分边界单元在搜索半径内没有上下文，这些边缘保持硬边
    PartiallyUnsupportedEdge {
        /// 无上下文的边界单元数
        unsupported: usize,
        /// 边界单元总数
        total: usize,
    },
    /// 分辨率比超过阈值（仍会上采样）
    ResolutionRatioExceeded {
        /// 粗/细单元尺寸比
        ratio: f64,
        /// 阈值
        bound: f64,
    },
    /// 补丁与基准范围不相交
    NoOverlap,
}

impl fmt::Display for TerrainWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPatch => write!(f, "补丁没有有效单元"),
            Self::IsolatedPatch {
                boundary_cells,
                search_radius_cells,
            } => write!(
                f,
                "补丁孤立: {boundary_cells} 个边界单元在 {search_radius_cells} 单元内均无有效上下文"
            ),
            Self::PartiallyUnsupportedEdge { unsupported, total } => {
                write!(f, "部分边缘无上下文: {unsupported}/{total} 个边界单元保持硬边")
            }
            Self::ResolutionRatioExceeded { ratio, bound } => {
                write!(f, "分辨率比 {ratio:.2} 超过阈值 {bound:.2}")
            }
            Self::NoOverlap => write!(f, "补丁与基准范围不相交"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let w = TerrainWarning::PartiallyUnsupportedEdge {
            unsupported: 3,
            total: 40,
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "partially_unsupported_edge");
        assert_eq!(json["unsupported"], 3);
        let back: TerrainWarning = serde_json::from_value(json).unwrap();
        assert_eq!(back, w);
    }

    #[test]
    fn test_display() {
        assert!(TerrainWarning::EmptyPatch.to_string().contains("补丁"));
    }
}
