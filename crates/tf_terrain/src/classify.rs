// crates/tf_terrain/src/classify.rs

//! 差值分类
//!
//! 逐单元分为 无数据 / 未变化 / 挖方 / 填方 / 合成，可输出为辅助栅格
//! （类别码以 f32 存储，0 即无数据）。另提供按平均厚度划分的作业层类别。

use crate::diff::DifferenceGrid;
use crate::raster::Grid;
use serde::{Deserialize, Serialize};
use tf_foundation::error::TfResult;

/// 单元类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CellClass {
    /// 无差值
    NoData = 0,
    /// |Δ| ≤ 容差
    Unchanged = 1,
    /// 挖方
    Cut = 2,
    /// 填方
    Fill = 3,
    /// 过渡坡面生成
    Synthetic = 4,
}

impl CellClass {
    /// 类别码
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// 由类别码还原
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NoData),
            1 => Some(Self::Unchanged),
            2 => Some(Self::Cut),
            3 => Some(Self::Fill),
            4 => Some(Self::Synthetic),
            _ => None,
        }
    }
}

/// 各类别单元数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassCounts {
    /// 无数据
    pub nodata: usize,
    /// 未变化
    pub unchanged: usize,
    /// 挖方
    pub cut: usize,
    /// 填方
    pub fill: usize,
    /// 合成
    pub synthetic: usize,
}

/// 分类结果
#[derive(Debug, Clone)]
pub struct ClassifiedGrid {
    classes: Vec<CellClass>,
    template: Grid,
}

impl ClassifiedGrid {
    /// 逐单元类别
    pub fn classes(&self) -> &[CellClass] {
        &self.classes
    }

    /// 统计各类别数量
    pub fn counts(&self) -> ClassCounts {
        let mut c = ClassCounts::default();
        for class in &self.classes {
            match class {
                CellClass::NoData => c.nodata += 1,
                CellClass::Unchanged => c.unchanged += 1,
                CellClass::Cut => c.cut += 1,
                CellClass::Fill => c.fill += 1,
                CellClass::Synthetic => c.synthetic += 1,
            }
        }
        c
    }

    /// 输出为类别码栅格（无数据值 0）
    pub fn to_grid(&self) -> TfResult<Grid> {
        let data = self.classes.iter().map(|c| f32::from(c.code())).collect();
        Grid::from_data(
            *self.template.geometry(),
            f32::from(CellClass::NoData.code()),
            self.template.crs().clone(),
            data,
        )
    }
}

/// 对差值栅格逐单元分类
///
/// 合成单元优先于数值类别，即使其差值为无数据（基准空洞上的坡面）。
pub fn classify(difference: &DifferenceGrid, unchanged_tolerance: f64) -> ClassifiedGrid {
    let grid = difference.grid();
    let classes = (0..grid.len())
        .map(|i| {
            if difference.is_synthetic(i) {
                return CellClass::Synthetic;
            }
            match grid.value(i).map(f64::from) {
                None => CellClass::NoData,
                Some(d) if d.abs() <= unchanged_tolerance => CellClass::Unchanged,
                Some(d) if d > 0.0 => CellClass::Fill,
                Some(_) => CellClass::Cut,
            }
        })
        .collect();
    ClassifiedGrid {
        classes,
        template: grid.clone(),
    }
}

/// 按平均厚度划分的作业层类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerClass {
    /// 三层（> 1.3 m）
    TripleLayer,
    /// 双层（> 0.8 m）
    DoubleLayer,
    /// 填筑（> 0.2 m）
    Fill,
    /// 挖填平衡（≥ −0.2 m）
    CutFill,
    /// 挖方
    Cut,
}

impl LayerClass {
    /// 由平均厚度 [m] 判定
    pub fn from_thickness(thickness: f64) -> Self {
        if thickness > 1.3 {
            Self::TripleLayer
        } else if thickness > 0.8 {
            Self::DoubleLayer
        } else if thickness > 0.2 {
            Self::Fill
        } else if thickness >= -0.2 {
            Self::CutFill
        } else {
            Self::Cut
        }
    }
}
