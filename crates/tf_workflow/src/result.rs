// crates/tf_workflow/src/result.rs

//! 融合结果记录

use serde::{Deserialize, Serialize};
use tf_geo::FootprintExtent;
use tf_terrain::{DiffStats, LayerClass, SkirtStats, TerrainWarning, UpdateReport, VolumeStats};

/// 一次融合的体积结果
///
/// 体积单位 m³，厚度单位 m，面积单位 m²。没有任何有效差值时厚度极值为 `None`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumetricResult {
    /// 挖方（正值）
    pub cut_volume: f64,
    /// 填方
    pub fill_volume: f64,
    /// 净体积 = 填方 − 挖方
    pub net_volume: f64,
    /// 最小厚度
    pub thickness_min: Option<f64>,
    /// 最大厚度
    pub thickness_max: Option<f64>,
    /// 统计面积
    pub analyzed_area: f64,
    /// 测区长度
    pub length: f64,
    /// 测区宽度
    pub width: f64,
    /// 平均厚度
    pub mean_thickness: f64,
    /// 作业层类别
    pub layer_class: LayerClass,
    /// 被剔除的异常差值数
    pub suppressed_cells: usize,
    /// 过渡坡面生成的单元数
    pub synthetic_cells: usize,
    /// 降级警告
    pub warnings: Vec<TerrainWarning>,
}

impl VolumetricResult {
    /// 汇总各阶段统计
    pub fn from_stages(
        volume: &VolumeStats,
        diff: &DiffStats,
        skirt: &SkirtStats,
        extent: &FootprintExtent,
        warnings: Vec<TerrainWarning>,
    ) -> Self {
        Self {
            cut_volume: volume.cut_volume,
            fill_volume: volume.fill_volume,
            net_volume: volume.net_volume,
            thickness_min: volume.thickness_min,
            thickness_max: volume.thickness_max,
            analyzed_area: volume.analyzed_area,
            length: extent.length,
            width: extent.width,
            mean_thickness: volume.mean_thickness,
            layer_class: LayerClass::from_thickness(volume.mean_thickness),
            suppressed_cells: diff.suppressed_cells,
            synthetic_cells: skirt.synthetic_cells,
            warnings,
        }
    }
}

/// 融合的完整报告（体积结果之外的过程统计）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    /// 体积结果
    pub volumetric: VolumetricResult,
    /// 差分统计
    pub diff: DiffStats,
    /// 坡面统计
    pub skirt: SkirtStats,
    /// 母面覆盖报告
    pub update: UpdateReport,
    /// 测区轮廓尺寸
    pub extent: FootprintExtent,
}
