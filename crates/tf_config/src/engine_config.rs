// crates/tf_config/src/engine_config.rs

//! EngineConfig - 差分/融合引擎配置
//!
//! 所有字段都有默认值，JSON 中缺省的键取默认。加载后统一经过 `validate`。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use tf_foundation::ensure;
use tf_io::{CodecOptions, Predictor};
use tf_terrain::{
    DiffOptions, HarmonizeOptions, ResampleMethod, SkirtOptions, TiePolicy, VolumeOptions,
    DEFAULT_PARALLEL_THRESHOLD,
};

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 异常值剔除
    #[serde(default)]
    pub outlier: OutlierConfig,

    /// 过渡坡面
    #[serde(default)]
    pub skirt: SkirtConfig,

    /// 分辨率统一
    #[serde(default)]
    pub harmonize: HarmonizeConfig,

    /// 体积统计
    #[serde(default)]
    pub volume: VolumeConfig,

    /// 栅格编码
    #[serde(default)]
    pub codec: CodecConfig,
}

/// 异常值剔除配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierConfig {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 标准差倍数 k
    #[serde(default = "default_multiple")]
    pub multiple: f64,
}

fn default_true() -> bool { true }
fn default_multiple() -> f64 { 3.0 }

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            multiple: default_multiple(),
        }
    }
}

/// 过渡坡面配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkirtConfig {
    /// 坡比（垂直/水平）
    #[serde(default = "default_slope_ratio")]
    pub slope_ratio: f64,

    /// 搜索半径 [单元]
    #[serde(default = "default_search_radius")]
    pub search_radius_cells: usize,

    /// 平局容差 [m]
    #[serde(default = "default_tie_tolerance")]
    pub tie_tolerance: f64,

    /// 平局策略
    #[serde(default)]
    pub tie_policy: TiePolicy,
}

fn default_slope_ratio() -> f64 { 1.0 }
fn default_search_radius() -> usize { 100 }
fn default_tie_tolerance() -> f64 { 1e-3 }

impl Default for SkirtConfig {
    fn default() -> Self {
        Self {
            slope_ratio: default_slope_ratio(),
            search_radius_cells: default_search_radius(),
            tie_tolerance: default_tie_tolerance(),
            tie_policy: TiePolicy::default(),
        }
    }
}

/// 分辨率统一配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonizeConfig {
    /// 上采样方法
    #[serde(default)]
    pub method: ResampleMethod,

    /// 分辨率比超过该值时给出警告
    #[serde(default = "default_ratio_warning")]
    pub resolution_ratio_warning: f64,

    /// 并行阈值（单元数）
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_ratio_warning() -> f64 { 4.0 }
fn default_parallel_threshold() -> usize { DEFAULT_PARALLEL_THRESHOLD }

impl Default for HarmonizeConfig {
    fn default() -> Self {
        Self {
            method: ResampleMethod::default(),
            resolution_ratio_warning: default_ratio_warning(),
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

/// 体积统计配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// 合成单元是否计入体积
    #[serde(default = "default_true")]
    pub include_synthetic: bool,

    /// 分类时视为未变化的容差 [m]
    #[serde(default = "default_unchanged_tolerance")]
    pub unchanged_tolerance: f64,
}

fn default_unchanged_tolerance() -> f64 { 1e-3 }

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            include_synthetic: default_true(),
            unchanged_tolerance: default_unchanged_tolerance(),
        }
    }
}

/// 栅格编码配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// 分块边长 [单元]
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,

    /// zstd 压缩级别
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    /// 预测器
    #[serde(default)]
    pub predictor: Predictor,
}

fn default_tile_size() -> u32 { 256 }
fn default_compression_level() -> i32 { 3 }

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            tile_size: default_tile_size(),
            compression_level: default_compression_level(),
            predictor: Predictor::default(),
        }
    }
}

impl EngineConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// 从 JSON 文本解析并校验
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let k = self.outlier.multiple;
        ensure!(
            k.is_finite() && k > 0.0,
            ConfigError::invalid("outlier.multiple", k, "倍数必须为正")
        );

        let s = &self.skirt;
        ensure!(
            s.slope_ratio.is_finite() && s.slope_ratio > 0.0,
            ConfigError::invalid("skirt.slope_ratio", s.slope_ratio, "坡比必须为正")
        );
        ensure!(
            s.search_radius_cells > 0,
            ConfigError::invalid(
                "skirt.search_radius_cells",
                s.search_radius_cells,
                "搜索半径至少 1 个单元",
            )
        );
        ensure!(
            s.tie_tolerance.is_finite() && s.tie_tolerance >= 0.0,
            ConfigError::invalid("skirt.tie_tolerance", s.tie_tolerance, "容差不能为负")
        );

        let ratio = self.harmonize.resolution_ratio_warning;
        ensure!(
            ratio.is_finite() && ratio >= 1.0,
            ConfigError::invalid("harmonize.resolution_ratio_warning", ratio, "阈值不能小于 1")
        );

        let tol = self.volume.unchanged_tolerance;
        ensure!(
            tol.is_finite() && tol >= 0.0,
            ConfigError::invalid("volume.unchanged_tolerance", tol, "容差不能为负")
        );

        ensure!(
            self.codec.tile_size > 0,
            ConfigError::invalid("codec.tile_size", 0, "分块边长必须为正")
        );
        ensure!(
            (1..=22).contains(&self.codec.compression_level),
            ConfigError::invalid(
                "codec.compression_level",
                self.codec.compression_level,
                "zstd 级别必须在 [1, 22] 范围内",
            )
        );

        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 差分参数
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            filter_outliers: self.outlier.enabled,
            outlier_multiple: self.outlier.multiple,
        }
    }

    /// 坡面参数
    pub fn skirt_options(&self) -> SkirtOptions {
        SkirtOptions {
            slope_ratio: self.skirt.slope_ratio,
            search_radius_cells: self.skirt.search_radius_cells,
            tie_tolerance: self.skirt.tie_tolerance,
            tie_policy: self.skirt.tie_policy,
        }
    }

    /// 分辨率统一参数
    pub fn harmonize_options(&self) -> HarmonizeOptions {
        HarmonizeOptions {
            method: self.harmonize.method,
            resolution_ratio_warning: self.harmonize.resolution_ratio_warning,
            parallel_threshold: self.harmonize.parallel_threshold,
        }
    }

    /// 体积参数
    pub fn volume_options(&self) -> VolumeOptions {
        VolumeOptions {
            include_synthetic: self.volume.include_synthetic,
        }
    }

    /// 编码参数
    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            tile_size: self.codec.tile_size,
            compression_level: self.codec.compression_level,
            predictor: self.codec.predictor,
        }
    }
}
