// crates/tf_config/src/lib.rs

//! TerraFuse Config Layer (Layer 4)
//!
//! 配置层，集中管理差分/融合引擎的全部可调参数。
//!
//! # 模块概览
//!
//! - [`engine_config`]: EngineConfig 及各分节配置
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: tf_cli       ─> 加载 EngineConfig
//! Layer 4: tf_config    ─> EngineConfig (本层)
//! Layer 4: tf_workflow  ─> 使用 EngineConfig 驱动融合
//! Layer 3: tf_io / tf_terrain
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine_config;
pub mod error;

// 重导出核心类型
pub use engine_config::{
    CodecConfig, EngineConfig, HarmonizeConfig, OutlierConfig, SkirtConfig, VolumeConfig,
};
pub use error::ConfigError;
