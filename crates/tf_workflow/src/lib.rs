// crates/tf_workflow/src/lib.rs

//! TerraFuse 工作流模块
//!
//! 把地形算法与版本库串成一次完整的补丁融合。
//!
//! # 模块结构
//!
//! - [`pipeline`]: 纯计算（统一 → 差分 → 坡面 → 体积 → 覆盖）
//! - [`manager`]: 加锁、读取、发布的融合事务
//! - [`result`]: 体积结果与融合报告
//!
//! # 示例
//!
//! ```rust,ignore
//! use tf_workflow::{MergeJob, MergeManager};
//!
//! let manager = MergeManager::new(MasterStore::new("/data/masters"), EngineConfig::default())?;
//! let job = MergeJob::new("W12", patch, date).with_footprint(polygon);
//! let outcome = manager.merge(&job)?;
//! println!("净体积 {:.2} m³", outcome.report.volumetric.net_volume);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod pipeline;
pub mod result;

// 重导出核心类型
pub use tf_io::{WallGuard, WallLocks};
pub use manager::{MergeJob, MergeManager, MergeOutcome};
pub use pipeline::{compute_merge, valid_footprint, MergeComputation};
pub use result::{MergeReport, VolumetricResult};
