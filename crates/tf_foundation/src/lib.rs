// crates/tf_foundation/src/lib.rs

//! TerraFuse Foundation Layer
//!
//! 基础层，提供整个项目共享的错误类型和数值工具。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `TfError` / `TfResult`
//! - [`kahan`]: Kahan 补偿求和（宽精度累加器）
//! - [`tolerance`]: 高程与几何比较用的数值容差
//!
//! # 示例
//!
//! ```
//! use tf_foundation::{KahanSum, TfError, TfResult};
//!
//! fn total(values: &[f32]) -> TfResult<f64> {
//!     if values.is_empty() {
//!         return Err(TfError::invalid_input("空数组"));
//!     }
//!     Ok(KahanSum::sum_iter(values.iter().map(|&v| f64::from(v))))
//! }
//!
//! assert!((total(&[0.5, 0.25]).unwrap() - 0.75).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod kahan;
pub mod tolerance;

// 重导出常用类型
pub use error::{TfError, TfResult};
pub use kahan::KahanSum;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{TfError, TfResult};
    pub use crate::kahan::KahanSum;
    pub use crate::tolerance;
    pub use crate::ensure;
}
