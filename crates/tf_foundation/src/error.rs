// crates/tf_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `TfError` 枚举和 `TfResult` 类型别名，用于整个项目的错误处理。
//!
//! # 错误分类
//!
//! 1. **致命错误**（中止本次合并）: 坐标系不一致、栅格格式错误、压缩数据损坏
//! 2. **降级结果**: 不作为错误抛出，以警告形式附加到体积结果上（见 `tf_terrain::warning`）
//! 3. **计数信息**: 剔除的异常单元数、合成单元数，不属于错误
//!
//! # 示例
//!
//! ```
//! use tf_foundation::error::{TfError, TfResult};
//!
//! fn read_header() -> TfResult<()> {
//!     Err(TfError::corrupt_payload("魔数不匹配"))
//! }
//! assert!(read_header().is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type TfResult<T> = Result<T, TfError>;

/// TerraFuse 错误类型
#[derive(Error, Debug)]
pub enum TfError {
    // ========================================================================
    // IO 相关错误
    // ========================================================================

    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        #[source]
        /// 可选的底层 IO 错误
        source: Option<std::io::Error>,
    },

    /// 文件不存在
    #[error("文件不存在: {path}")]
    FileNotFound {
        /// 未找到的路径
        path: PathBuf,
    },

    /// 压缩数据损坏（解码失败、校验和不匹配）
    #[error("压缩数据损坏: {message}")]
    CorruptPayload {
        /// 损坏原因
        message: String,
    },

    // ========================================================================
    // 数据相关错误
    // ========================================================================

    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 栅格结构错误（行列数与数据长度不一致等）
    #[error("栅格结构错误: {message}")]
    MalformedGrid {
        /// 具体错误信息
        message: String,
    },

    /// 坐标参考系统不兼容（不做隐式重投影）
    #[error("坐标参考系统不兼容: 补丁 {patch}, 基准 {base}")]
    IncompatibleReference {
        /// 补丁栅格的 CRS
        patch: String,
        /// 基准栅格的 CRS
        base: String,
    },

    /// 两个栅格未对齐
    #[error("栅格未对齐: {message}")]
    MisalignedGrids {
        /// 具体错误信息
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    // ========================================================================
    // 配置与运行时错误
    // ========================================================================

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 序列化失败原因
        message: String,
    },

    /// 锁获取失败（句柄冲突、墙体合并互斥）
    #[error("锁获取失败: {resource}")]
    LockError {
        /// 失败的资源名
        resource: String,
    },

    /// 资源未找到
    #[error("资源未找到: {resource}")]
    NotFound {
        /// 资源名称
        resource: String,
    },

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl TfError {
    /// IO 错误
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// IO 错误（带源）
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 文件不存在
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// 压缩数据损坏
    pub fn corrupt_payload(message: impl Into<String>) -> Self {
        Self::CorruptPayload {
            message: message.into(),
        }
    }

    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 栅格结构错误
    pub fn malformed_grid(message: impl Into<String>) -> Self {
        Self::MalformedGrid {
            message: message.into(),
        }
    }

    /// 坐标参考系统不兼容
    pub fn incompatible_reference(patch: impl Into<String>, base: impl Into<String>) -> Self {
        Self::IncompatibleReference {
            patch: patch.into(),
            base: base.into(),
        }
    }

    /// 栅格未对齐
    pub fn misaligned(message: impl Into<String>) -> Self {
        Self::MisalignedGrids {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// 锁错误
    pub fn lock_error(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// 资源未找到
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl TfError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> TfResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }
}

/// 条件不满足时提前返回错误
///
/// ```
/// use tf_foundation::{ensure, TfError, TfResult};
///
/// fn positive(v: f64) -> TfResult<f64> {
///     ensure!(v > 0.0, TfError::invalid_input("必须为正"));
///     Ok(v)
/// }
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

// ========================================================================
// 标准库错误转换
// ========================================================================

impl From<std::io::Error> for TfError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

// ========================================================================
// 测试
// ========================================================================
