// crates/tf_io/src/error.rs
//! IO 错误类型定义
//!
//! 提供 IO 模块的统一错误枚举，所有错误最终可转换为 TfError 以实现跨层错误传递。
//! 容器结构类错误（魔数、版本、校验和、长度）统一映射为 `CorruptPayload`。

use std::path::PathBuf;
use tf_foundation::TfError;
use thiserror::Error;

/// IO 模块结果类型别名
pub type IoResult<T> = Result<T, IoError>;

/// IO 错误枚举
#[derive(Error, Debug)]
pub enum IoError {
    /// 魔数不匹配
    #[error("魔数不匹配: {found:?}")]
    BadMagic { found: [u8; 4] },

    /// 不支持的版本
    #[error("不支持的容器版本: {found}, 当前支持 {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// 数据截断
    #[error("数据截断: {context} 需要 {needed} 字节, 实际 {available} 字节")]
    Truncated {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    /// 头部内容无效
    #[error("头部无效: {0}")]
    InvalidHeader(String),

    /// 校验和不匹配
    #[error("校验和不匹配: {section}, 期望 {expected:#010x}, 实际 {found:#010x}")]
    ChecksumMismatch {
        section: String,
        expected: u32,
        found: u32,
    },

    /// 压缩失败
    #[error("压缩失败: {0}")]
    Compression(String),

    /// 解压失败
    #[error("解压失败: 分块 {tile}, {message}")]
    Decompression { tile: usize, message: String },

    /// 分块长度不符
    #[error("分块长度不符: 分块 {tile} 期望 {expected} 字节, 实际 {actual} 字节")]
    TileLength {
        tile: usize,
        expected: usize,
        actual: usize,
    },

    /// 句柄冲突
    #[error("句柄冲突: {path}, {reason}")]
    HandleConflict { path: PathBuf, reason: &'static str },

    /// 目标文件已存在
    #[error("目标文件已存在: {path}")]
    AlreadyExists { path: PathBuf },

    /// 底层 IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 基础层错误转换
    #[error("基础层错误: {0}")]
    Foundation(#[from] TfError),
}

impl IoError {
    /// 是否属于容器损坏
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::BadMagic { .. }
                | Self::UnsupportedVersion { .. }
                | Self::Truncated { .. }
                | Self::InvalidHeader(_)
                | Self::ChecksumMismatch { .. }
                | Self::Decompression { .. }
                | Self::TileLength { .. }
        )
    }
}

impl From<IoError> for TfError {
    fn from(err: IoError) -> Self {
        if err.is_corruption() {
            return TfError::corrupt_payload(err.to_string());
        }
        match err {
            IoError::HandleConflict { path, reason } => {
                TfError::lock_error(format!("{} ({reason})", path.display()))
            }
            IoError::AlreadyExists { path } => {
                TfError::io(format!("目标文件已存在: {}", path.display()))
            }
            IoError::Compression(msg) => TfError::internal(format!("压缩失败: {msg}")),
            IoError::Io(e) => TfError::io_with_source(e.to_string(), e),
            IoError::Foundation(tf_err) => tf_err,
            other => TfError::internal(other.to_string()),
        }
    }
}
