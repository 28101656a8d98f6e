// crates/tf_io/src/lib.rs

//! TerraFuse IO 模块
//!
//! 提供栅格文件的编解码与持久化。
//!
//! # 模块
//!
//! - [`codec`]: TFGR 分块压缩容器（浮点差分预测 + zstd）
//! - [`handle`]: 作用域读写句柄（读句柄未释放时拒绝写入）
//! - [`store`]: 按墙体与日期管理的母面版本库
//! - [`locks`]: 按墙体的互斥锁
//! - [`error`]: IO 错误类型
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use tf_io::{MasterStore, read_grid};
//!
//! let store = MasterStore::new("/data/masters");
//! let (version, master) = store.read_latest("W12")?.expect("墙体尚无母面");
//! let updated = /* 融合 */;
//! store.publish("W12", &updated, chrono::Local::now().date_naive())?;
//! ```

#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod handle;
pub mod locks;
pub mod store;

// 重导出常用类型
pub use codec::{
    compute_crc32, decode, decode_header, encode, read_grid, read_header, write_grid,
    CodecOptions, GridHeader, Predictor, TFGR_EXTENSION, TFGR_MAGIC, TFGR_VERSION,
};
pub use error::{IoError, IoResult};
pub use handle::{RasterHandles, ReadHandle, WriteHandle, WriteMode};
pub use locks::{WallGuard, WallLocks};
pub use store::{DateStampNaming, MasterStore, MasterVersion, VersionNaming};
