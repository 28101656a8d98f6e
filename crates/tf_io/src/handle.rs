// crates/tf_io/src/handle.rs

//! 栅格文件句柄
//!
//! 读取与写入都通过作用域句柄进行：
//!
//! - 读句柄在作用域结束（drop）时释放
//! - 写句柄拒绝仍有读句柄的路径；数据先写入临时文件，`commit` 时原子重命名
//! - 未提交即被丢弃的写句柄会删除临时文件，目标文件保持不变
//!
//! 登记表只在内存中跟踪本进程打开的句柄。

use crate::codec::{self, CodecOptions};
use crate::error::{IoError, IoResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tf_foundation::error::TfResult;
use tf_terrain::Grid;
use tracing::{debug, warn};

/// 单个路径上的句柄状态
#[derive(Debug, Default)]
struct HandleState {
    readers: usize,
    writer: bool,
}

/// 写入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// 目标已存在则拒绝（母面版本不可覆盖）
    #[default]
    CreateNew,
    /// 允许替换已有文件
    Replace,
}

/// 句柄登记表
#[derive(Debug, Clone, Default)]
pub struct RasterHandles {
    inner: Arc<Mutex<HashMap<PathBuf, HandleState>>>,
}

impl RasterHandles {
    /// 创建空登记表
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开读句柄
    ///
    /// # Errors
    ///
    /// 路径上有未完成的写句柄时返回 `HandleConflict`。
    pub fn open_read(&self, path: impl AsRef<Path>) -> IoResult<ReadHandle> {
        let path = path.as_ref().to_path_buf();
        let mut map = self.inner.lock();
        let state = map.entry(path.clone()).or_default();
        if state.writer {
            return Err(IoError::HandleConflict {
                path,
                reason: "存在未提交的写句柄",
            });
        }
        state.readers += 1;
        debug!(path = %path.display(), readers = state.readers, "打开读句柄");
        Ok(ReadHandle {
            registry: self.clone(),
            path,
        })
    }

    /// 打开写句柄
    ///
    /// # Errors
    ///
    /// - 路径上仍有读句柄或写句柄 → `HandleConflict`
    /// - `CreateNew` 模式下目标已存在 → `AlreadyExists`
    pub fn open_write(&self, path: impl AsRef<Path>, mode: WriteMode) -> IoResult<WriteHandle> {
        let path = path.as_ref().to_path_buf();
        let mut map = self.inner.lock();
        let state = map.entry(path.clone()).or_default();
        if state.readers > 0 {
            let err = IoError::HandleConflict {
                path: path.clone(),
                reason: "读句柄尚未释放",
            };
            release_if_idle(&mut map, &path);
            return Err(err);
        }
        if state.writer {
            return Err(IoError::HandleConflict {
                path,
                reason: "已有写句柄",
            });
        }
        if mode == WriteMode::CreateNew && path.exists() {
            release_if_idle(&mut map, &path);
            return Err(IoError::AlreadyExists { path });
        }
        state.writer = true;
        drop(map);

        debug!(path = %path.display(), "打开写句柄");
        Ok(WriteHandle {
            registry: self.clone(),
            temp_path: codec::temp_path_for(&path),
            path,
            mode,
            written: false,
            committed: false,
        })
    }

    /// 当前读句柄数
    pub fn readers(&self, path: impl AsRef<Path>) -> usize {
        self.inner
            .lock()
            .get(path.as_ref())
            .map_or(0, |s| s.readers)
    }

    /// 是否有写句柄
    pub fn is_writing(&self, path: impl AsRef<Path>) -> bool {
        self.inner
            .lock()
            .get(path.as_ref())
            .is_some_and(|s| s.writer)
    }

    fn release_reader(&self, path: &Path) {
        let mut map = self.inner.lock();
        if let Some(state) = map.get_mut(path) {
            state.readers = state.readers.saturating_sub(1);
        }
        release_if_idle(&mut map, path);
    }

    fn release_writer(&self, path: &Path) {
        let mut map = self.inner.lock();
        if let Some(state) = map.get_mut(path) {
            state.writer = false;
        }
        release_if_idle(&mut map, path);
    }
}

fn release_if_idle(map: &mut HashMap<PathBuf, HandleState>, path: &Path) {
    if map.get(path).is_some_and(|s| s.readers == 0 && !s.writer) {
        map.remove(path);
    }
}

/// 读句柄（drop 时释放）
#[derive(Debug)]
pub struct ReadHandle {
    registry: RasterHandles,
    path: PathBuf,
}

impl ReadHandle {
    /// 文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取栅格
    pub fn read_grid(&self) -> TfResult<Grid> {
        codec::read_grid(&self.path)
    }
}

impl Drop for ReadHandle {
    fn drop(&mut self) {
        self.registry.release_reader(&self.path);
        debug!(path = %self.path.display(), "释放读句柄");
    }
}

/// 写句柄
///
/// 数据写入临时文件，`commit` 后才出现在目标路径。
#[derive(Debug)]
pub struct WriteHandle {
    registry: RasterHandles,
    path: PathBuf,
    temp_path: PathBuf,
    mode: WriteMode,
    written: bool,
    committed: bool,
}

impl WriteHandle {
    /// 目标路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 临时文件路径
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// 把栅格编码写入临时文件
    pub fn write_grid(&mut self, grid: &Grid, options: &CodecOptions) -> TfResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = codec::encode(grid, options)?;
        let mut writer = BufWriter::new(File::create(&self.temp_path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        self.written = true;
        debug!(
            path = %self.temp_path.display(),
            bytes = bytes.len(),
            "临时文件写入完成"
        );
        Ok(())
    }

    /// 原子发布
    ///
    /// # Errors
    ///
    /// 尚未写入数据、`CreateNew` 模式下目标已出现或重命名失败时返回错误，
    /// 此时临时文件会随句柄一起清理。
    pub fn commit(mut self) -> TfResult<PathBuf> {
        if !self.written {
            return Err(tf_foundation::TfError::internal("写句柄尚未写入数据"));
        }
        if self.mode == WriteMode::CreateNew && self.path.exists() {
            return Err(IoError::AlreadyExists {
                path: self.path.clone(),
            }
            .into());
        }
        std::fs::rename(&self.temp_path, &self.path)?;
        self.committed = true;
        debug!(path = %self.path.display(), "写句柄已提交");
        Ok(self.path.clone())
    }
}

impl Drop for WriteHandle {
    fn drop(&mut self) {
        if !self.committed && self.temp_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.temp_path) {
                warn!(path = %self.temp_path.display(), error = %e, "临时文件清理失败");
            }
        }
        self.registry.release_writer(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_guard_released_on_drop() {
        let handles = RasterHandles::new();
        {
            let _a = handles.open_read("x.tfgr").unwrap();
            let _b = handles.open_read("x.tfgr").unwrap();
            assert_eq!(handles.readers("x.tfgr"), 2);
        }
        assert_eq!(handles.readers("x.tfgr"), 0);
    }

    #[test]
    fn test_write_refused_while_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.tfgr");
        let handles = RasterHandles::new();
        let reader = handles.open_read(&path).unwrap();
        let err = handles.open_write(&path, WriteMode::Replace).unwrap_err();
        assert!(matches!(err, IoError::HandleConflict { .. }));
        drop(reader);
        assert!(handles.open_write(&path, WriteMode::Replace).is_ok());
    }

    #[test]
    fn test_read_refused_while_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.tfgr");
        let handles = RasterHandles::new();
        let writer = handles.open_write(&path, WriteMode::CreateNew).unwrap();
        assert!(handles.is_writing(&path));
        assert!(handles.open_read(&path).is_err());
        drop(writer);
        assert!(!handles.is_writing(&path));
        assert!(handles.open_read(&path).is_ok());
    }

    #[test]
    fn test_create_new_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.tfgr");
        std::fs::write(&path, b"old").unwrap();
        let handles = RasterHandles::new();
        assert!(matches!(
            handles.open_write(&path, WriteMode::CreateNew),
            Err(IoError::AlreadyExists { .. })
        ));
        assert!(!handles.is_writing(&path));
    }
}
