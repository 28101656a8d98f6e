// crates/tf_io/src/store.rs

//! 母面版本库
//!
//! 每个墙体（wall）一个目录，每次融合发布一个新版本文件：
//!
//! ```text
//! <root>/<wall>/<wall>_<YYYYMMDD>.tfgr
//! <root>/<wall>/<wall>_<YYYYMMDD>_1.tfgr    同日第二个版本
//! ```
//!
//! 已发布的版本不会被覆盖。读写均经过 [`RasterHandles`]，
//! 同一墙体的融合由 [`WallLocks`] 串行化。两者都随版本库克隆共享，
//! 因此同一根目录应只打开一次，再把克隆交给各个使用者。

use crate::codec::{CodecOptions, TFGR_EXTENSION};
use crate::handle::{RasterHandles, WriteMode};
use crate::locks::WallLocks;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tf_foundation::error::{TfError, TfResult};
use tf_terrain::Grid;
use tracing::{debug, info};

/// 版本文件命名规则
pub trait VersionNaming: Send + Sync + fmt::Debug {
    /// 生成文件名
    fn file_name(&self, wall: &str, date: NaiveDate, sequence: u32) -> String;

    /// 解析文件名，不属于该墙体时返回 `None`
    fn parse(&self, wall: &str, file_name: &str) -> Option<(NaiveDate, u32)>;
}

/// 默认命名：`<wall>_<YYYYMMDD>[_n].tfgr`
#[derive(Debug, Clone, Copy, Default)]
pub struct DateStampNaming;

impl VersionNaming for DateStampNaming {
    fn file_name(&self, wall: &str, date: NaiveDate, sequence: u32) -> String {
        let stamp = date.format("%Y%m%d");
        if sequence == 0 {
            format!("{wall}_{stamp}.{TFGR_EXTENSION}")
        } else {
            format!("{wall}_{stamp}_{sequence}.{TFGR_EXTENSION}")
        }
    }

    fn parse(&self, wall: &str, file_name: &str) -> Option<(NaiveDate, u32)> {
        let rest = file_name.strip_prefix(wall)?.strip_prefix('_')?;
        let stem = rest.strip_suffix(TFGR_EXTENSION)?.strip_suffix('.')?;
        let (stamp, tail) = (stem.get(..8)?, stem.get(8..)?);
        let date = NaiveDate::parse_from_str(stamp, "%Y%m%d").ok()?;
        let sequence = match tail {
            "" => 0,
            t => t.strip_prefix('_')?.parse().ok().filter(|&n| n > 0)?,
        };
        Some((date, sequence))
    }
}

/// 一个已发布的母面版本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterVersion {
    /// 墙体编号
    pub wall: String,
    /// 发布日期
    pub date: NaiveDate,
    /// 同日序号（0 起）
    pub sequence: u32,
    /// 文件路径
    pub path: PathBuf,
}

/// 母面版本库
#[derive(Debug, Clone)]
pub struct MasterStore {
    root: PathBuf,
    handles: RasterHandles,
    locks: WallLocks,
    naming: Arc<dyn VersionNaming>,
    codec: CodecOptions,
}

impl MasterStore {
    /// 以默认命名和编码参数打开版本库
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            handles: RasterHandles::new(),
            locks: WallLocks::new(),
            naming: Arc::new(DateStampNaming),
            codec: CodecOptions::default(),
        }
    }

    /// 替换命名规则
    pub fn with_naming(mut self, naming: impl VersionNaming + 'static) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    /// 替换编码参数
    pub fn with_codec(mut self, codec: CodecOptions) -> Self {
        self.codec = codec;
        self
    }

    /// 根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 句柄登记表
    pub fn handles(&self) -> &RasterHandles {
        &self.handles
    }

    /// 墙体锁表
    pub fn locks(&self) -> &WallLocks {
        &self.locks
    }

    /// 墙体目录
    pub fn wall_dir(&self, wall: &str) -> TfResult<PathBuf> {
        validate_wall_id(wall)?;
        Ok(self.root.join(wall))
    }

    /// 列出墙体的全部版本（按日期、序号升序）
    pub fn versions(&self, wall: &str) -> TfResult<Vec<MasterVersion>> {
        let dir = self.wall_dir(wall)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some((date, sequence)) = self.naming.parse(wall, name) {
                versions.push(MasterVersion {
                    wall: wall.to_string(),
                    date,
                    sequence,
                    path: path.clone(),
                });
            }
        }
        versions.sort_by_key(|v| (v.date, v.sequence));
        Ok(versions)
    }

    /// 最新版本
    pub fn latest(&self, wall: &str) -> TfResult<Option<MasterVersion>> {
        Ok(self.versions(wall)?.pop())
    }

    /// 读取指定版本（读句柄在返回前释放）
    pub fn read(&self, version: &MasterVersion) -> TfResult<Grid> {
        let handle = self.handles.open_read(&version.path)?;
        let grid = handle.read_grid()?;
        debug!(
            wall = %version.wall,
            path = %version.path.display(),
            cells = grid.len(),
            "读取母面版本"
        );
        Ok(grid)
    }

    /// 读取最新版本
    pub fn read_latest(&self, wall: &str) -> TfResult<Option<(MasterVersion, Grid)>> {
        match self.latest(wall)? {
            Some(version) => {
                let grid = self.read(&version)?;
                Ok(Some((version, grid)))
            }
            None => Ok(None),
        }
    }

    /// 给定日期的下一个可用版本位置
    pub fn next_version(&self, wall: &str, date: NaiveDate) -> TfResult<MasterVersion> {
        let dir = self.wall_dir(wall)?;
        let mut sequence = 0u32;
        loop {
            let path = dir.join(self.naming.file_name(wall, date, sequence));
            if !path.exists() && !self.handles.is_writing(&path) {
                return Ok(MasterVersion {
                    wall: wall.to_string(),
                    date,
                    sequence,
                    path,
                });
            }
            sequence = sequence
                .checked_add(1)
                .ok_or_else(|| TfError::internal("版本序号溢出"))?;
        }
    }

    /// 发布新版本
    ///
    /// 先写临时文件再重命名；失败时不会留下半成品。
    ///
    /// # Errors
    ///
    /// 墙体编号非法、路径被占用或写入失败。
    pub fn publish(&self, wall: &str, grid: &Grid, date: NaiveDate) -> TfResult<MasterVersion> {
        let version = self.next_version(wall, date)?;
        if let Some(parent) = version.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut handle = self.handles.open_write(&version.path, WriteMode::CreateNew)?;
        handle.write_grid(grid, &self.codec)?;
        handle.commit()?;

        info!(
            wall = %wall,
            path = %version.path.display(),
            sequence = version.sequence,
            "发布母面版本"
        );
        Ok(version)
    }

    /// 基于 `base` 计算出的新版本，仅当 `base` 仍是最新版本时发布
    ///
    /// 墙体锁之外的写入者（另一个版本库实例或进程）抢先发布时，
    /// 返回 `LockError` 而不是在过期基准上再发布一个版本。
    ///
    /// # Errors
    ///
    /// 最新版本已不是 `base`，或 [`publish`](Self::publish) 的错误。
    pub fn publish_over(
        &self,
        base: &MasterVersion,
        grid: &Grid,
        date: NaiveDate,
    ) -> TfResult<MasterVersion> {
        let latest = self.latest(&base.wall)?;
        if latest.as_ref() != Some(base) {
            let found = latest.map_or_else(|| "无".to_string(), |v| v.path.display().to_string());
            return Err(TfError::lock_error(format!(
                "墙体 {} 的母面已更新: 基准 {}, 当前 {found}",
                base.wall,
                base.path.display()
            )));
        }
        self.publish(&base.wall, grid, date)
    }
}

/// 墙体编号只允许字母、数字、`-`、`_`、`.`，且不能以 `.` 开头
fn validate_wall_id(wall: &str) -> TfResult<()> {
    let valid = !wall.is_empty()
        && !wall.starts_with('.')
        && wall
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(TfError::invalid_input(format!("非法墙体编号: {wall:?}")))
    }
}
