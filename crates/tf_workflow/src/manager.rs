// crates/tf_workflow/src/manager.rs

//! 融合管理器
//!
//! 把一次补丁融合串成完整事务：
//!
//! 1. 获取墙体锁（锁表属于版本库，所有共享该版本库的管理器互斥）
//! 2. 通过读句柄读取最新母面（读完即释放）
//! 3. 纯计算（见 [`crate::pipeline`]）
//! 4. 确认基准仍是最新版本后，写临时文件并发布新版本
//!
//! 母面发布之前任一步失败都不会发布任何版本，旧版本始终不变。
//! 分类栅格是附属输出：母面发布后它的提交失败只记录警告。

use crate::pipeline::{compute_merge, MergeComputation};
use crate::result::MergeReport;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tf_config::EngineConfig;
use tf_foundation::error::{TfError, TfResult};
use tf_geo::{BoundingBox, Polygon};
use tf_io::{MasterStore, MasterVersion, WallLocks, WriteHandle, WriteMode};
use tf_terrain::Grid;
use tracing::{info, warn};

/// 融合任务
#[derive(Debug, Clone)]
pub struct MergeJob {
    /// 墙体编号
    pub wall: String,
    /// 补丁曲面
    pub patch: Grid,
    /// 发布日期
    pub date: NaiveDate,
    /// 测区轮廓
    pub footprint: Option<Polygon>,
    /// 母面可写入范围
    pub bounds: Option<BoundingBox>,
    /// 分类栅格输出路径
    pub classified_output: Option<PathBuf>,
}

impl MergeJob {
    /// 创建任务
    pub fn new(wall: impl Into<String>, patch: Grid, date: NaiveDate) -> Self {
        Self {
            wall: wall.into(),
            patch,
            date,
            footprint: None,
            bounds: None,
            classified_output: None,
        }
    }

    /// 指定测区轮廓
    pub fn with_footprint(mut self, footprint: Polygon) -> Self {
        self.footprint = Some(footprint);
        self
    }

    /// 限制写入范围
    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// 同时输出分类栅格
    pub fn with_classified_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.classified_output = Some(path.into());
        self
    }
}

/// 融合结果
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// 融合前的母面版本
    pub previous: MasterVersion,
    /// 新发布的版本
    pub version: MasterVersion,
    /// 统计报告
    pub report: MergeReport,
    /// 分类栅格路径（未请求或提交失败时为 `None`）
    pub classified: Option<PathBuf>,
}

/// 融合管理器
#[derive(Debug, Clone)]
pub struct MergeManager {
    store: MasterStore,
    config: EngineConfig,
}

impl MergeManager {
    /// 创建管理器
    ///
    /// 版本库的编码参数取自配置。墙体锁沿用版本库的锁表，
    /// 因此由同一版本库（或其克隆）创建的管理器彼此互斥。
    ///
    /// # Errors
    ///
    /// 配置无效时返回 `InvalidConfig`。
    pub fn new(store: MasterStore, config: EngineConfig) -> TfResult<Self> {
        config.validate()?;
        Ok(Self {
            store: store.with_codec(config.codec_options()),
            config,
        })
    }

    /// 版本库
    pub fn store(&self) -> &MasterStore {
        &self.store
    }

    /// 配置
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 墙体锁
    pub fn locks(&self) -> &WallLocks {
        self.store.locks()
    }

    /// 发布墙体的初始母面
    ///
    /// # Errors
    ///
    /// 墙体已有母面时返回 `InvalidInput`。
    pub fn seed(&self, wall: &str, master: &Grid, date: NaiveDate) -> TfResult<MasterVersion> {
        let _guard = self.locks().lock(wall);
        if self.store.latest(wall)?.is_some() {
            return Err(TfError::invalid_input(format!("墙体 {wall} 已有母面")));
        }
        let version = self.store.publish(wall, master, date)?;
        info!(wall = %wall, path = %version.path.display(), "初始母面已发布");
        Ok(version)
    }

    /// 只计算不发布
    pub fn preview(&self, job: &MergeJob) -> TfResult<MergeReport> {
        let _guard = self.locks().lock(&job.wall);
        let (_, master) = self.load_master(&job.wall)?;
        Ok(self.compute(job, &master)?.report)
    }

    /// 执行融合并发布新版本
    ///
    /// # Errors
    ///
    /// 墙体无母面、CRS 不兼容、数据损坏、基准已被其他写入者更新或写入失败。
    /// 出错时不发布任何文件。
    pub fn merge(&self, job: &MergeJob) -> TfResult<MergeOutcome> {
        info!(wall = %job.wall, cells = job.patch.valid_count(), "开始融合");
        let _guard = self.locks().lock(&job.wall);

        let (previous, master) = self.load_master(&job.wall)?;
        let computation = self.compute(job, &master)?;
        for w in &computation.report.volumetric.warnings {
            warn!(wall = %job.wall, "{w}");
        }

        let classified = match &job.classified_output {
            Some(path) => Some(self.stage_classified(path, &computation)?),
            None => None,
        };

        let version = self
            .store
            .publish_over(&previous, &computation.master, job.date)?;
        let classified = classified.and_then(|h| commit_classified(&job.wall, h));

        let v = &computation.report.volumetric;
        info!(
            wall = %job.wall,
            path = %version.path.display(),
            cut = v.cut_volume,
            fill = v.fill_volume,
            net = v.net_volume,
            synthetic = v.synthetic_cells,
            "融合完成"
        );

        Ok(MergeOutcome {
            previous,
            version,
            report: computation.report,
            classified,
        })
    }

    fn load_master(&self, wall: &str) -> TfResult<(MasterVersion, Grid)> {
        self.store
            .read_latest(wall)?
            .ok_or_else(|| TfError::not_found(format!("墙体 {wall} 的母面")))
    }

    fn compute(&self, job: &MergeJob, master: &Grid) -> TfResult<MergeComputation> {
        compute_merge(
            &job.patch,
            master,
            &self.config,
            job.footprint.as_ref(),
            job.bounds,
        )
    }

    /// 分类栅格先写临时文件，母面发布成功后再提交
    fn stage_classified(
        &self,
        path: &Path,
        computation: &MergeComputation,
    ) -> TfResult<WriteHandle> {
        let grid = computation.classified.to_grid()?;
        let mut handle = self.store.handles().open_write(path, WriteMode::Replace)?;
        handle.write_grid(&grid, &self.config.codec_options())?;
        Ok(handle)
    }
}

/// 提交已暂存的分类栅格；母面已发布，失败只降级为警告
fn commit_classified(wall: &str, handle: WriteHandle) -> Option<PathBuf> {
    let path = handle.path().to_path_buf();
    match handle.commit() {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(wall = %wall, path = %path.display(), error = %e, "分类栅格提交失败");
            None
        }
    }
}
